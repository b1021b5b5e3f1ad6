//! Background Tasks Module
//!
//! Contains background tasks that run periodically in the worker process.
//!
//! # Tasks
//! - Maintenance: sweeps expired in-process entries and removes sessions
//!   stored without an expiry

mod maintenance;

pub use maintenance::{run_maintenance, spawn_maintenance_task, MaintenanceReport};
