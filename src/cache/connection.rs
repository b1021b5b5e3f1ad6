//! Connection lifecycle of the remote backend.

use std::fmt;

// == Connection State ==
/// Where the backend is in its connection lifecycle.
///
/// `Disconnected → Connecting → Ready | Failed`. A `Ready` connection moves to
/// `Failed` when an operation reports the link dropped. Only `connect()` leaves
/// `Failed`; the first operation on a `Disconnected` store connects implicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Ready,
    Failed(String),
}

impl ConnectionState {
    pub fn is_ready(&self) -> bool {
        matches!(self, ConnectionState::Ready)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => f.write_str("disconnected"),
            ConnectionState::Connecting => f.write_str("connecting"),
            ConnectionState::Ready => f.write_str("ready"),
            ConnectionState::Failed(reason) => write!(f, "failed ({})", reason),
        }
    }
}
