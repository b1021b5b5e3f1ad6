//! Quota models
//!
//! Bonus pool identifiers and the computed quota/usage views.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CacheError;

// == Bonus Type ==
/// A named bonus pool. Each type is counted independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BonusType {
    /// Granted for completing the feedback questionnaire
    Questionnaire,
    /// Granted for a payment
    Payment,
}

impl BonusType {
    pub const ALL: [BonusType; 2] = [BonusType::Questionnaire, BonusType::Payment];

    pub fn as_str(&self) -> &'static str {
        match self {
            BonusType::Questionnaire => "questionnaire",
            BonusType::Payment => "payment",
        }
    }
}

impl fmt::Display for BonusType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BonusType {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "questionnaire" => Ok(BonusType::Questionnaire),
            "payment" => Ok(BonusType::Payment),
            other => Err(CacheError::InvalidRequest(format!(
                "unknown bonus type '{}'",
                other
            ))),
        }
    }
}

// == Total Quota ==
/// Today's allowance for one IP: the base plus every bonus pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotalQuota {
    pub base: i64,
    pub questionnaire: i64,
    pub payment: i64,
    pub total: i64,
}

impl TotalQuota {
    pub fn new(base: i64, questionnaire: i64, payment: i64) -> Self {
        Self {
            base,
            questionnaire,
            payment,
            total: base + questionnaire + payment,
        }
    }

    pub fn bonus(&self, bonus_type: BonusType) -> i64 {
        match bonus_type {
            BonusType::Questionnaire => self.questionnaire,
            BonusType::Payment => self.payment,
        }
    }
}

// == Usage Status ==
/// Today's usage against today's quota.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageStatus {
    pub used: i64,
    pub quota: TotalQuota,
    /// Never negative
    pub remaining: i64,
    pub can_use: bool,
    /// When today's counter expires
    pub reset_time: DateTime<Utc>,
}

impl UsageStatus {
    pub fn new(used: i64, quota: TotalQuota, reset_time: DateTime<Utc>) -> Self {
        let remaining = (quota.total - used).max(0);
        Self {
            used,
            quota,
            remaining,
            can_use: remaining > 0,
            reset_time,
        }
    }
}
