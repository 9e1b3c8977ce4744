//! Processed-interaction ledger types.
//!
//! The ledger guarantees at-most-once handling across restarts. Failed
//! interactions stay unmarked (and are retried on the next poll) until
//! their attempt budget is spent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

/// Terminal state of an interaction in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessedStatus {
    /// Completed (replied, disengaged, refused, or rejected).
    Handled,
    /// Gave up after exhausting the attempt budget.
    Failed,
}

impl fmt::Display for ProcessedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessedStatus::Handled => write!(f, "handled"),
            ProcessedStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for ProcessedStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "handled" => Ok(ProcessedStatus::Handled),
            "failed" => Ok(ProcessedStatus::Failed),
            other => Err(format!("invalid processed status: '{other}'")),
        }
    }
}

/// One ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub uri: String,
    /// `None` while the interaction is still eligible for another attempt.
    pub status: Option<ProcessedStatus>,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn is_settled(&self) -> bool {
        self.status.is_some()
    }
}
