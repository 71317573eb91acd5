use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Time accumulated on a single calendar day. At most one record exists per `date`.
#[derive(PartialEq, Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DailyRecord {
    /// Local calendar day, see [day_key](crate::utils::time::day_key).
    pub date: String,
    pub seconds: f64,
}

impl DailyRecord {
    pub fn new(date: impl Into<String>, seconds: f64) -> Self {
        Self {
            date: date.into(),
            seconds,
        }
    }
}

/// Written together with the totals on every commit, so that a checkpoint left behind by a crash
/// between the log write and the checkpoint update can be recognized on the next start.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone, Copy)]
#[serde(rename_all = "camelCase")]
pub struct CommitMarker {
    /// Origin of the session that was folded in.
    pub session_origin: DateTime<Utc>,
    /// Time was counted up to this instant.
    pub committed_at: DateTime<Utc>,
    /// Set when the commit came from a shutdown and the checkpoint was meant to be removed.
    pub closed: bool,
}

/// Cumulative total and daily ledger, exactly as stored on disk. `TotalSessionTime` is accepted
/// for logs written before daily tracking existed; such logs have no `dailyRecords` either.
#[derive(PartialEq, Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct PersistentLog {
    #[serde(alias = "TotalSessionTime")]
    pub total_seconds: f64,
    #[serde(default)]
    pub daily_records: Vec<DailyRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_commit: Option<CommitMarker>,
}
