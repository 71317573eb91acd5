use std::{
    io,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::{
    error::TrackerError,
    fs::operations::{read_locked, write_atomically},
};

use super::ledger::{coalesce, ledger_sum};

pub use super::entities::PersistentLog;

impl PersistentLog {
    /// Reads the log at `path`.
    ///
    /// A missing or blank file is a fresh install and yields the zero log. Anything else that
    /// can't be parsed is reported as [TrackerError::LogLoad] instead of being replaced, so that
    /// accumulated history is never silently discarded.
    pub async fn load(path: &Path) -> Result<PersistentLog, TrackerError> {
        let load_error = |details: String| TrackerError::LogLoad {
            path: path.to_path_buf(),
            details,
        };

        let content = read_locked(path)
            .await
            .map_err(|e| load_error(e.to_string()))?;

        let Some(content) = content.filter(|v| !v.trim().is_empty()) else {
            debug!("No time log at {path:?}, starting from zero");
            return Ok(PersistentLog::default());
        };

        let mut log = serde_json::from_str::<PersistentLog>(&content)
            .map_err(|e| load_error(e.to_string()))?;

        if !(log.total_seconds.is_finite() && log.total_seconds >= 0.) {
            return Err(load_error(format!(
                "total time {} is not a non-negative number",
                log.total_seconds
            )));
        }
        if let Some(record) = log
            .daily_records
            .iter()
            .find(|r| !(r.seconds.is_finite() && r.seconds >= 0.))
        {
            return Err(load_error(format!(
                "day {} holds {} seconds",
                record.date, record.seconds
            )));
        }

        log.daily_records = coalesce(log.daily_records);
        Ok(log)
    }

    /// Rewrites the log at `path`. The previous content survives a crash in the middle of it.
    pub async fn save(&self, path: &Path) -> Result<(), TrackerError> {
        let save_error = |source: io::Error| TrackerError::LogSave {
            path: path.to_path_buf(),
            source,
        };

        let content = serde_json::to_vec_pretty(self).map_err(|e| save_error(io::Error::other(e)))?;
        write_atomically(path, &content).await.map_err(save_error)
    }

    /// Time in the total that the ledger doesn't account for. Logs that predate daily tracking
    /// carry their whole history here.
    pub fn untracked_seconds(&self) -> f64 {
        let drift = self.total_seconds - ledger_sum(&self.daily_records);
        if drift < -1e-6 {
            warn!("Daily ledger exceeds total time by {} seconds", -drift);
        }
        drift.max(0.)
    }
}

/// Interface for abstracting where the log lives.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LogStorage: Send + Sync {
    async fn load(&self) -> Result<PersistentLog, TrackerError>;

    async fn save(&self, log: &PersistentLog) -> Result<(), TrackerError>;
}

/// The main realization of [LogStorage], a single JSON file.
pub struct FileLogStorage {
    path: PathBuf,
}

impl FileLogStorage {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl LogStorage for FileLogStorage {
    async fn load(&self) -> Result<PersistentLog, TrackerError> {
        PersistentLog::load(&self.path).await
    }

    async fn save(&self, log: &PersistentLog) -> Result<(), TrackerError> {
        PersistentLog::save(log, &self.path).await
    }
}
