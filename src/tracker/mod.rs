//! Session checkpointing and time aggregation.
//!
//! [SessionTracker] owns the origin of the running session and drives the protocol between the
//! time log and the checkpoint store:
//!  - On start the log is loaded and a pending checkpoint, if any, decides where the session
//!    began. A checkpoint means the previous run never committed.
//!  - While running the checkpoint is rewritten with the same origin (heartbeat).
//!  - On commit the elapsed time is folded into the total and the daily ledger, the log is
//!    rewritten, and the checkpoint is removed (shutdown) or moved to the commit instant (flush).

use std::sync::Arc;

use chrono::{DateTime, Duration, Local, Utc};
use tracing::{debug, info, instrument, warn};

use crate::{
    error::{CheckpointError, TrackerError},
    storage::{
        checkpoint::CheckpointStore,
        entities::{CommitMarker, DailyRecord},
        ledger::merge,
        log::{LogStorage, PersistentLog},
    },
    utils::{
        clock::Clock,
        retry::retry_once,
        time::{day_key, duration_to_seconds, seconds_to_duration},
    },
};

pub mod handle;
pub mod host;
pub mod shutdown;

/// How the origin of the current session was decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStart {
    /// No checkpoint was pending.
    Fresh,
    /// A checkpoint was pending, the previous run didn't commit.
    Recovered,
    /// The pending checkpoint predates the last commit of an ongoing session. The rewrite that
    /// should have followed that commit never happened, so the session resumes where the commit
    /// stopped counting.
    ResumedAfterCommit,
    /// The pending checkpoint belongs to a session that was already committed at shutdown.
    StaleDiscarded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    Uninitialized,
    Active(SessionStart),
}

/// Result of folding a session into the log.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitSummary {
    pub elapsed: Duration,
    pub day: String,
    pub total_seconds: f64,
}

pub struct SessionTracker {
    log_storage: Box<dyn LogStorage>,
    checkpoints: Box<dyn CheckpointStore>,
    clock: Arc<dyn Clock>,
    checkpoint_key: String,
    log: PersistentLog,
    session_origin: DateTime<Utc>,
    state: TrackerState,
}

impl SessionTracker {
    pub fn new(
        log_storage: Box<dyn LogStorage>,
        checkpoints: Box<dyn CheckpointStore>,
        clock: Arc<dyn Clock>,
        checkpoint_key: impl Into<String>,
    ) -> Self {
        let session_origin = clock.time();
        Self {
            log_storage,
            checkpoints,
            clock,
            checkpoint_key: checkpoint_key.into(),
            log: PersistentLog::default(),
            session_origin,
            state: TrackerState::Uninitialized,
        }
    }

    /// Startup transition. Runs once; later calls return the outcome of the first one.
    ///
    /// A log that can't be loaded aborts initialization and leaves the tracker uninitialized, so
    /// nothing will overwrite it. An unavailable checkpoint store only costs crash recovery and
    /// the session starts fresh.
    #[instrument(skip(self))]
    pub async fn initialize(&mut self) -> Result<SessionStart, TrackerError> {
        if let TrackerState::Active(start) = self.state {
            debug!("Tracker already initialized");
            return Ok(start);
        }

        let log = self.log_storage.load().await?;
        let now = self.clock.time();

        let pending = match self.read_checkpoint().await {
            Ok(pending) => pending,
            Err(e) => {
                warn!("Checkpoint store unavailable, treating the session as fresh: {e}");
                None
            }
        };

        let (origin, start) = resolve_origin(pending, log.last_commit, now);
        self.log = log;
        self.session_origin = origin;
        self.state = TrackerState::Active(start);

        if start != SessionStart::Recovered {
            if let Err(e) = self.write_checkpoint().await {
                warn!("Couldn't store session checkpoint, a crash will lose this session: {e}");
            }
        }

        info!(
            "Session tracker initialized ({start:?}). Session started at: {}",
            origin.with_timezone(&Local)
        );
        Ok(start)
    }

    async fn read_checkpoint(&self) -> Result<Option<DateTime<Utc>>, CheckpointError> {
        let key = self.checkpoint_key.as_str();
        let store = &self.checkpoints;
        if !retry_once("checkpoint lookup", || store.has(key)).await? {
            return Ok(None);
        }
        match retry_once("checkpoint read", || store.get(key)).await {
            Ok(start) => Ok(Some(start)),
            Err(CheckpointError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn write_checkpoint(&self) -> Result<(), CheckpointError> {
        let key = self.checkpoint_key.as_str();
        let store = &self.checkpoints;
        let origin = self.session_origin;
        retry_once("checkpoint write", || store.set(key, origin)).await
    }

    fn ensure_active(&self) -> Result<(), TrackerError> {
        match self.state {
            TrackerState::Active(_) => Ok(()),
            TrackerState::Uninitialized => Err(TrackerError::NotInitialized),
        }
    }

    /// Rewrites the checkpoint with the unchanged session origin. Also recreates it if a shutdown
    /// commit removed it while the host kept running.
    pub async fn heartbeat(&self) -> Result<(), TrackerError> {
        self.ensure_active()?;
        debug!("Heartbeat for session started at {}", self.session_origin);
        self.write_checkpoint().await?;
        Ok(())
    }

    /// Commit on a clean quit. The checkpoint is removed since nothing is left to recover; the
    /// in-memory origin moves to the commit instant in case the host keeps running.
    #[instrument(skip(self))]
    pub async fn on_shutdown(&mut self) -> Result<CommitSummary, TrackerError> {
        self.commit(true).await
    }

    /// Commit without ending tracking. The checkpoint moves to the new origin right away.
    #[instrument(skip(self))]
    pub async fn commit_now(&mut self) -> Result<CommitSummary, TrackerError> {
        self.commit(false).await
    }

    async fn commit(&mut self, closing: bool) -> Result<CommitSummary, TrackerError> {
        self.ensure_active()?;

        let now = self.clock.time();
        let elapsed = now - self.session_origin;
        let elapsed = if elapsed < Duration::zero() {
            warn!("Clock went backwards by {elapsed}, committing nothing for this session");
            Duration::zero()
        } else {
            elapsed
        };
        let delta_seconds = duration_to_seconds(elapsed);
        let day = day_key(now);

        let next = PersistentLog {
            total_seconds: self.log.total_seconds + delta_seconds,
            daily_records: merge(self.log.daily_records.clone(), &day, delta_seconds),
            last_commit: Some(CommitMarker {
                session_origin: self.session_origin,
                committed_at: now,
                closed: closing,
            }),
        };

        // Nothing changes in memory until the log is on disk, so a failed commit can be retried
        // later with the whole interval.
        let storage = &self.log_storage;
        retry_once("time log save", || storage.save(&next)).await?;

        self.log = next;
        self.session_origin = now;

        let key = self.checkpoint_key.as_str();
        let store = &self.checkpoints;
        let checkpoint_result = if closing {
            retry_once("checkpoint delete", || store.delete(key)).await
        } else {
            retry_once("checkpoint write", || store.set(key, now)).await
        };
        if let Err(e) = checkpoint_result {
            warn!("Checkpoint wasn't updated after commit, the next start will reconcile it: {e}");
        }

        info!(
            "Session committed: {} seconds on {day}. Total time: {} seconds",
            delta_seconds, self.log.total_seconds
        );

        Ok(CommitSummary {
            elapsed,
            day,
            total_seconds: self.log.total_seconds,
        })
    }

    pub fn current_session_elapsed(&self) -> Duration {
        match self.state {
            TrackerState::Active(_) => (self.clock.time() - self.session_origin).max(Duration::zero()),
            TrackerState::Uninitialized => Duration::zero(),
        }
    }

    pub fn total_accumulated(&self) -> Duration {
        seconds_to_duration(self.log.total_seconds)
    }

    pub fn daily_records(&self) -> &[DailyRecord] {
        &self.log.daily_records
    }

    pub fn log(&self) -> &PersistentLog {
        &self.log
    }

    pub fn session_origin(&self) -> Option<DateTime<Utc>> {
        match self.state {
            TrackerState::Active(_) => Some(self.session_origin),
            TrackerState::Uninitialized => None,
        }
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    pub fn is_initialized(&self) -> bool {
        matches!(self.state, TrackerState::Active(_))
    }

    /// Tracking never stops once started; a commit immediately opens the next session.
    pub fn is_tracking(&self) -> bool {
        self.is_initialized()
    }

    pub(crate) fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }
}

/// Decides where the current session begins.
///
/// A checkpoint not later than the origin of the last commit has already been counted. The
/// marker tells whether that commit ended the session or the session went on after it.
fn resolve_origin(
    pending: Option<DateTime<Utc>>,
    last_commit: Option<CommitMarker>,
    now: DateTime<Utc>,
) -> (DateTime<Utc>, SessionStart) {
    match (pending, last_commit) {
        (None, _) => (now, SessionStart::Fresh),
        (Some(start), Some(marker)) if start <= marker.session_origin => {
            if marker.closed {
                (now, SessionStart::StaleDiscarded)
            } else {
                (marker.committed_at, SessionStart::ResumedAfterCommit)
            }
        }
        (Some(start), _) => (start, SessionStart::Recovered),
    }
}
