use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::{watch, Mutex};
use tracing::debug;

use crate::{
    error::TrackerError,
    storage::entities::DailyRecord,
    utils::{clock::Clock, time::seconds_to_duration},
};

use super::{CommitSummary, SessionStart, SessionTracker};

/// Immutable copy of what the display side needs. Republished after every mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerSnapshot {
    pub session_origin: Option<DateTime<Utc>>,
    pub total_seconds: f64,
    pub daily_records: Arc<[DailyRecord]>,
}

impl TrackerSnapshot {
    fn of(tracker: &SessionTracker) -> Self {
        Self {
            session_origin: tracker.session_origin(),
            total_seconds: tracker.log().total_seconds,
            daily_records: tracker.daily_records().into(),
        }
    }
}

/// Explicit handle passed to the host hooks and to whatever displays the times.
///
/// Mutating calls are serialized through one mutex. Reads go through a snapshot and never wait
/// for a commit in progress.
#[derive(Clone)]
pub struct TrackerHandle {
    tracker: Arc<Mutex<SessionTracker>>,
    snapshot: Arc<watch::Sender<TrackerSnapshot>>,
    clock: Arc<dyn Clock>,
}

impl TrackerHandle {
    pub fn new(tracker: SessionTracker) -> Self {
        let (snapshot, _) = watch::channel(TrackerSnapshot::of(&tracker));
        Self {
            clock: tracker.clock(),
            tracker: Arc::new(Mutex::new(tracker)),
            snapshot: Arc::new(snapshot),
        }
    }

    fn publish(&self, tracker: &SessionTracker) {
        self.snapshot.send_replace(TrackerSnapshot::of(tracker));
    }

    /// `onInitialize` host signal.
    pub async fn initialize(&self) -> Result<SessionStart, TrackerError> {
        let mut tracker = self.tracker.lock().await;
        let result = tracker.initialize().await;
        self.publish(&tracker);
        result
    }

    pub async fn heartbeat(&self) -> Result<(), TrackerError> {
        self.tracker.lock().await.heartbeat().await
    }

    pub async fn commit_now(&self) -> Result<CommitSummary, TrackerError> {
        let mut tracker = self.tracker.lock().await;
        let result = tracker.commit_now().await;
        self.publish(&tracker);
        result
    }

    /// `onShutdown` host signal.
    pub async fn shutdown(&self) -> Result<CommitSummary, TrackerError> {
        let mut tracker = self.tracker.lock().await;
        let result = tracker.on_shutdown().await;
        self.publish(&tracker);
        result
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Lets a display wait for commits instead of polling.
    pub fn subscribe(&self) -> watch::Receiver<TrackerSnapshot> {
        self.snapshot.subscribe()
    }

    pub fn current_session_elapsed(&self) -> Duration {
        match self.snapshot.borrow().session_origin {
            Some(origin) => (self.clock.time() - origin).max(Duration::zero()),
            None => Duration::zero(),
        }
    }

    pub fn total_accumulated(&self) -> Duration {
        seconds_to_duration(self.snapshot.borrow().total_seconds)
    }

    pub fn daily_records_snapshot(&self) -> Vec<(String, Duration)> {
        self.snapshot
            .borrow()
            .daily_records
            .iter()
            .map(|r| (r.date.clone(), seconds_to_duration(r.seconds)))
            .collect()
    }

    /// `onManualRefresh` host signal. Only recomputes, nothing is written.
    pub fn refresh(&self) -> Duration {
        let elapsed = self.current_session_elapsed();
        debug!("Current session time recomputed: {elapsed}");
        elapsed
    }
}
