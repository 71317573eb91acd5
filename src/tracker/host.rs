use std::{future::pending, sync::Arc, time::Duration};

use anyhow::{anyhow, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::utils::clock::Clock;

use super::{handle::TrackerHandle, CommitSummary};

/// Timing of the host loop.
#[derive(Debug, Clone, Copy)]
pub struct HostSettings {
    pub heartbeat_interval: Duration,
    /// Recompute the running session for display this often. `None` leaves refreshing to the
    /// caller.
    pub refresh_interval: Option<Duration>,
    /// Upper bound for the final commit, so a stuck disk doesn't hang termination.
    pub shutdown_timeout: Duration,
}

/// Plays the part of the host application: delivers `onInitialize`, keeps the checkpoint alive,
/// asks for display refreshes and delivers `onShutdown` once `shutdown` is cancelled.
pub async fn run_host(
    handle: TrackerHandle,
    clock: Arc<dyn Clock>,
    settings: HostSettings,
    shutdown: CancellationToken,
    mut on_refresh: impl FnMut(&TrackerHandle),
) -> Result<CommitSummary> {
    let start = handle
        .initialize()
        .await
        .inspect_err(|e| error!("Tracking can't start: {e}"))?;
    info!("Tracking started ({start:?})");

    let mut next_heartbeat = clock.instant() + settings.heartbeat_interval;
    let mut next_refresh = settings.refresh_interval.map(|v| clock.instant() + v);

    loop {
        let refresh_at = next_refresh;
        let refresh_clock = clock.clone();
        let refresh = async move {
            match refresh_at {
                Some(at) => refresh_clock.sleep_until(at).await,
                None => pending().await,
            }
        };

        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = clock.sleep_until(next_heartbeat) => {
                next_heartbeat += settings.heartbeat_interval;
                if let Err(e) = handle.heartbeat().await {
                    warn!("Heartbeat failed: {e}");
                }
            }
            _ = refresh => {
                next_refresh = next_refresh.zip(settings.refresh_interval).map(|(at, v)| at + v);
                on_refresh(&handle);
            }
        }
    }

    match tokio::time::timeout(settings.shutdown_timeout, handle.shutdown()).await {
        Ok(Ok(summary)) => Ok(summary),
        Ok(Err(e)) => {
            error!("Final commit failed, this session is lost: {e}");
            Err(e.into())
        }
        Err(_) => {
            error!(
                "Final commit didn't finish within {:?}",
                settings.shutdown_timeout
            );
            Err(anyhow!(
                "Final commit timed out after {:?}",
                settings.shutdown_timeout
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{future::pending, sync::Arc, time::Duration};

    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use tokio::time::Instant;
    use tokio_util::sync::CancellationToken;

    use crate::{
        error::TrackerError,
        storage::{
            checkpoint::{CheckpointStore, MemoryCheckpointStore, DEFAULT_CHECKPOINT_KEY},
            log::{LogStorage, MockLogStorage, PersistentLog},
        },
        tracker::{handle::TrackerHandle, SessionTracker},
        utils::{clock::ManualClock, logging::TEST_LOGGING},
    };

    use super::{run_host, HostSettings};

    const SETTINGS: HostSettings = HostSettings {
        heartbeat_interval: Duration::from_secs(10),
        refresh_interval: Some(Duration::from_secs(15)),
        shutdown_timeout: Duration::from_secs(5),
    };

    fn in_memory_log() -> MockLogStorage {
        let mut storage = MockLogStorage::new();
        storage
            .expect_load()
            .returning(|| Ok(PersistentLog::default()));
        storage.expect_save().returning(|_| Ok(()));
        storage
    }

    #[tokio::test(start_paused = true)]
    async fn test_host_commits_on_shutdown() -> Result<()> {
        *TEST_LOGGING;
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 10, 16, 9, 0, 0).unwrap());
        let store = Arc::new(MemoryCheckpointStore::new());
        let handle = TrackerHandle::new(SessionTracker::new(
            Box::new(in_memory_log()),
            Box::new(store.clone()),
            Arc::new(clock.clone()),
            DEFAULT_CHECKPOINT_KEY,
        ));
        let shutdown = CancellationToken::new();
        let mut refreshes = 0;

        let (summary, _) = tokio::join!(
            run_host(
                handle.clone(),
                Arc::new(clock.clone()),
                SETTINGS,
                shutdown.clone(),
                |_| refreshes += 1,
            ),
            async {
                tokio::time::sleep(Duration::from_secs(35)).await;
                clock.advance(chrono::Duration::seconds(35));
                shutdown.cancel();
            }
        );

        let summary = summary?;
        assert_eq!(summary.elapsed, chrono::Duration::seconds(35));
        assert_eq!(summary.total_seconds, 35.);
        assert_eq!(refreshes, 2);
        assert!(!store.has(DEFAULT_CHECKPOINT_KEY).await?);
        Ok(())
    }

    /// A disk that accepts the write and never answers.
    struct HangingLogStorage;

    #[async_trait]
    impl LogStorage for HangingLogStorage {
        async fn load(&self) -> Result<PersistentLog, TrackerError> {
            Ok(PersistentLog::default())
        }

        async fn save(&self, _log: &PersistentLog) -> Result<(), TrackerError> {
            pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_host_bounds_final_commit() -> Result<()> {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 10, 16, 9, 0, 0).unwrap());
        let handle = TrackerHandle::new(SessionTracker::new(
            Box::new(HangingLogStorage),
            Box::new(MemoryCheckpointStore::new()),
            Arc::new(clock.clone()),
            DEFAULT_CHECKPOINT_KEY,
        ));
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let started = Instant::now();
        let result = run_host(handle, Arc::new(clock), SETTINGS, shutdown, |_| {}).await;

        assert!(result.is_err());
        assert_eq!(started.elapsed(), SETTINGS.shutdown_timeout);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_host_heartbeat_restores_checkpoint() -> Result<()> {
        let origin = Utc.with_ymd_and_hms(2026, 10, 16, 9, 0, 0).unwrap();
        let clock = ManualClock::new(origin);
        let store = Arc::new(MemoryCheckpointStore::new());
        let handle = TrackerHandle::new(SessionTracker::new(
            Box::new(in_memory_log()),
            Box::new(store.clone()),
            Arc::new(clock.clone()),
            DEFAULT_CHECKPOINT_KEY,
        ));
        let shutdown = CancellationToken::new();

        let (summary, restored) = tokio::join!(
            run_host(
                handle.clone(),
                Arc::new(clock.clone()),
                SETTINGS,
                shutdown.clone(),
                |_| {},
            ),
            async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                store.delete(DEFAULT_CHECKPOINT_KEY).await.unwrap();
                clock.advance(chrono::Duration::seconds(10));

                // First heartbeat is due 10s after start.
                tokio::time::sleep(Duration::from_secs(10)).await;
                let restored = store.get(DEFAULT_CHECKPOINT_KEY).await;
                shutdown.cancel();
                restored
            }
        );

        assert_eq!(restored?, origin);
        assert_eq!(summary?.elapsed, chrono::Duration::seconds(10));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_host_refuses_to_start_on_corrupt_log() -> Result<()> {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 10, 16, 9, 0, 0).unwrap());
        let mut storage = MockLogStorage::new();
        storage.expect_load().returning(|| {
            Err(TrackerError::LogLoad {
                path: "EditorTimeLog.json".into(),
                details: "expected value at line 1 column 1".into(),
            })
        });
        storage.expect_save().never();

        let handle = TrackerHandle::new(SessionTracker::new(
            Box::new(storage),
            Box::new(MemoryCheckpointStore::new()),
            Arc::new(clock.clone()),
            DEFAULT_CHECKPOINT_KEY,
        ));

        let result = run_host(
            handle,
            Arc::new(clock),
            SETTINGS,
            CancellationToken::new(),
            |_| {},
        )
        .await;
        assert!(result.is_err());
        Ok(())
    }
}
