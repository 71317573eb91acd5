use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{
    config::{TrackerConfig, CHECKPOINT_FILE_NAME},
    storage::{
        checkpoint::{CheckpointStore, FileCheckpointStore, MemoryCheckpointStore},
        log::FileLogStorage,
    },
    tracker::{
        handle::TrackerHandle,
        host::run_host,
        shutdown::detect_shutdown,
        SessionTracker,
    },
    utils::{
        clock::{Clock, DefaultClock},
        time::format_duration,
    },
};

#[derive(Debug, clap::Args)]
pub struct RunCommand {
    #[arg(long = "log-path", help = "Time log file. Defaults to EditorTimeLog.json in the working directory")]
    log_path: Option<PathBuf>,
    #[arg(long = "heartbeat", help = "Seconds between checkpoint rewrites")]
    heartbeat_secs: Option<u64>,
    #[arg(long = "refresh", help = "Print the running times every this many seconds, 0 disables it")]
    refresh_secs: Option<u64>,
    #[arg(
        long,
        help = "Keep the checkpoint in memory only. A crash loses the session instead of recovering it"
    )]
    ephemeral: bool,
}

impl RunCommand {
    fn apply(&self, config: &mut TrackerConfig) {
        if let Some(log_path) = &self.log_path {
            config.log_path = log_path.clone();
        }
        if let Some(heartbeat_secs) = self.heartbeat_secs {
            config.heartbeat_secs = heartbeat_secs;
        }
        if let Some(refresh_secs) = self.refresh_secs {
            config.refresh_secs = refresh_secs;
        }
    }
}

/// Command to process `run`. The process itself is the tracked session: it starts with the
/// command and ends with Ctrl-C or SIGTERM.
pub async fn process_run_command(
    command: RunCommand,
    mut config: TrackerConfig,
    app_dir: &Path,
) -> Result<()> {
    command.apply(&mut config);
    config.validate()?;

    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
    let checkpoints: Box<dyn CheckpointStore> = if command.ephemeral {
        Box::new(MemoryCheckpointStore::new())
    } else {
        Box::new(FileCheckpointStore::new(app_dir.join(CHECKPOINT_FILE_NAME)))
    };
    info!("Tracking into {:?}", config.log_path);

    let tracker = SessionTracker::new(
        Box::new(FileLogStorage::new(config.log_path.clone())),
        checkpoints,
        clock.clone(),
        config.checkpoint_key.clone(),
    );
    let handle = TrackerHandle::new(tracker);
    let shutdown = CancellationToken::new();

    let (_, result) = tokio::join!(detect_shutdown(shutdown.clone()), async {
        let result = run_host(
            handle.clone(),
            clock,
            config.host_settings(),
            shutdown.clone(),
            print_live_status,
        )
        .await;
        // Stops signal detection when the host couldn't start.
        shutdown.cancel();
        result
    });

    let summary = result?;
    println!(
        "Session ended after {}. Total time: {}",
        format_duration(summary.elapsed),
        format_duration(handle.total_accumulated())
    );
    Ok(())
}

fn print_live_status(handle: &TrackerHandle) {
    println!(
        "Total Time: {}\tCurrent Session Time: {}",
        format_duration(handle.total_accumulated()),
        format_duration(handle.refresh())
    );
}

#[cfg(test)]
mod tests {
    use std::{path::PathBuf, time::Duration};

    use anyhow::Result;
    use clap::Parser;
    use tempfile::tempdir;

    use crate::config::{TrackerConfig, CONFIG_FILE_NAME};

    use super::RunCommand;

    #[derive(Parser)]
    struct RunArgs {
        #[command(flatten)]
        command: RunCommand,
    }

    #[test]
    fn test_flags_override_config_file() -> Result<()> {
        let dir = tempdir()?;
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "log_path = \"/srv/time.json\"\nheartbeat_secs = 30\nrefresh_secs = 5\n",
        )?;
        let mut config = TrackerConfig::load(dir.path())?;

        let args = RunArgs::try_parse_from([
            "run",
            "--heartbeat",
            "10",
            "--log-path",
            "/tmp/EditorTimeLog.json",
        ])?;
        args.command.apply(&mut config);

        assert_eq!(config.log_path, PathBuf::from("/tmp/EditorTimeLog.json"));
        assert_eq!(config.heartbeat_secs, 10);

        let settings = config.host_settings();
        assert_eq!(settings.heartbeat_interval, Duration::from_secs(10));
        assert_eq!(settings.refresh_interval, Some(Duration::from_secs(5)));
        Ok(())
    }
}
