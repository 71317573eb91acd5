use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use tracing::warn;

use crate::{
    config::{TrackerConfig, CHECKPOINT_FILE_NAME},
    error::CheckpointError,
    storage::{
        checkpoint::{CheckpointStore, FileCheckpointStore},
        log::PersistentLog,
    },
    utils::time::{format_duration, seconds_to_duration},
};

#[derive(Debug, clap::Args)]
pub struct StatusCommand {
    #[arg(long = "log-path", help = "Time log file. Defaults to EditorTimeLog.json in the working directory")]
    log_path: Option<PathBuf>,
}

/// Command to process `status`. Reads only; neither the log nor the checkpoint is touched.
pub async fn process_status_command(
    command: StatusCommand,
    config: TrackerConfig,
    app_dir: &Path,
) -> Result<()> {
    let log_path = command.log_path.unwrap_or(config.log_path);
    let log = PersistentLog::load(&log_path).await?;

    let store = FileCheckpointStore::new(app_dir.join(CHECKPOINT_FILE_NAME));
    let pending = match store.get(&config.checkpoint_key).await {
        Ok(start) => Some(start),
        Err(CheckpointError::NotFound(_)) => None,
        Err(e) => {
            warn!("Couldn't read checkpoint: {e}");
            None
        }
    };

    print!("{}", render_status(&log, pending));
    Ok(())
}

fn render_status(log: &PersistentLog, pending: Option<DateTime<Utc>>) -> String {
    let mut lines = vec![format!(
        "Total Time: {}",
        format_duration(seconds_to_duration(log.total_seconds))
    )];

    let untracked = log.untracked_seconds();
    if untracked >= 1. {
        lines.push(format!(
            "Before daily tracking: {}",
            format_duration(seconds_to_duration(untracked))
        ));
    }

    lines.push(match pending {
        Some(start) => format!(
            "Open session since {} (still running, or recovered on next start)",
            start.with_timezone(&Local).format("%x %H:%M:%S")
        ),
        None => "No open session".to_string(),
    });

    if !log.daily_records.is_empty() {
        lines.push(String::new());
        lines.extend(log.daily_records.iter().map(|record| {
            format!(
                "{}\t{}",
                record.date,
                format_duration(seconds_to_duration(record.seconds))
            )
        }));
    }

    lines.push(String::new());
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use crate::storage::{entities::DailyRecord, log::PersistentLog};

    use super::render_status;

    #[test]
    fn test_render_status() {
        let log = PersistentLog {
            total_seconds: 3600. + 90. + 15.,
            daily_records: vec![
                DailyRecord::new("15-10-26", 90.),
                DailyRecord::new("16-10-26", 15.),
            ],
            last_commit: None,
        };

        assert_eq!(
            render_status(&log, None),
            "Total Time: 01:01:45\n\
             Before daily tracking: 01:00:00\n\
             No open session\n\
             \n\
             15-10-26\t00:01:30\n\
             16-10-26\t00:00:15\n"
        );
    }

    #[test]
    fn test_render_status_empty_log() {
        assert_eq!(
            render_status(&PersistentLog::default(), None),
            "Total Time: 00:00:00\nNo open session\n"
        );
    }
}
