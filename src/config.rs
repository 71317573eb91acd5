use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::debug;

use crate::{storage::checkpoint::DEFAULT_CHECKPOINT_KEY, tracker::host::HostSettings};

pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const DEFAULT_LOG_FILE_NAME: &str = "EditorTimeLog.json";
pub const CHECKPOINT_FILE_NAME: &str = "checkpoints.json";

/// Settings of the tracker. Read from `config.toml` in the application directory, command line
/// flags take precedence.
///
/// ```toml
/// log_path = "/home/me/project/EditorTimeLog.json"
/// heartbeat_secs = 30
/// refresh_secs = 5
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrackerConfig {
    /// Relative paths resolve against the working directory of the tracked process.
    pub log_path: PathBuf,
    pub checkpoint_key: String,
    pub heartbeat_secs: u64,
    /// 0 disables periodic refreshing.
    pub refresh_secs: u64,
    pub shutdown_timeout_secs: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            log_path: PathBuf::from(DEFAULT_LOG_FILE_NAME),
            checkpoint_key: DEFAULT_CHECKPOINT_KEY.to_string(),
            heartbeat_secs: 60,
            refresh_secs: 0,
            shutdown_timeout_secs: 5,
        }
    }
}

impl TrackerConfig {
    /// Loads `config.toml` from `app_dir`, falling back to defaults when there is none.
    pub fn load(app_dir: &Path) -> Result<Self> {
        let path = app_dir.join(CONFIG_FILE_NAME);
        let config = match std::fs::read_to_string(&path) {
            Ok(content) => toml::from_str::<TrackerConfig>(&content)
                .with_context(|| format!("Invalid config file {path:?}"))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No config file at {path:?}, using defaults");
                TrackerConfig::default()
            }
            Err(e) => return Err(e).with_context(|| format!("Can't read config file {path:?}")),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.heartbeat_secs == 0 {
            bail!("heartbeat_secs must be at least 1");
        }
        if self.shutdown_timeout_secs == 0 {
            bail!("shutdown_timeout_secs must be at least 1");
        }
        if self.checkpoint_key.trim().is_empty() {
            bail!("checkpoint_key can't be empty");
        }
        Ok(())
    }

    pub fn host_settings(&self) -> HostSettings {
        HostSettings {
            heartbeat_interval: Duration::from_secs(self.heartbeat_secs),
            refresh_interval: (self.refresh_secs > 0).then(|| Duration::from_secs(self.refresh_secs)),
            shutdown_timeout: Duration::from_secs(self.shutdown_timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{path::PathBuf, time::Duration};

    use anyhow::Result;
    use tempfile::tempdir;

    use super::{TrackerConfig, CONFIG_FILE_NAME};

    #[test]
    fn test_missing_config_is_default() -> Result<()> {
        let dir = tempdir()?;
        assert_eq!(TrackerConfig::load(dir.path())?, TrackerConfig::default());
        Ok(())
    }

    #[test]
    fn test_partial_config() -> Result<()> {
        let dir = tempdir()?;
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "log_path = \"/tmp/time.json\"\nrefresh_secs = 5\n",
        )?;

        let config = TrackerConfig::load(dir.path())?;
        assert_eq!(config.log_path, PathBuf::from("/tmp/time.json"));
        assert_eq!(config.heartbeat_secs, 60);

        let settings = config.host_settings();
        assert_eq!(settings.refresh_interval, Some(Duration::from_secs(5)));
        assert_eq!(settings.heartbeat_interval, Duration::from_secs(60));
        Ok(())
    }

    #[test]
    fn test_invalid_config() -> Result<()> {
        let dir = tempdir()?;
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "heartbeat_secs = 0\n")?;
        assert!(TrackerConfig::load(dir.path()).is_err());

        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "heartbeat = 10\n")?;
        assert!(TrackerConfig::load(dir.path()).is_err());
        Ok(())
    }

    #[test]
    fn test_refresh_disabled_by_default() {
        assert_eq!(TrackerConfig::default().host_settings().refresh_interval, None);
    }
}
