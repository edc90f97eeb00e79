//! Configuration for deckhand runs
//!
//! Loaded from an optional TOML file layered with `DECKHAND__*` environment
//! variables (double underscore separates sections, e.g.
//! `DECKHAND__SUPERVISION__TIMEOUT_SECS=600`).

use std::path::PathBuf;
use std::time::Duration;

use config::{Config, Environment, File};
use deckhand_process::{HostLaunchConfig, WatchdogConfig};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::eviction::AgingBatchReleaser;
use crate::remote::SaveFormat;
use crate::save::SaveConfig;
use crate::stability::StabilityProbe;
use crate::supervisor::SupervisorConfig;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeckhandConfig {
    pub host: HostSettings,
    pub supervision: SupervisionSettings,
    pub watchdog: WatchdogSettings,
    pub save: SaveSettings,
    pub eviction: EvictionSettings,
    pub logging: LoggingSettings,
}

/// Document host identity and optional launch command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostSettings {
    /// Process name the watchdog looks for
    pub process_name: String,
    /// Executable to launch before composing (None = host is started by automation)
    pub launch_command: Option<String>,
    /// Launch arguments
    pub launch_args: Vec<String>,
    /// Time the host gets to stabilize after launch
    pub settle_ms: u64,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            process_name: "POWERPNT".to_string(),
            launch_command: None,
            launch_args: Vec::new(),
            settle_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisionSettings {
    /// Whole-run timeout
    pub timeout_secs: u64,
    /// Grace period for a cancelled worker
    pub cancel_grace_ms: u64,
}

impl Default for SupervisionSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 300,
            cancel_grace_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogSettings {
    pub grace_period_ms: u64,
    pub poll_interval_ms: u64,
    pub kill_settle_ms: u64,
}

impl Default for WatchdogSettings {
    fn default() -> Self {
        Self {
            grace_period_ms: 2000,
            poll_interval_ms: 100,
            kill_settle_ms: 200,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveSettings {
    /// Output format
    pub format: SaveFormat,
    /// Size poll interval during confirmation
    pub poll_interval_ms: u64,
    /// Maximum confirmation polls
    pub max_polls: u32,
    /// Polls after the baseline that must see the size unchanged
    pub stable_polls: u32,
    /// Appearance checks after the save shortcut
    pub shortcut_retries: u32,
    /// Delay between appearance checks
    pub appear_interval_ms: u64,
}

impl Default for SaveSettings {
    fn default() -> Self {
        Self {
            format: SaveFormat::default(),
            poll_interval_ms: 1000,
            max_polls: 30,
            stable_polls: 3,
            shortcut_retries: 10,
            appear_interval_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvictionSettings {
    /// Tracked count that triggers a trim
    pub trigger_at: usize,
    /// Handles kept after a trim
    pub keep_recent: usize,
}

impl Default for EvictionSettings {
    fn default() -> Self {
        Self {
            trigger_at: 200,
            keep_recent: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// trace, debug, info, warn or error
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl DeckhandConfig {
    /// Check values that would make a run meaningless
    pub fn validate(&self) -> Result<()> {
        if self.host.process_name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "host.process_name must not be empty".to_string(),
            ));
        }
        if self.supervision.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "supervision.timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.save.max_polls == 0 || self.save.stable_polls == 0 {
            return Err(ConfigError::Validation(
                "save.max_polls and save.stable_polls must be greater than 0".to_string(),
            ));
        }
        if self.save.stable_polls > self.save.max_polls {
            return Err(ConfigError::Validation(
                "save.stable_polls cannot exceed save.max_polls".to_string(),
            ));
        }
        if self.eviction.keep_recent > self.eviction.trigger_at {
            return Err(ConfigError::Validation(
                "eviction.keep_recent cannot exceed eviction.trigger_at".to_string(),
            ));
        }
        if crate::logging::parse_level(&self.logging.level).is_none() {
            return Err(ConfigError::Validation(format!(
                "unknown log level: {}",
                self.logging.level
            )));
        }
        Ok(())
    }

    /// Supervisor settings
    pub fn supervisor(&self) -> SupervisorConfig {
        SupervisorConfig {
            timeout: Duration::from_secs(self.supervision.timeout_secs),
            cancel_grace: Duration::from_millis(self.supervision.cancel_grace_ms),
            host_process_name: self.host.process_name.clone(),
            releaser: self.releaser(),
        }
    }

    /// Watchdog settings
    pub fn watchdog(&self) -> WatchdogConfig {
        WatchdogConfig::default()
            .grace_period(Duration::from_millis(self.watchdog.grace_period_ms))
            .poll_interval(Duration::from_millis(self.watchdog.poll_interval_ms))
            .kill_settle(Duration::from_millis(self.watchdog.kill_settle_ms))
    }

    /// Save protocol settings
    pub fn save_protocol(&self) -> SaveConfig {
        SaveConfig {
            probe: StabilityProbe::new(
                Duration::from_millis(self.save.poll_interval_ms),
                self.save.max_polls,
                self.save.stable_polls,
            ),
            shortcut_retries: self.save.shortcut_retries,
            appear_interval: Duration::from_millis(self.save.appear_interval_ms),
        }
    }

    /// Handle trimming policy
    pub fn releaser(&self) -> AgingBatchReleaser {
        AgingBatchReleaser::new(self.eviction.trigger_at, self.eviction.keep_recent)
    }

    /// Launch settings, when a launch command is configured
    pub fn host_launch(&self) -> Option<HostLaunchConfig> {
        self.host.launch_command.as_ref().map(|command| {
            HostLaunchConfig::new(command.clone())
                .args(self.host.launch_args.clone())
                .settle(Duration::from_millis(self.host.settle_ms))
        })
    }
}

/// Loads [`DeckhandConfig`] from file and environment
pub struct ConfigLoader {
    /// Configuration file path
    config_path: PathBuf,
    /// Environment prefix
    env_prefix: String,
}

impl ConfigLoader {
    /// Loader for the default config location
    pub fn new() -> Self {
        Self::with_path(Self::default_config_path())
    }

    /// Loader for a specific file
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: path.into(),
            env_prefix: "DECKHAND".to_string(),
        }
    }

    /// Override the environment prefix
    pub fn env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Get default config path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("deckhand")
            .join("config.toml")
    }

    /// Path this loader reads
    pub fn path(&self) -> &PathBuf {
        &self.config_path
    }

    /// Load and validate; a missing file yields defaults
    pub fn load(&self) -> Result<DeckhandConfig> {
        let config = Config::builder()
            .add_source(File::from(self.config_path.clone()).required(false))
            .add_source(
                Environment::with_prefix(&self.env_prefix)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        let loaded: DeckhandConfig = config.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = DeckhandConfig::default();
        config.validate().unwrap();
        assert_eq!(config.supervisor().timeout, Duration::from_secs(300));
        assert_eq!(config.watchdog().grace_period, Duration::from_secs(2));
        assert_eq!(config.save_protocol().probe.stable_polls, 3);
        assert!(config.host_launch().is_none());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[host]
process_name = "soffice.bin"
launch_command = "soffice"
launch_args = ["--headless"]

[supervision]
timeout_secs = 60

[save]
format = "pdf"
stable_polls = 2
"#,
        )
        .unwrap();

        let config = ConfigLoader::with_path(&path)
            .env_prefix("DECKHAND_TEST_UNSET")
            .load()
            .unwrap();
        assert_eq!(config.host.process_name, "soffice.bin");
        assert_eq!(config.supervision.timeout_secs, 60);
        assert_eq!(config.save.format, SaveFormat::Pdf);
        assert_eq!(config.save.max_polls, 30);

        let launch = config.host_launch().unwrap();
        assert_eq!(launch.command, "soffice");
        assert_eq!(launch.args, vec!["--headless".to_string()]);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigLoader::with_path(dir.path().join("absent.toml"))
            .env_prefix("DECKHAND_TEST_UNSET")
            .load()
            .unwrap();
        assert_eq!(config, DeckhandConfig::default());
    }

    #[test]
    fn test_env_overrides_file_and_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("DECKHAND_ENVTEST__SUPERVISION__TIMEOUT_SECS", "600");
        let loaded = ConfigLoader::with_path(dir.path().join("absent.toml"))
            .env_prefix("DECKHAND_ENVTEST")
            .load();
        std::env::remove_var("DECKHAND_ENVTEST__SUPERVISION__TIMEOUT_SECS");

        let config = loaded.unwrap();
        assert_eq!(config.supervision.timeout_secs, 600);
        assert_eq!(config.supervisor().timeout, Duration::from_secs(600));
    }

    #[test]
    fn test_validation_rejects_inverted_eviction() {
        let mut config = DeckhandConfig::default();
        config.eviction.keep_recent = 500;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }
}
