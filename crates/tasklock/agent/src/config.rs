use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const STORAGE_FILE: &str = "restrictions.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Config file not found at {0}")]
    NotFound(PathBuf),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Bundle ID of the main application. Never blocked, relaunched from the
    /// blocking screen.
    pub application_id: String,
    /// Directory holding the durable restriction record.
    pub data_dir: PathBuf,
    /// Unix socket the main application pushes configuration through.
    pub socket_path: PathBuf,
    pub timing: TimingConfig,
}

/// Enforcement timing, all in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Repeat blocks of the same app inside this window are dropped.
    pub cooldown_ms: u64,
    /// Delay between the home navigation and the blocking screen.
    pub present_delay_ms: u64,
    /// Delay before checking whether the blocked app is still on screen.
    pub verify_delay_ms: u64,
    /// Period of the full window scan.
    pub scan_interval_ms: u64,
    /// Period of the frontmost-app poll on hosts without focus events.
    pub poll_interval_ms: u64,
}

impl TimingConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn present_delay(&self) -> Duration {
        Duration::from_millis(self.present_delay_ms)
    }

    pub fn verify_delay(&self) -> Duration {
        Duration::from_millis(self.verify_delay_ms)
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: 1000,
            present_delay_ms: 100,
            verify_delay_ms: 500,
            scan_interval_ms: 1000,
            poll_interval_ms: 100,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("/etc"))
            .join("tasklock")
            .join("config.toml")
    }

    /// Location of the durable restriction record.
    pub fn storage_path(&self) -> PathBuf {
        self.data_dir.join(STORAGE_FILE)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            application_id: "dev.tasklock.app".to_string(),
            data_dir: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("/var/lib"))
                .join("tasklock"),
            socket_path: PathBuf::from("/tmp/tasklock.sock"),
            timing: TimingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timing() {
        let timing = TimingConfig::default();
        assert_eq!(timing.cooldown(), Duration::from_secs(1));
        assert!(timing.present_delay() < timing.verify_delay());
    }

    #[test]
    fn test_partial_config() {
        let config: Config = toml::from_str(
            r#"
application_id = "com.example.habits"

[timing]
verify_delay_ms = 750
"#,
        )
        .unwrap();

        assert_eq!(config.application_id, "com.example.habits");
        assert_eq!(config.timing.verify_delay_ms, 750);
        assert_eq!(config.timing.cooldown_ms, 1000);
        assert!(config.storage_path().ends_with("restrictions.json"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
application_id = "com.example.habits"
socket_path = "/run/tasklock.sock"

[timing]
cooldown_ms = 2500
"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.application_id, "com.example.habits");
        assert_eq!(config.socket_path, PathBuf::from("/run/tasklock.sock"));
        assert_eq!(config.timing.cooldown(), Duration::from_millis(2500));
        assert_eq!(config.timing.verify_delay_ms, 500);
    }

    #[test]
    fn test_load_from_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[timing]\ncooldown_ms = \"soon\"\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load_from(&dir.path().join("config.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }
}
