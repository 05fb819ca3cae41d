//! Configuration management for the patchbay client
//!
//! Loads the YAML configuration file. Every field has a default, so an
//! absent file or an empty section is valid.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tracing::info;
use url::Url;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub authority: AuthorityConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
}

/// Where the routing authority lives and how often to poll it
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AuthorityConfig {
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            poll_interval_ms: default_poll_interval_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// Visual keyboard range for the monitor view
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MonitorConfig {
    #[serde(default = "default_keyboard_base_note")]
    pub keyboard_base_note: u8,
    #[serde(default = "default_keyboard_octaves")]
    pub keyboard_octaves: u8,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            keyboard_base_note: default_keyboard_base_note(),
            keyboard_octaves: default_keyboard_octaves(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file with validation
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: AppConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Like `load`, but a missing file yields the defaults
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if fs::try_exists(path).await.unwrap_or(false) {
            return Self::load(path).await;
        }

        info!("No config at {}, using defaults", path.display());
        Ok(Self::default())
    }

    /// Validate configuration for correctness
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.authority.url)
            .with_context(|| format!("authority.url '{}' is not a valid URL", self.authority.url))?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("authority.url must be http or https, got '{}'", url.scheme());
        }

        if self.authority.poll_interval_ms == 0 {
            anyhow::bail!("authority.poll_interval_ms must be greater than 0");
        }
        if self.authority.request_timeout_ms == 0 {
            anyhow::bail!("authority.request_timeout_ms must be greater than 0");
        }

        if self.monitor.keyboard_octaves == 0 {
            anyhow::bail!("monitor.keyboard_octaves must be at least 1");
        }
        let top = self.monitor.keyboard_base_note as u32 + self.monitor.keyboard_octaves as u32 * 12 - 1;
        if top > 127 {
            anyhow::bail!(
                "Keyboard range {}..={} leaves the MIDI note range (0-127)",
                self.monitor.keyboard_base_note,
                top
            );
        }

        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.authority.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.authority.request_timeout_ms)
    }
}

// Default value functions
fn default_url() -> String { "http://localhost:8001/".to_string() }
fn default_poll_interval_ms() -> u64 { 5000 }
fn default_request_timeout_ms() -> u64 { 3000 }
fn default_keyboard_base_note() -> u8 { 36 }
fn default_keyboard_octaves() -> u8 { 4 }

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(yaml: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_load_full_config() {
        let file = write_config(
            r#"
authority:
  url: "http://raspberrypi.local:8001/"
  poll_interval_ms: 2000
  request_timeout_ms: 1500
monitor:
  keyboard_base_note: 48
  keyboard_octaves: 2
"#,
        );

        let config = AppConfig::load(file.path()).await.unwrap();
        assert_eq!(config.authority.url, "http://raspberrypi.local:8001/");
        assert_eq!(config.poll_interval(), Duration::from_secs(2));
        assert_eq!(config.request_timeout(), Duration::from_millis(1500));
        assert_eq!(config.monitor.keyboard_base_note, 48);
        assert_eq!(config.monitor.keyboard_octaves, 2);
    }

    #[tokio::test]
    async fn test_partial_config_uses_defaults() {
        let file = write_config("authority:\n  url: \"https://pi/aseq\"\n");

        let config = AppConfig::load(file.path()).await.unwrap();
        assert_eq!(config.authority.url, "https://pi/aseq");
        assert_eq!(config.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.monitor, MonitorConfig::default());
    }

    #[tokio::test]
    async fn test_missing_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_or_default(dir.path().join("patchbay.yaml"))
            .await
            .unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(AppConfig::load(dir.path().join("patchbay.yaml")).await.is_err());
    }

    #[tokio::test]
    async fn test_invalid_yaml_reports_path() {
        let file = write_config("authority: [not, a, map");
        let err = AppConfig::load(file.path()).await.unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse YAML config"));
    }

    #[test]
    fn test_validate_rejections() {
        let mut config = AppConfig::default();
        assert!(config.validate().is_ok());

        config.authority.url = "not a url".into();
        assert!(config.validate().is_err());
        config.authority.url = "ftp://pi/".into();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.authority.poll_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.authority.request_timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.monitor.keyboard_base_note = 120;
        assert!(config.validate().is_err());

        // 60 + 5 octaves ends on 119
        config.monitor.keyboard_base_note = 60;
        config.monitor.keyboard_octaves = 5;
        assert!(config.validate().is_ok());

        config.monitor.keyboard_octaves = 0;
        assert!(config.validate().is_err());
    }
}
