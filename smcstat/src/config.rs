/*!
Configuration management for the status monitor.
*/

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use smc::{keys, protocol, SensorKey, SessionOptions};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::display::Fallback;

/// Main application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

impl AppConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self {
            monitor: MonitorConfig::default(),
            display: DisplayConfig::default(),
        }
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: AppConfig = toml::from_str(&content)
            .with_context(|| "Failed to parse config file as TOML")?;

        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load_from_file(path)
        } else {
            info!("No config at {}, using defaults", path.as_ref().display());
            Ok(Self::new())
        }
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .with_context(|| "Failed to serialize config to TOML")?;

        std::fs::write(path.as_ref(), content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// Reject values the monitor cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.monitor.refresh_interval_ms == 0 {
            bail!("monitor.refresh_interval_ms must be greater than zero");
        }
        if self.monitor.service_name.is_empty() {
            bail!("monitor.service_name must not be empty");
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Sensor and session settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Controller service class to discover
    pub service_name: String,

    /// Key read for the CPU line
    pub cpu_key: SensorKey,

    /// Key read for the GPU line
    pub gpu_key: SensorKey,

    /// Time between status line refreshes
    pub refresh_interval_ms: u64,

    /// Bound on each controller call; 0 disables the timeout
    pub call_timeout_ms: u64,
}

impl MonitorConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    /// Session options derived from this configuration
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            service_name: self.service_name.clone(),
            call_timeout: (self.call_timeout_ms > 0)
                .then(|| Duration::from_millis(self.call_timeout_ms)),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            service_name: protocol::SERVICE_NAME.to_string(),
            cpu_key: keys::CPU_PROXIMITY,
            gpu_key: keys::GPU_PROXIMITY,
            refresh_interval_ms: 5000,
            call_timeout_ms: protocol::DEFAULT_CALL_TIMEOUT.as_millis() as u64,
        }
    }
}

/// Status line rendering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// What to show for a sensor that could not be read
    pub unavailable: Fallback,

    /// Prefix each line with the local time
    pub show_timestamp: bool,

    /// Fixed number of decimals; shortest representation when unset
    pub precision: Option<usize>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            unavailable: Fallback::Zero,
            show_timestamp: false,
            precision: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_roundtrip() {
        let mut original_config = AppConfig::new();
        original_config.display.precision = Some(1);
        original_config.display.unavailable = Fallback::Dash;

        let temp_file = NamedTempFile::new().unwrap();
        let temp_path = temp_file.path();

        // Save and load
        original_config.save_to_file(temp_path).unwrap();
        let loaded_config = AppConfig::load_from_file(temp_path).unwrap();

        assert_eq!(original_config, loaded_config);
    }

    #[test]
    fn test_default_values() {
        let config = AppConfig::new();

        assert_eq!(config.monitor.service_name, "AppleSMC");
        assert_eq!(config.monitor.cpu_key.to_string(), "TC0P");
        assert_eq!(config.monitor.gpu_key.to_string(), "TG0P");
        assert_eq!(config.monitor.refresh_interval(), Duration::from_secs(5));
        assert_eq!(config.display.unavailable, Fallback::Zero);
        assert!(!config.display.show_timestamp);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [monitor]
            cpu_key = "TC0D"
            call_timeout_ms = 0
            "#,
        )
        .unwrap();

        assert_eq!(config.monitor.cpu_key.to_string(), "TC0D");
        assert_eq!(config.monitor.gpu_key.to_string(), "TG0P");
        assert_eq!(config.monitor.refresh_interval_ms, 5000);
        assert_eq!(config.monitor.session_options().call_timeout, None);
        assert_eq!(config.display, DisplayConfig::default());
    }

    #[test]
    fn test_invalid_key_rejected() {
        let parsed = toml::from_str::<AppConfig>(
            r#"
            [monitor]
            cpu_key = "TOOLONG"
            "#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut config = AppConfig::new();
        config.monitor.refresh_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_or_default(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, AppConfig::new());
    }
}
