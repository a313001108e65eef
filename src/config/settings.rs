use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

fn default_connect_timeout() -> u64 {
    30
}

fn default_keepalive() -> u64 {
    60
}

fn default_poll_interval() -> u64 {
    5
}

fn default_poll_timeout() -> u64 {
    10
}

fn default_cols() -> u16 {
    80
}

fn default_rows() -> u16 {
    24
}

/// Settings for the session core, stored in settings.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CoreSettings {
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// 0 disables keepalive
    #[serde(default = "default_keepalive")]
    pub keepalive_interval_secs: u64,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
    #[serde(default = "default_cols")]
    pub terminal_cols: u16,
    #[serde(default = "default_rows")]
    pub terminal_rows: u16,
}

impl Default for CoreSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            keepalive_interval_secs: default_keepalive(),
            poll_interval_secs: default_poll_interval(),
            poll_timeout_secs: default_poll_timeout(),
            terminal_cols: default_cols(),
            terminal_rows: default_rows(),
        }
    }
}

impl CoreSettings {
    /// Load from the default location, falling back to defaults if absent
    pub fn load() -> Result<Self, ConfigError> {
        match super::paths::settings_file() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(ConfigError::ParseSettings)
    }

    /// Save to the default location
    pub fn save(&self) -> Result<(), ConfigError> {
        super::paths::ensure_config_dir().map_err(ConfigError::CreateDir)?;

        let path = super::paths::settings_file().ok_or_else(|| ConfigError::WriteFile {
            path: PathBuf::from("settings.toml"),
            source: std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Could not determine settings file path",
            ),
        })?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::SerializeSettings)?;
        super::write_atomic(path, &content).map_err(|e| ConfigError::WriteFile {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Runtime knobs derived from these settings
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            poll_interval: Duration::from_secs(self.poll_interval_secs.max(1)),
            poll_timeout: Duration::from_secs(self.poll_timeout_secs.max(1)),
            terminal_size: (self.terminal_cols, self.terminal_rows),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn keepalive_interval(&self) -> Option<Duration> {
        // Treat 0 as "no keepalive" to avoid immediate timeout
        if self.keepalive_interval_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.keepalive_interval_secs))
        }
    }
}

/// Timing and sizing used by the session registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Delay between health poll ticks
    pub poll_interval: Duration,
    /// Deadline for a single health poll command
    pub poll_timeout: Duration,
    /// Initial PTY size (cols, rows)
    pub terminal_size: (u16, u16),
}

impl Default for SessionOptions {
    fn default() -> Self {
        CoreSettings::default().session_options()
    }
}
