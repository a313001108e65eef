//! Saved connection profiles
//!
//! The store is a plain JSON document read and written wholesale:
//!
//! ```json
//! { "groups": [ { "name": "work", "sessions": [ { "name": "web-01", "host": "10.0.0.5", ... } ] } ] }
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

fn default_port() -> u16 {
    22
}

/// How a profile proves its identity to the server
#[derive(Clone)]
pub enum Credential {
    Password(SecretString),
    PrivateKey {
        path: PathBuf,
        passphrase: Option<SecretString>,
    },
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Password(_) => f.debug_tuple("Password").field(&"[REDACTED]").finish(),
            Credential::PrivateKey { path, passphrase } => f
                .debug_struct("PrivateKey")
                .field("path", path)
                .field("passphrase", &passphrase.as_ref().map(|_| "[REDACTED]"))
                .finish(),
        }
    }
}

/// One saved connection, stored as a flat record
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionProfile {
    pub name: String,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Path to a private key file. Takes precedence over `password`.
    #[serde(
        default,
        rename = "privateKey",
        skip_serializing_if = "Option::is_none"
    )]
    pub private_key: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passphrase: Option<String>,
}

impl fmt::Debug for ConnectionProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionProfile")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("credential", &self.credential())
            .finish()
    }
}

impl ConnectionProfile {
    /// Profile with password authentication
    pub fn with_password(host: &str, username: &str, password: &str) -> Self {
        Self {
            name: format!("{}@{}", username, host),
            host: host.to_string(),
            port: default_port(),
            username: username.to_string(),
            password: Some(password.to_string()),
            private_key: None,
            passphrase: None,
        }
    }

    /// Profile with private key authentication
    pub fn with_private_key(
        host: &str,
        username: &str,
        key_path: impl Into<PathBuf>,
        passphrase: Option<&str>,
    ) -> Self {
        Self {
            name: format!("{}@{}", username, host),
            host: host.to_string(),
            port: default_port(),
            username: username.to_string(),
            password: None,
            private_key: Some(key_path.into()),
            passphrase: passphrase.map(str::to_string),
        }
    }

    /// The single credential form this profile uses.
    ///
    /// A key path wins over a password. A profile with neither falls back to
    /// an empty password, which the server will reject.
    pub fn credential(&self) -> Credential {
        match &self.private_key {
            Some(path) => Credential::PrivateKey {
                path: path.clone(),
                passphrase: self
                    .passphrase
                    .as_deref()
                    .filter(|p| !p.is_empty())
                    .map(SecretString::from),
            },
            None => Credential::Password(SecretString::from(
                self.password.clone().unwrap_or_default(),
            )),
        }
    }

    /// `host:port` for dialing and log lines
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Named folder of profiles
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProfileGroup {
    pub name: String,
    #[serde(default)]
    pub sessions: Vec<ConnectionProfile>,
}

/// Root of the profiles document
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ProfileStore {
    #[serde(default)]
    pub groups: Vec<ProfileGroup>,
    /// Profiles that are not filed under any group
    #[serde(default)]
    pub sessions: Vec<ConnectionProfile>,
}

impl ProfileStore {
    /// Find a profile by `group/name`, or by bare `name` among ungrouped ones.
    pub fn find(&self, reference: &str) -> Option<&ConnectionProfile> {
        match reference.split_once('/') {
            Some((group, name)) => self
                .groups
                .iter()
                .find(|g| g.name == group)?
                .sessions
                .iter()
                .find(|p| p.name == name),
            None => self.sessions.iter().find(|p| p.name == reference),
        }
    }

    /// Add a profile to `group`, creating the group if needed
    pub fn add(&mut self, group: &str, profile: ConnectionProfile) {
        match self.groups.iter_mut().find(|g| g.name == group) {
            Some(existing) => existing.sessions.push(profile),
            None => self.groups.push(ProfileGroup {
                name: group.to_string(),
                sessions: vec![profile],
            }),
        }
    }

    /// Remove a profile by `group` and `name`
    pub fn remove(&mut self, group: &str, name: &str) -> Result<ConnectionProfile, ConfigError> {
        let sessions = &mut self
            .groups
            .iter_mut()
            .find(|g| g.name == group)
            .ok_or_else(|| ConfigError::ProfileNotFound(format!("{}/{}", group, name)))?
            .sessions;
        let pos = sessions
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| ConfigError::ProfileNotFound(format!("{}/{}", group, name)))?;
        Ok(sessions.remove(pos))
    }

    /// Load from the default location
    pub fn load() -> Self {
        match super::paths::profiles_file() {
            Some(path) => Self::load_from(&path),
            None => {
                tracing::warn!("Could not determine profiles file path");
                Self::default()
            }
        }
    }

    /// Load from `path`. A missing or unreadable document yields an empty store.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match Self::read(path) {
            Ok(store) => store,
            Err(e) => {
                tracing::warn!("Ignoring unreadable profiles document: {}", e);
                Self::default()
            }
        }
    }

    /// Save to the default location
    pub fn save(&self) -> Result<(), ConfigError> {
        super::paths::ensure_config_dir().map_err(ConfigError::CreateDir)?;
        let path = super::paths::profiles_file().ok_or_else(|| ConfigError::WriteFile {
            path: PathBuf::from("neonterm-sessions.json"),
            source: std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Could not determine profiles file path",
            ),
        })?;
        self.save_to(&path)
    }

    /// Write the whole document to `path`
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self).map_err(|e| ConfigError::Json {
            path: path.to_path_buf(),
            source: e,
        })?;
        super::write_atomic(path, &content).map_err(|e| ConfigError::WriteFile {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Read a document picked by the user. Unlike `load_from`, a malformed
    /// file is an error so the caller can tell the user.
    pub fn import_from(path: &Path) -> Result<Self, ConfigError> {
        Self::read(path)
    }

    /// Write the document to a user-chosen location
    pub fn export_to(&self, path: &Path) -> Result<(), ConfigError> {
        self.save_to(path)
    }

    fn read(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(|e| ConfigError::Json {
            path: path.to_path_buf(),
            source: e,
        })
    }
}
