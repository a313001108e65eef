//! Command snippets
//!
//! Stored as a flat JSON list of `{ id, name, cmd }` records.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// A single command snippet
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Snippet {
    /// Creation time in milliseconds, bumped on collision
    pub id: u64,
    pub name: String,
    pub cmd: String,
}

/// The whole snippet list
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct SnippetStore {
    pub snippets: Vec<Snippet>,
}

impl SnippetStore {
    /// Append a snippet and return its id. Empty names or commands are refused.
    pub fn add(&mut self, name: &str, cmd: &str) -> Option<u64> {
        if name.trim().is_empty() || cmd.trim().is_empty() {
            return None;
        }

        let now = chrono::Utc::now().timestamp_millis().max(0) as u64;
        let next_free = self.snippets.iter().map(|s| s.id + 1).max().unwrap_or(0);
        let id = now.max(next_free);

        self.snippets.push(Snippet {
            id,
            name: name.to_string(),
            cmd: cmd.to_string(),
        });
        Some(id)
    }

    pub fn find(&self, id: u64) -> Option<&Snippet> {
        self.snippets.iter().find(|s| s.id == id)
    }

    pub fn remove(&mut self, id: u64) -> Result<Snippet, ConfigError> {
        let pos = self
            .snippets
            .iter()
            .position(|s| s.id == id)
            .ok_or(ConfigError::SnippetNotFound(id))?;
        Ok(self.snippets.remove(pos))
    }

    /// Load from the default location
    pub fn load() -> Self {
        match super::paths::snippets_file() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load from `path`. A missing or unreadable list yields no snippets.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        let parsed = std::fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|content| serde_json::from_str(&content).map_err(|e| e.to_string()));

        match parsed {
            Ok(store) => store,
            Err(e) => {
                tracing::warn!("Ignoring unreadable snippets file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Save to the default location
    pub fn save(&self) -> Result<(), ConfigError> {
        super::paths::ensure_config_dir().map_err(ConfigError::CreateDir)?;

        let path = super::paths::snippets_file().ok_or_else(|| ConfigError::WriteFile {
            path: PathBuf::from("neonterm-snippets.json"),
            source: std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Could not determine snippets file path",
            ),
        })?;
        self.save_to(&path)
    }

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
}
