use std::path::PathBuf;
use thiserror::Error;

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse settings: {0}")]
    ParseSettings(#[from] toml::de::Error),

    #[error("Failed to serialize settings: {0}")]
    SerializeSettings(#[from] toml::ser::Error),

    #[error("Invalid JSON document '{path}': {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to write config file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    #[error("Snippet not found: {0}")]
    SnippetNotFound(u64),

    #[error("Failed to create config directory: {0}")]
    CreateDir(std::io::Error),
}

/// Transport-level (SSH) errors
#[derive(Error, Debug)]
pub enum SshError {
    #[error("Connection failed to {host}:{port}: {reason}")]
    ConnectionFailed {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Key file error: {0}")]
    KeyFile(String),

    #[error("Key file {0} is encrypted and needs a passphrase")]
    KeyFilePassphraseRequired(PathBuf),

    #[error("Wrong passphrase for key file {0}")]
    KeyFilePassphraseInvalid(PathBuf),

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Timeout connecting to {0}")]
    Timeout(String),

    #[error("russh error: {0}")]
    Russh(String),
}

impl From<russh::Error> for SshError {
    fn from(err: russh::Error) -> Self {
        SshError::Russh(err.to_string())
    }
}

/// File channel (SFTP) errors
#[derive(Error, Debug)]
pub enum SftpError {
    #[error("SFTP connection failed: {0}")]
    ConnectionFailed(String),

    #[error("File operation failed: {0}")]
    FileOperation(String),

    #[error("Transfer failed: {0}")]
    Transfer(String),

    #[error("Local I/O error: {0}")]
    LocalIo(String),
}

/// Errors surfaced by the session core.
///
/// `CredentialLoad`, `Transport` and `ShellOpen` are fatal to the session they
/// belong to. The remaining variants are soft: the session stays usable.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Key Load Error: {0}")]
    CredentialLoad(#[source] SshError),

    #[error("{0}")]
    Transport(#[source] SshError),

    #[error("Shell open failed: {0}")]
    ShellOpen(#[source] SshError),

    #[error("File channel unavailable for session '{0}'")]
    FileChannelUnavailable(String),

    #[error("Listing failed for '{path}': {source}")]
    Listing { path: String, source: SftpError },

    #[error("Transfer of '{item}' failed: {source}")]
    Transfer { item: String, source: SftpError },

    #[error("Session '{0}' already exists")]
    DuplicateSession(String),
}

impl SessionError {
    /// Whether this error ends the session it was raised for.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SessionError::CredentialLoad(_) | SessionError::Transport(_) | SessionError::ShellOpen(_)
        )
    }
}
