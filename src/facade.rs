//! Session facade: requests in, notifications out
//!
//! [`SessionFacade::handle`] routes a [`Request`] to the registry, navigator or
//! transfer engine on a spawned task and returns at once. Results and
//! failures come back as [`Notification`]s on the channel returned by
//! [`SessionFacade::new`]. Callers that want a result directly can use the
//! async methods instead; they emit the same notifications.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::config::{ConnectionProfile, SessionOptions};
use crate::error::SessionError;
use crate::session::{HealthSnapshot, SessionRegistry, SessionSnapshot};
use crate::sftp::transfer::{self, UploadReport};
use crate::sftp::{DownloadSummary, RemoteEntry, navigator};
use crate::ssh::Connector;

/// Inbound request, keyed by session
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Request {
    Connect {
        key: String,
        profile: ConnectionProfile,
    },
    Disconnect {
        key: String,
    },
    ShellInput {
        key: String,
        data: Vec<u8>,
    },
    ShellResize {
        key: String,
        cols: u16,
        rows: u16,
    },
    Navigate {
        key: String,
        path: String,
    },
    Upload {
        key: String,
        remote_dir: String,
        local_paths: Vec<PathBuf>,
    },
    Download {
        key: String,
        remote_src: String,
        local_dest: PathBuf,
    },
    DragExport {
        key: String,
        remote_path: String,
        filename: String,
    },
}

impl Request {
    pub fn key(&self) -> &str {
        match self {
            Request::Connect { key, .. }
            | Request::Disconnect { key }
            | Request::ShellInput { key, .. }
            | Request::ShellResize { key, .. }
            | Request::Navigate { key, .. }
            | Request::Upload { key, .. }
            | Request::Download { key, .. }
            | Request::DragExport { key, .. } => key,
        }
    }
}

/// Outbound notification, keyed by session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Notification {
    /// Authenticated; shell and poller are starting
    Ready { key: String },
    /// The session failed and is not usable
    Error { key: String, message: String },
    /// Shell stream ended or the session was closed
    Closed { key: String },
    ShellOutput { key: String, data: Vec<u8> },
    DirectoryListing {
        key: String,
        path: String,
        entries: Vec<RemoteEntry>,
    },
    HealthSnapshot {
        key: String,
        snapshot: HealthSnapshot,
    },
    /// One item of an upload or download failed
    TransferFailed {
        key: String,
        item: String,
        message: String,
    },
    DownloadComplete {
        key: String,
        remote: String,
        local: PathBuf,
        summary: DownloadSummary,
    },
    Exported {
        key: String,
        remote_path: String,
        local_path: PathBuf,
    },
}

impl Notification {
    pub fn key(&self) -> &str {
        match self {
            Notification::Ready { key }
            | Notification::Error { key, .. }
            | Notification::Closed { key }
            | Notification::ShellOutput { key, .. }
            | Notification::DirectoryListing { key, .. }
            | Notification::HealthSnapshot { key, .. }
            | Notification::TransferFailed { key, .. }
            | Notification::DownloadComplete { key, .. }
            | Notification::Exported { key, .. } => key,
        }
    }
}

pub struct SessionFacade<C: Connector> {
    registry: SessionRegistry<C>,
}

impl<C: Connector> Clone for SessionFacade<C> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
        }
    }
}

impl<C: Connector> SessionFacade<C> {
    /// Create a facade with its own registry, returning the notification stream
    pub fn new(connector: C, options: SessionOptions) -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let registry = SessionRegistry::new(connector, options, tx);
        (Self::with_registry(registry), rx)
    }

    pub fn with_registry(registry: SessionRegistry<C>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &SessionRegistry<C> {
        &self.registry
    }

    /// Dispatch a request without waiting for it.
    ///
    /// Shell input and resize are queued before this returns so writes keep
    /// their submission order; everything else runs on its own task. Must be
    /// called from within a Tokio runtime.
    pub fn handle(&self, request: Request) {
        tracing::trace!("Request {:?}", request);
        match request {
            Request::Connect { key, profile } => {
                let registry = self.registry.clone();
                tokio::spawn(async move {
                    if let Err(e) = registry.open(&key, profile).await {
                        tracing::debug!("Connect for '{}' ended with: {}", key, e);
                    }
                });
            }
            Request::Disconnect { key } => {
                self.disconnect(&key);
            }
            Request::ShellInput { key, data } => {
                self.shell_input(&key, &data);
            }
            Request::ShellResize { key, cols, rows } => {
                self.shell_resize(&key, cols, rows);
            }
            Request::Navigate { key, path } => {
                let registry = self.registry.clone();
                tokio::spawn(async move {
                    if let Err(e) = navigator::navigate(&registry, &key, &path).await {
                        tracing::warn!("Navigate for '{}': {}", key, e);
                    }
                });
            }
            Request::Upload {
                key,
                remote_dir,
                local_paths,
            } => {
                let registry = self.registry.clone();
                tokio::spawn(async move {
                    if let Err(e) = transfer::upload(&registry, &key, &remote_dir, &local_paths).await
                    {
                        tracing::warn!("Upload for '{}': {}", key, e);
                    }
                });
            }
            Request::Download {
                key,
                remote_src,
                local_dest,
            } => {
                let registry = self.registry.clone();
                tokio::spawn(async move {
                    if let Err(e) =
                        transfer::download(&registry, &key, &remote_src, &local_dest).await
                    {
                        tracing::warn!("Download for '{}': {}", key, e);
                    }
                });
            }
            Request::DragExport {
                key,
                remote_path,
                filename,
            } => {
                let registry = self.registry.clone();
                tokio::spawn(async move {
                    if let Err(e) =
                        transfer::export_to_temp(&registry, &key, &remote_path, &filename).await
                    {
                        tracing::warn!("Drag export for '{}': {}", key, e);
                    }
                });
            }
        }
    }

    pub async fn connect(&self, key: &str, profile: ConnectionProfile) -> Result<(), SessionError> {
        self.registry.open(key, profile).await
    }

    pub fn disconnect(&self, key: &str) -> bool {
        self.registry.close(key)
    }

    pub fn shell_input(&self, key: &str, data: &[u8]) -> bool {
        self.registry.write_shell(key, data)
    }

    pub fn shell_resize(&self, key: &str, cols: u16, rows: u16) -> bool {
        self.registry.resize_shell(key, cols, rows)
    }

    pub async fn navigate(
        &self,
        key: &str,
        path: &str,
    ) -> Result<Option<Vec<RemoteEntry>>, SessionError> {
        navigator::navigate(&self.registry, key, path).await
    }

    pub async fn upload(
        &self,
        key: &str,
        remote_dir: &str,
        local_paths: &[PathBuf],
    ) -> Result<UploadReport, SessionError> {
        transfer::upload(&self.registry, key, remote_dir, local_paths).await
    }

    pub async fn download(
        &self,
        key: &str,
        remote_src: &str,
        local_dest: &std::path::Path,
    ) -> Result<DownloadSummary, SessionError> {
        transfer::download(&self.registry, key, remote_src, local_dest).await
    }

    pub async fn export_to_temp(
        &self,
        key: &str,
        remote_path: &str,
        filename: &str,
    ) -> Result<Option<PathBuf>, SessionError> {
        transfer::export_to_temp(&self.registry, key, remote_path, filename).await
    }

    pub fn lookup(&self, key: &str) -> Option<SessionSnapshot> {
        self.registry.lookup(key)
    }

    /// Close every session
    pub fn shutdown(&self) -> usize {
        self.registry.close_all()
    }
}
