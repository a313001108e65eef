//! SSH transport adapter
//!
//! The session core talks to the remote host through two capability traits:
//! [`Connector`] dials and hands back a [`Transport`], which authenticates and
//! then opens shells, runs commands and opens file channels. The russh-backed
//! implementations live in [`client`] and [`session`].

pub mod auth;
pub mod client;
pub mod handler;
pub mod session;
pub mod shell;

use std::future::Future;

use tokio::sync::mpsc;

use crate::config::ConnectionProfile;
use crate::error::{SftpError, SshError};
use crate::sftp::FileChannel;

pub use auth::ResolvedAuth;
pub use client::SshConnector;
pub use session::SshTransport;
pub use shell::{ShellCommand, ShellEvent, ShellHandle};

/// Dials a host and performs the SSH handshake
pub trait Connector: Send + Sync + 'static {
    type Transport: Transport;

    fn connect(
        &self,
        profile: &ConnectionProfile,
    ) -> impl Future<Output = Result<Self::Transport, SshError>> + Send;
}

/// One established SSH connection
pub trait Transport: Send + Sync + 'static {
    type Files: FileChannel;

    fn authenticate(
        &self,
        username: &str,
        auth: ResolvedAuth,
    ) -> impl Future<Output = Result<(), SshError>> + Send;

    /// Open an interactive PTY shell. Output and end-of-stream are reported
    /// on `events`; input goes through the returned handle.
    fn open_shell(
        &self,
        terminal_size: (u16, u16),
        events: mpsc::UnboundedSender<ShellEvent>,
    ) -> impl Future<Output = Result<ShellHandle, SshError>> + Send;

    /// Run `command` on a fresh exec channel and return its stdout
    fn exec(&self, command: &str) -> impl Future<Output = Result<String, SshError>> + Send;

    fn open_file_channel(&self) -> impl Future<Output = Result<Self::Files, SftpError>> + Send;

    fn disconnect(&self) -> impl Future<Output = Result<(), SshError>> + Send;
}
