use std::sync::Arc;
use std::time::Duration;

use russh::client::Handle;
use russh::{ChannelMsg, Disconnect};
use russh_sftp::client::SftpSession as RusshSftpSession;
use secrecy::ExposeSecret;
use tokio::sync::{Mutex, mpsc};
use tokio::time::timeout;

use crate::error::{SftpError, SshError};
use crate::sftp::SftpSession;

use super::Transport;
use super::auth::ResolvedAuth;
use super::handler::ClientHandler;
use super::shell::{ShellEvent, ShellHandle, spawn_shell_io};

/// An established russh connection
pub struct SshTransport {
    handle: Arc<Mutex<Handle<ClientHandler>>>,
    addr: String,
    auth_timeout: Duration,
}

impl std::fmt::Debug for SshTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshTransport")
            .field("addr", &self.addr)
            .field("handle", &"<handle>")
            .finish()
    }
}

impl SshTransport {
    pub fn new(handle: Handle<ClientHandler>, addr: String, auth_timeout: Duration) -> Self {
        Self {
            handle: Arc::new(Mutex::new(handle)),
            addr,
            auth_timeout,
        }
    }

    async fn open_channel(&self) -> Result<russh::Channel<russh::client::Msg>, SshError> {
        let handle = self.handle.lock().await;
        handle
            .channel_open_session()
            .await
            .map_err(|e| SshError::Channel(format!("Failed to open channel: {}", e)))
    }
}

impl Transport for SshTransport {
    type Files = SftpSession;

    async fn authenticate(&self, username: &str, auth: ResolvedAuth) -> Result<(), SshError> {
        let attempt = async {
            let mut handle = self.handle.lock().await;
            match auth {
                // expose_secret() only at the point of authentication
                ResolvedAuth::Password(password) => {
                    handle
                        .authenticate_password(username, password.expose_secret())
                        .await
                }
                ResolvedAuth::PublicKey(key) => handle.authenticate_publickey(username, key).await,
            }
        };

        let result = timeout(self.auth_timeout, attempt)
            .await
            .map_err(|_| SshError::Timeout(self.addr.clone()))?
            .map_err(|e| SshError::AuthenticationFailed(e.to_string()))?;

        if !result.success() {
            return Err(SshError::AuthenticationFailed(
                "Authentication rejected by server".to_string(),
            ));
        }
        Ok(())
    }

    async fn open_shell(
        &self,
        terminal_size: (u16, u16),
        events: mpsc::UnboundedSender<ShellEvent>,
    ) -> Result<ShellHandle, SshError> {
        let channel = self.open_channel().await?;

        channel
            .request_pty(
                false,
                "xterm-256color",
                terminal_size.0 as u32,
                terminal_size.1 as u32,
                0,
                0,
                &[],
            )
            .await
            .map_err(|e| SshError::Channel(format!("PTY request failed: {}", e)))?;

        channel
            .request_shell(false)
            .await
            .map_err(|e| SshError::Channel(format!("Shell request failed: {}", e)))?;

        Ok(spawn_shell_io(channel, events))
    }

    async fn exec(&self, command: &str) -> Result<String, SshError> {
        let mut channel = self.open_channel().await?;

        channel
            .exec(true, command)
            .await
            .map_err(|e| SshError::Channel(format!("Failed to exec: {}", e)))?;

        let mut output = Vec::new();
        loop {
            match channel.wait().await {
                Some(ChannelMsg::Data { data }) => output.extend_from_slice(&data),
                Some(ChannelMsg::ExtendedData { data, .. }) => {
                    tracing::debug!("exec stderr ({} bytes)", data.len());
                }
                Some(ChannelMsg::ExitStatus { exit_status }) => {
                    if exit_status != 0 {
                        tracing::debug!("exec exited with status {}", exit_status);
                    }
                }
                Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => break,
                Some(_) => {}
            }
        }

        Ok(String::from_utf8_lossy(&output).into_owned())
    }

    async fn open_file_channel(&self) -> Result<SftpSession, SftpError> {
        let channel = self
            .open_channel()
            .await
            .map_err(|e| SftpError::ConnectionFailed(e.to_string()))?;

        channel
            .request_subsystem(true, "sftp")
            .await
            .map_err(|e| {
                SftpError::ConnectionFailed(format!("Failed to request SFTP subsystem: {}", e))
            })?;

        let sftp = RusshSftpSession::new(channel.into_stream())
            .await
            .map_err(|e| {
                SftpError::ConnectionFailed(format!("Failed to initialize SFTP session: {}", e))
            })?;

        Ok(SftpSession::new(sftp))
    }

    async fn disconnect(&self) -> Result<(), SshError> {
        let handle = self.handle.lock().await;
        handle
            .disconnect(Disconnect::ByApplication, "session closed", "en")
            .await
            .map_err(|e| SshError::Channel(e.to_string()))
    }
}
