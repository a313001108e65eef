//! Interactive shell stream plumbing

use russh::client::Msg;
use russh::{Channel, ChannelMsg};
use tokio::sync::mpsc;

use crate::error::SshError;

/// Commands that can be sent to the channel task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Data(Vec<u8>),
    WindowChange { cols: u32, rows: u32 },
    Close,
}

/// Events reported by the channel task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellEvent {
    /// Raw bytes from the remote shell (stdout and stderr interleaved)
    Data(Vec<u8>),
    /// The stream ended. Sent exactly once.
    Closed,
}

/// Ordered, non-blocking write side of a shell stream.
///
/// Writes are queued in submission order on a single channel drained by the
/// I/O task, so callers never wait on the network.
#[derive(Debug, Clone)]
pub struct ShellHandle {
    command_tx: mpsc::UnboundedSender<ShellCommand>,
}

impl ShellHandle {
    pub fn new(command_tx: mpsc::UnboundedSender<ShellCommand>) -> Self {
        Self { command_tx }
    }

    /// Send data to the remote shell
    pub fn write(&self, data: &[u8]) -> Result<(), SshError> {
        self.command(ShellCommand::Data(data.to_vec()))
    }

    /// Notify the remote shell of a window size change
    pub fn resize(&self, cols: u16, rows: u16) -> Result<(), SshError> {
        self.command(ShellCommand::WindowChange {
            cols: cols as u32,
            rows: rows as u32,
        })
    }

    /// Ask the I/O task to close the channel
    pub fn close(&self) {
        let _ = self.command_tx.send(ShellCommand::Close);
    }

    pub fn is_closed(&self) -> bool {
        self.command_tx.is_closed()
    }

    fn command(&self, cmd: ShellCommand) -> Result<(), SshError> {
        self.command_tx.send(cmd).map_err(|e| {
            tracing::debug!("Shell command dropped: {}", e);
            SshError::Channel("shell stream closed".to_string())
        })
    }
}

/// Spawn the task that owns a shell channel and shuttles bytes both ways
pub(crate) fn spawn_shell_io(
    mut channel: Channel<Msg>,
    events: mpsc::UnboundedSender<ShellEvent>,
) -> ShellHandle {
    let (command_tx, mut command_rx) = mpsc::unbounded_channel::<ShellCommand>();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                msg = channel.wait() => {
                    match msg {
                        Some(ChannelMsg::Data { data }) => {
                            if events.send(ShellEvent::Data(data.to_vec())).is_err() {
                                break;
                            }
                        }
                        Some(ChannelMsg::ExtendedData { data, .. }) => {
                            if events.send(ShellEvent::Data(data.to_vec())).is_err() {
                                break;
                            }
                        }
                        Some(ChannelMsg::ExitStatus { exit_status }) => {
                            tracing::debug!("Shell exit status: {}", exit_status);
                        }
                        Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => break,
                        Some(_) => {}
                    }
                }
                cmd = command_rx.recv() => {
                    match cmd {
                        Some(ShellCommand::Data(data)) => {
                            if let Err(e) = channel.data(&data[..]).await {
                                tracing::error!("Failed to send data: {}", e);
                            }
                        }
                        Some(ShellCommand::WindowChange { cols, rows }) => {
                            if let Err(e) = channel.window_change(cols, rows, 0, 0).await {
                                tracing::error!("Failed to send window change: {}", e);
                            }
                        }
                        Some(ShellCommand::Close) | None => {
                            let _ = channel.close().await;
                            break;
                        }
                    }
                }
            }
        }

        let _ = events.send(ShellEvent::Closed);
    });

    ShellHandle::new(command_tx)
}
