use std::sync::Arc;
use std::time::Duration;

use russh::client::{self, Config};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::config::{ConnectionProfile, CoreSettings};
use crate::error::SshError;

use super::Connector;
use super::handler::ClientHandler;
use super::session::SshTransport;

/// Dials hosts and completes the SSH handshake using russh
pub struct SshConnector {
    config: Arc<Config>,
    connection_timeout: Duration,
}

impl SshConnector {
    pub fn new(connection_timeout: Duration, keepalive_interval: Option<Duration>) -> Self {
        let config = Config {
            inactivity_timeout: Some(Duration::from_secs(3600)),
            keepalive_interval,
            keepalive_max: 3,
            ..Default::default()
        };

        Self {
            config: Arc::new(config),
            connection_timeout,
        }
    }

    pub fn from_settings(settings: &CoreSettings) -> Self {
        Self::new(settings.connect_timeout(), settings.keepalive_interval())
    }
}

impl Default for SshConnector {
    fn default() -> Self {
        Self::from_settings(&CoreSettings::default())
    }
}

impl Connector for SshConnector {
    type Transport = SshTransport;

    async fn connect(&self, profile: &ConnectionProfile) -> Result<SshTransport, SshError> {
        let addr = profile.address();

        let stream = timeout(self.connection_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| SshError::Timeout(addr.clone()))?
            .map_err(|e| SshError::ConnectionFailed {
                host: profile.host.clone(),
                port: profile.port,
                reason: e.to_string(),
            })?;

        let handler = ClientHandler::new(profile.host.clone(), profile.port);

        let handle = timeout(
            self.connection_timeout,
            client::connect_stream(self.config.clone(), stream, handler),
        )
        .await
        .map_err(|_| SshError::Timeout(addr.clone()))?
        .map_err(|e| SshError::ConnectionFailed {
            host: profile.host.clone(),
            port: profile.port,
            reason: e.to_string(),
        })?;

        tracing::debug!("SSH handshake completed with {}", addr);
        Ok(SshTransport::new(handle, addr, self.connection_timeout))
    }
}
