use russh::client::Handler;
use russh::keys::{HashAlg, PublicKey};

use crate::error::SshError;
use crate::security_log;

/// SSH client handler implementation
pub struct ClientHandler {
    host: String,
    port: u16,
}

impl ClientHandler {
    pub fn new(host: String, port: u16) -> Self {
        Self { host, port }
    }
}

/// SHA-256 fingerprint in OpenSSH notation
pub fn fingerprint(key: &PublicKey) -> String {
    key.fingerprint(HashAlg::Sha256).to_string()
}

impl Handler for ClientHandler {
    type Error = SshError;

    // Host keys are trusted on sight; the fingerprint goes to the audit log.
    async fn check_server_key(&mut self, server_public_key: &PublicKey) -> Result<bool, Self::Error> {
        security_log::log_host_key_seen(
            &self.host,
            self.port,
            server_public_key.algorithm().as_str(),
            &fingerprint(server_public_key),
        );
        Ok(true)
    }
}
