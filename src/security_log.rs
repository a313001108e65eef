//! Security event logging for audit trails.
//!
//! Every event is emitted with `target: "security"` so it can be filtered
//! independently of the regular session logs:
//!
//! ```bash
//! RUST_LOG=security=info neonterm work/web-01
//! ```

use tracing::{info, warn};

/// Log an SSH authentication attempt.
pub fn log_auth_attempt(session: &str, host: &str, port: u16, username: &str, method: &str) {
    info!(
        target: "security",
        event = "auth_attempt",
        session = %session,
        host = %host,
        port = port,
        username = %username,
        method = %method,
        "SSH authentication attempt"
    );
}

/// Log a successful SSH authentication.
pub fn log_auth_success(session: &str, host: &str, port: u16, username: &str, method: &str) {
    info!(
        target: "security",
        event = "auth_success",
        session = %session,
        host = %host,
        port = port,
        username = %username,
        method = %method,
        "SSH authentication succeeded"
    );
}

/// Log a failed SSH authentication attempt.
pub fn log_auth_failure(
    session: &str,
    host: &str,
    port: u16,
    username: &str,
    method: &str,
    reason: &str,
) {
    warn!(
        target: "security",
        event = "auth_failure",
        session = %session,
        host = %host,
        port = port,
        username = %username,
        method = %method,
        reason = %reason,
        "SSH authentication failed"
    );
}

/// Log the host key presented by a server. Keys are accepted on first sight.
pub fn log_host_key_seen(host: &str, port: u16, key_type: &str, fingerprint: &str) {
    info!(
        target: "security",
        event = "host_key_seen",
        host = %host,
        port = port,
        key_type = %key_type,
        fingerprint = %fingerprint,
        "Accepted server host key"
    );
}

/// Log a file channel (SFTP subsystem) establishment.
pub fn log_file_channel_open(session: &str) {
    info!(
        target: "security",
        event = "file_channel_open",
        session = %session,
        "SFTP subsystem established"
    );
}

/// Log the teardown of a session's transport.
pub fn log_disconnect(session: &str, reason: &str) {
    info!(
        target: "security",
        event = "disconnect",
        session = %session,
        reason = %reason,
        "SSH session closed"
    );
}
