//! Per-session lifecycle state

use serde::Serialize;

use super::health::HealthSnapshot;

/// Where a live session is in its lifecycle. A closed session has no phase:
/// it is simply absent from the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// Key reserved, transport dial in progress
    Connecting,
    Authenticating,
    /// Authenticated; poller started
    Ready,
    /// Shell and file channel negotiation in flight
    OpeningChannels,
    Active,
    /// A fatal error was reported and teardown is pending
    Closing,
}

impl SessionPhase {
    pub fn is_established(self) -> bool {
        matches!(
            self,
            SessionPhase::Ready | SessionPhase::OpeningChannels | SessionPhase::Active
        )
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionPhase::Connecting => "connecting",
            SessionPhase::Authenticating => "authenticating",
            SessionPhase::Ready => "ready",
            SessionPhase::OpeningChannels => "opening channels",
            SessionPhase::Active => "active",
            SessionPhase::Closing => "closing",
        };
        f.write_str(name)
    }
}

/// Identifies one incarnation of a session key.
///
/// Continuations hold a token instead of a handle and re-check it against the
/// registry before acting, so work left over from a closed session (or an
/// earlier session that used the same key) does nothing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionToken {
    pub(crate) key: String,
    pub(crate) id: u64,
}

impl SessionToken {
    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Read-only view of a live session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub key: String,
    pub phase: SessionPhase,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub cwd: String,
    pub health: Option<HealthSnapshot>,
    pub file_ops: bool,
    pub shell_open: bool,
}
