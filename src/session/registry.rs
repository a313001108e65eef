//! Session registry
//!
//! Owns every live session keyed by an opaque caller-chosen key, and with it
//! the transport, shell handle, file channel and poller task of that session.
//! All of a session's resources are released together by [`SessionRegistry::close`].
//!
//! The map is guarded by a synchronous mutex that is never held across an
//! await. Liveness checks and notification sends happen under that lock, so
//! once `close` returns nothing else is emitted for the closed session.
//!
//! Long-lived session tasks (poller, shell forwarder) hold only a weak
//! reference to the registry. Dropping the last registry handle stops them.

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::Mutex;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::{ConnectionProfile, SessionOptions};
use crate::error::SessionError;
use crate::facade::Notification;
use crate::security_log;
use crate::sftp::{RemoteEntry, navigator};
use crate::ssh::{Connector, ResolvedAuth, ShellEvent, ShellHandle, Transport};

use super::health::HealthSnapshot;
use super::poller::spawn_poller;
use super::state::{SessionPhase, SessionSnapshot, SessionToken};

/// File channel type produced by a connector's transports
pub type FilesOf<C> = <<C as Connector>::Transport as Transport>::Files;

pub type NotificationSender = mpsc::UnboundedSender<Notification>;

struct SessionEntry<T: Transport> {
    id: u64,
    phase: SessionPhase,
    profile: ConnectionProfile,
    transport: Option<Arc<T>>,
    files: Option<Arc<T::Files>>,
    shell: Option<ShellHandle>,
    poller: Option<JoinHandle<()>>,
    cwd: String,
    health: Option<HealthSnapshot>,
    nav_seq: u64,
}

impl<T: Transport> SessionEntry<T> {
    fn new(id: u64, profile: ConnectionProfile) -> Self {
        Self {
            id,
            phase: SessionPhase::Connecting,
            profile,
            transport: None,
            files: None,
            shell: None,
            poller: None,
            cwd: ".".to_string(),
            health: None,
            nav_seq: 0,
        }
    }
}

struct Inner<C: Connector> {
    connector: C,
    options: SessionOptions,
    sessions: Mutex<HashMap<String, SessionEntry<C::Transport>>>,
    next_id: AtomicU64,
    notifications: NotificationSender,
    drag_dir: OnceLock<TempDir>,
}

impl<C: Connector> Drop for Inner<C> {
    fn drop(&mut self) {
        let sessions = self.sessions.get_mut();
        for (key, mut entry) in sessions.drain() {
            if let Some(poller) = entry.poller.take() {
                poller.abort();
            }
            if let Some(shell) = entry.shell.take() {
                shell.close();
            }
            tracing::debug!("Session '{}' released with its registry", key);
        }
    }
}

/// Registry of live sessions. Cloning is cheap and shares the same sessions.
pub struct SessionRegistry<C: Connector> {
    inner: Arc<Inner<C>>,
}

impl<C: Connector> Clone for SessionRegistry<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Connector> SessionRegistry<C> {
    pub fn new(connector: C, options: SessionOptions, notifications: NotificationSender) -> Self {
        Self {
            inner: Arc::new(Inner {
                connector,
                options,
                sessions: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                notifications,
                drag_dir: OnceLock::new(),
            }),
        }
    }

    fn downgrade(&self) -> Weak<Inner<C>> {
        Arc::downgrade(&self.inner)
    }

    fn upgrade(inner: &Weak<Inner<C>>) -> Option<Self> {
        inner.upgrade().map(|inner| Self { inner })
    }

    pub fn options(&self) -> SessionOptions {
        self.inner.options
    }

    /// Open a session under `key`.
    ///
    /// Fails immediately with `DuplicateSession` if `key` is live. Other
    /// failures are also reported as an `Error` notification and leave nothing
    /// registered, except a shell failure, which is followed by `Closed`.
    /// A file channel failure is not an error: the session stays up without
    /// file operations. If the session is closed while this is in flight the
    /// call returns `Ok` and the half-built connection is dropped.
    pub async fn open(&self, key: &str, profile: ConnectionProfile) -> Result<(), SessionError> {
        let token = self.reserve(key, &profile)?;
        tracing::info!("Opening session '{}' to {}", key, profile.address());

        // Key material is read fresh for every attempt
        let auth = match ResolvedAuth::resolve(&profile.credential()).await {
            Ok(auth) => auth,
            Err(e) => return Err(self.abort_open(&token, SessionError::CredentialLoad(e))),
        };

        let transport = match self.inner.connector.connect(&profile).await {
            Ok(transport) => Arc::new(transport),
            Err(e) => return Err(self.abort_open(&token, SessionError::Transport(e))),
        };

        if !self.set_phase(&token, SessionPhase::Authenticating) {
            spawn_disconnect(key, transport, "closed while connecting");
            return Ok(());
        }

        let method = auth.method_name();
        security_log::log_auth_attempt(key, &profile.host, profile.port, &profile.username, method);

        if let Err(e) = transport.authenticate(&profile.username, auth).await {
            security_log::log_auth_failure(
                key,
                &profile.host,
                profile.port,
                &profile.username,
                method,
                &e.to_string(),
            );
            spawn_disconnect(key, transport, "authentication failed");
            return Err(self.abort_open(&token, SessionError::Transport(e)));
        }
        security_log::log_auth_success(key, &profile.host, profile.port, &profile.username, method);

        if !self.mark_ready(&token, &transport) {
            spawn_disconnect(key, transport, "closed while authenticating");
            return Ok(());
        }

        self.set_phase(&token, SessionPhase::OpeningChannels);

        let (shell_tx, shell_rx) = mpsc::unbounded_channel();
        let (shell, files) = tokio::join!(
            transport.open_shell(self.inner.options.terminal_size, shell_tx),
            transport.open_file_channel(),
        );

        match shell {
            Ok(handle) => self.attach_shell(&token, handle, shell_rx),
            Err(e) => {
                let err = SessionError::ShellOpen(e);
                self.fail_session(&token, &err);
                return Err(err);
            }
        }

        match files {
            Ok(files) => self.attach_files(&token, files),
            Err(e) => tracing::warn!(
                "{}: {}",
                SessionError::FileChannelUnavailable(key.to_string()),
                e
            ),
        }

        self.set_phase(&token, SessionPhase::Active);
        Ok(())
    }

    /// Close a session and release everything it owns.
    ///
    /// Returns `false` if `key` was not live. Closing twice is harmless and
    /// `Closed` is emitted only once. Must be called from within a Tokio
    /// runtime, which runs the transport disconnect.
    pub fn close(&self, key: &str) -> bool {
        let mut sessions = self.inner.sessions.lock();
        match sessions.remove(key) {
            Some(entry) => {
                self.teardown(key, entry, "closed by request");
                true
            }
            None => false,
        }
    }

    /// Close every live session
    pub fn close_all(&self) -> usize {
        let mut sessions = self.inner.sessions.lock();
        let drained: Vec<_> = sessions.drain().collect();
        let count = drained.len();
        for (key, entry) in drained {
            self.teardown(&key, entry, "shutdown");
        }
        count
    }

    pub fn lookup(&self, key: &str) -> Option<SessionSnapshot> {
        let sessions = self.inner.sessions.lock();
        sessions.get(key).map(|entry| SessionSnapshot {
            key: key.to_string(),
            phase: entry.phase,
            host: entry.profile.host.clone(),
            port: entry.profile.port,
            username: entry.profile.username.clone(),
            cwd: entry.cwd.clone(),
            health: entry.health.clone(),
            file_ops: entry.files.is_some(),
            shell_open: entry.shell.is_some(),
        })
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.inner.sessions.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.inner.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Queue bytes for the session's shell. Returns `false` if there is no
    /// open shell for `key`.
    pub fn write_shell(&self, key: &str, data: &[u8]) -> bool {
        let Some(shell) = self.shell(key) else {
            return false;
        };
        match shell.write(data) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!("Shell write for '{}' dropped: {}", key, e);
                false
            }
        }
    }

    pub fn resize_shell(&self, key: &str, cols: u16, rows: u16) -> bool {
        let Some(shell) = self.shell(key) else {
            return false;
        };
        shell.resize(cols, rows).is_ok()
    }

    fn shell(&self, key: &str) -> Option<ShellHandle> {
        self.inner
            .sessions
            .lock()
            .get(key)
            .and_then(|entry| entry.shell.clone())
    }

    // Continuation support for the navigator and transfer engine

    /// File channel of a live session, with the token to re-check it by
    pub(crate) fn file_channel(&self, key: &str) -> Option<(SessionToken, Arc<FilesOf<C>>)> {
        let sessions = self.inner.sessions.lock();
        let entry = sessions.get(key)?;
        let files = entry.files.clone()?;
        Some((
            SessionToken {
                key: key.to_string(),
                id: entry.id,
            },
            files,
        ))
    }

    /// File channel for `token`, or `None` once that session is gone
    pub(crate) fn file_channel_for(&self, token: &SessionToken) -> Option<Arc<FilesOf<C>>> {
        self.with_live(token, |entry| entry.files.clone()).flatten()
    }

    /// Claim the next navigation sequence number for `key`
    pub(crate) fn begin_navigation(
        &self,
        key: &str,
    ) -> Option<(SessionToken, u64, Arc<FilesOf<C>>)> {
        let mut sessions = self.inner.sessions.lock();
        let entry = sessions.get_mut(key)?;
        let files = entry.files.clone()?;
        entry.nav_seq += 1;
        Some((
            SessionToken {
                key: key.to_string(),
                id: entry.id,
            },
            entry.nav_seq,
            files,
        ))
    }

    /// Publish a navigation result unless a newer navigation was started.
    /// Updates the session's working directory on success.
    pub(crate) fn complete_navigation(
        &self,
        token: &SessionToken,
        seq: u64,
        path: &str,
        entries: Vec<RemoteEntry>,
    ) -> bool {
        let notifications = &self.inner.notifications;
        self.with_live(token, |entry| {
            if entry.nav_seq != seq {
                return false;
            }
            entry.cwd = path.to_string();
            send(
                notifications,
                Notification::DirectoryListing {
                    key: token.key.clone(),
                    path: path.to_string(),
                    entries,
                },
            );
            true
        })
        .unwrap_or(false)
    }

    /// Send `notification` if `token` is still live
    pub(crate) fn emit_if_live(&self, token: &SessionToken, notification: Notification) -> bool {
        let notifications = &self.inner.notifications;
        self.with_live(token, |_| send(notifications, notification))
            .is_some()
    }

    /// Process-scoped directory for drag-out exports, created on first use
    pub(crate) fn drag_dir(&self) -> std::io::Result<PathBuf> {
        if let Some(dir) = self.inner.drag_dir.get() {
            return Ok(dir.path().to_path_buf());
        }
        let dir = tempfile::Builder::new().prefix("neonterm-drag-").tempdir()?;
        Ok(self.inner.drag_dir.get_or_init(|| dir).path().to_path_buf())
    }

    // Lifecycle steps

    fn reserve(&self, key: &str, profile: &ConnectionProfile) -> Result<SessionToken, SessionError> {
        let mut sessions = self.inner.sessions.lock();
        if sessions.contains_key(key) {
            tracing::warn!("Rejected open of '{}': key already in use", key);
            return Err(SessionError::DuplicateSession(key.to_string()));
        }
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        sessions.insert(key.to_string(), SessionEntry::new(id, profile.clone()));
        Ok(SessionToken {
            key: key.to_string(),
            id,
        })
    }

    /// Drop the reservation for a failed open and report the failure
    fn abort_open(&self, token: &SessionToken, err: SessionError) -> SessionError {
        tracing::error!("Session '{}' failed to open: {}", token.key, err);
        let mut sessions = self.inner.sessions.lock();
        if sessions.get(&token.key).is_some_and(|entry| entry.id == token.id) {
            sessions.remove(&token.key);
            send(
                &self.inner.notifications,
                Notification::Error {
                    key: token.key.clone(),
                    message: err.to_string(),
                },
            );
        }
        err
    }

    fn set_phase(&self, token: &SessionToken, phase: SessionPhase) -> bool {
        self.with_live(token, |entry| {
            tracing::debug!("Session '{}': {} -> {}", token.key, entry.phase, phase);
            entry.phase = phase;
        })
        .is_some()
    }

    /// Store the authenticated transport, announce readiness and start polling
    fn mark_ready(&self, token: &SessionToken, transport: &Arc<C::Transport>) -> bool {
        let notifications = &self.inner.notifications;
        let options = self.inner.options;
        self.with_live(token, |entry| {
            entry.transport = Some(Arc::clone(transport));
            entry.phase = SessionPhase::Ready;
            send(
                notifications,
                Notification::Ready {
                    key: token.key.clone(),
                },
            );

            let registry = self.downgrade();
            let poll_token = token.clone();
            entry.poller = Some(spawn_poller(
                Arc::clone(transport),
                options.poll_interval,
                options.poll_timeout,
                move |snapshot| {
                    let live = Self::upgrade(&registry)
                        .is_some_and(|registry| registry.record_health(&poll_token, snapshot));
                    if live {
                        ControlFlow::Continue(())
                    } else {
                        ControlFlow::Break(())
                    }
                },
            ));
        })
        .is_some()
    }

    fn attach_shell(
        &self,
        token: &SessionToken,
        handle: ShellHandle,
        events: mpsc::UnboundedReceiver<ShellEvent>,
    ) {
        let stored = self
            .with_live(token, |entry| entry.shell = Some(handle.clone()))
            .is_some();
        if !stored {
            handle.close();
            return;
        }
        self.spawn_shell_forwarder(token.clone(), events);
    }

    fn attach_files(&self, token: &SessionToken, files: FilesOf<C>) {
        let stored = self
            .with_live(token, |entry| entry.files = Some(Arc::new(files)))
            .is_some();
        if !stored {
            return;
        }
        security_log::log_file_channel_open(&token.key);

        let registry = self.clone();
        let key = token.key.clone();
        tokio::spawn(async move {
            if let Err(e) = navigator::navigate(&registry, &key, ".").await {
                tracing::warn!("Initial listing for '{}' failed: {}", key, e);
            }
        });
    }

    /// Report a fatal error for a live session, then close it
    fn fail_session(&self, token: &SessionToken, err: &SessionError) {
        tracing::error!("Session '{}' failed: {}", token.key, err);
        let notifications = &self.inner.notifications;
        self.with_live(token, |entry| {
            entry.phase = SessionPhase::Closing;
            send(
                notifications,
                Notification::Error {
                    key: token.key.clone(),
                    message: err.to_string(),
                },
            );
        });
        self.close_token(token);
    }

    /// Store and publish a poll result. Returns `false` once the session is gone.
    fn record_health(&self, token: &SessionToken, snapshot: HealthSnapshot) -> bool {
        let notifications = &self.inner.notifications;
        self.with_live(token, |entry| {
            entry.health = Some(snapshot.clone());
            send(
                notifications,
                Notification::HealthSnapshot {
                    key: token.key.clone(),
                    snapshot,
                },
            );
        })
        .is_some()
    }

    fn spawn_shell_forwarder(
        &self,
        token: SessionToken,
        mut events: mpsc::UnboundedReceiver<ShellEvent>,
    ) {
        let weak = self.downgrade();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let Some(registry) = Self::upgrade(&weak) else {
                    return;
                };
                match event {
                    ShellEvent::Data(data) => {
                        registry.emit_if_live(
                            &token,
                            Notification::ShellOutput {
                                key: token.key.clone(),
                                data,
                            },
                        );
                    }
                    ShellEvent::Closed => break,
                }
            }

            let closed = Self::upgrade(&weak).is_some_and(|registry| registry.close_token(&token));
            if closed {
                tracing::info!("Shell stream for '{}' ended", token.key);
            }
        });
    }

    /// Close only the incarnation named by `token`
    fn close_token(&self, token: &SessionToken) -> bool {
        let mut sessions = self.inner.sessions.lock();
        if !sessions.get(&token.key).is_some_and(|entry| entry.id == token.id) {
            return false;
        }
        match sessions.remove(&token.key) {
            Some(entry) => {
                self.teardown(&token.key, entry, "shell stream ended");
                true
            }
            None => false,
        }
    }

    /// Release an entry already removed from the map. Runs under the map lock.
    fn teardown(&self, key: &str, mut entry: SessionEntry<C::Transport>, reason: &'static str) {
        if let Some(poller) = entry.poller.take() {
            poller.abort();
        }
        if let Some(shell) = entry.shell.take() {
            shell.close();
        }
        if let Some(transport) = entry.transport.take() {
            spawn_disconnect(key, transport, reason);
        }

        send(
            &self.inner.notifications,
            Notification::Closed {
                key: key.to_string(),
            },
        );
        tracing::info!("Session '{}' closed ({})", key, reason);
    }

    fn with_live<R>(
        &self,
        token: &SessionToken,
        f: impl FnOnce(&mut SessionEntry<C::Transport>) -> R,
    ) -> Option<R> {
        let mut sessions = self.inner.sessions.lock();
        match sessions.get_mut(&token.key) {
            Some(entry) if entry.id == token.id => Some(f(entry)),
            _ => None,
        }
    }
}

fn send(notifications: &NotificationSender, notification: Notification) {
    if notifications.send(notification).is_err() {
        tracing::trace!("Notification dropped: receiver gone");
    }
}

fn spawn_disconnect<T: Transport>(key: &str, transport: Arc<T>, reason: &'static str) {
    let key = key.to_string();
    tokio::spawn(async move {
        security_log::log_disconnect(&key, reason);
        if let Err(e) = transport.disconnect().await {
            tracing::debug!("Disconnect of '{}' failed: {}", key, e);
        }
    });
}
