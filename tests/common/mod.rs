//! Common test utilities
//!
//! In-memory fakes of the transport capability traits. A [`FakeConnector`]
//! hands out transports backed by a per-host [`FakeHost`], whose knobs decide
//! how connect, auth, shell, exec and the file channel behave.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep, timeout};

use neonterm::config::{ConnectionProfile, SessionOptions};
use neonterm::error::{SftpError, SshError};
use neonterm::sftp::{FileChannel, RemoteEntry};
use neonterm::ssh::{Connector, ResolvedAuth, ShellCommand, ShellEvent, ShellHandle, Transport};
use neonterm::{Notification, SessionFacade};

pub const DIR_MODE: u32 = 0o040755;
pub const FILE_MODE: u32 = 0o100644;

/// Test environment with isolated configuration directory
pub struct TestEnvironment {
    pub config_dir: TempDir,
    pub profiles_path: PathBuf,
    pub snippets_path: PathBuf,
    pub settings_path: PathBuf,
}

impl TestEnvironment {
    pub fn new() -> Self {
        let config_dir = TempDir::new().expect("Failed to create temp dir");
        let profiles_path = config_dir.path().join("neonterm-sessions.json");
        let snippets_path = config_dir.path().join("neonterm-snippets.json");
        let settings_path = config_dir.path().join("settings.toml");
        Self {
            config_dir,
            profiles_path,
            snippets_path,
            settings_path,
        }
    }
}

impl Default for TestEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

/// How `exec` answers on a fake host
#[derive(Debug, Clone)]
pub enum ExecMode {
    Output(String),
    Fail,
    Hang,
    Delayed(Duration, String),
}

/// Behaviour and recorded activity of one fake remote host
pub struct FakeHost {
    pub connect_error: Mutex<Option<String>>,
    pub auth_error: Mutex<Option<String>>,
    pub shell_error: Mutex<Option<String>>,
    pub files_error: Mutex<Option<String>>,
    pub exec_mode: Mutex<ExecMode>,

    /// Remote directories: path -> entries in server order
    pub dirs: Mutex<HashMap<String, Vec<RemoteEntry>>>,
    /// Remote file contents by full path
    pub files: Mutex<HashMap<String, Vec<u8>>>,
    pub list_failures: Mutex<HashSet<String>>,
    pub list_delays: Mutex<HashMap<String, Duration>>,
    pub download_failures: Mutex<HashSet<String>>,

    pub connects: AtomicUsize,
    pub auths: AtomicUsize,
    pub execs: AtomicUsize,
    pub disconnects: AtomicUsize,
    pub auth_methods: Mutex<Vec<&'static str>>,

    /// Sender feeding the registry's shell reader, once a shell is open
    pub shell_events: Mutex<Option<mpsc::UnboundedSender<ShellEvent>>>,
    /// Everything written to the shell handle
    pub shell_input: Mutex<Option<mpsc::UnboundedReceiver<ShellCommand>>>,
}

impl Default for FakeHost {
    fn default() -> Self {
        Self {
            connect_error: Mutex::new(None),
            auth_error: Mutex::new(None),
            shell_error: Mutex::new(None),
            files_error: Mutex::new(None),
            exec_mode: Mutex::new(ExecMode::Output(
                "LOAD:0.42\nMEM:512/2048MB 25.0%\nDISK:10G/50G (20%)\n".to_string(),
            )),
            dirs: Mutex::new(HashMap::new()),
            files: Mutex::new(HashMap::new()),
            list_failures: Mutex::new(HashSet::new()),
            list_delays: Mutex::new(HashMap::new()),
            download_failures: Mutex::new(HashSet::new()),
            connects: AtomicUsize::new(0),
            auths: AtomicUsize::new(0),
            execs: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
            auth_methods: Mutex::new(Vec::new()),
            shell_events: Mutex::new(None),
            shell_input: Mutex::new(None),
        }
    }
}

impl FakeHost {
    pub fn add_dir(&self, path: &str, entries: Vec<RemoteEntry>) {
        self.dirs.lock().insert(path.to_string(), entries);
    }

    pub fn add_file(&self, path: &str, content: &[u8]) {
        self.files.lock().insert(path.to_string(), content.to_vec());
    }

    pub fn set_exec(&self, mode: ExecMode) {
        *self.exec_mode.lock() = mode;
    }

    /// Push output as if the remote shell printed it
    pub fn shell_output(&self, data: &[u8]) {
        if let Some(tx) = self.shell_events.lock().as_ref() {
            let _ = tx.send(ShellEvent::Data(data.to_vec()));
        }
    }

    /// End the shell stream from the remote side
    pub fn close_shell(&self) {
        if let Some(tx) = self.shell_events.lock().take() {
            let _ = tx.send(ShellEvent::Closed);
        }
    }

    /// Commands written to the shell so far
    pub fn take_shell_input(&self) -> Vec<ShellCommand> {
        let mut commands = Vec::new();
        if let Some(rx) = self.shell_input.lock().as_mut() {
            while let Ok(cmd) = rx.try_recv() {
                commands.push(cmd);
            }
        }
        commands
    }
}

/// Cloning shares the same hosts
#[derive(Clone, Default)]
pub struct FakeConnector {
    hosts: Arc<Mutex<HashMap<String, Arc<FakeHost>>>>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// The fake behind `host`, created on first use
    pub fn host(&self, host: &str) -> Arc<FakeHost> {
        self.hosts
            .lock()
            .entry(host.to_string())
            .or_insert_with(|| Arc::new(FakeHost::default()))
            .clone()
    }
}

impl Connector for FakeConnector {
    type Transport = FakeTransport;

    async fn connect(&self, profile: &ConnectionProfile) -> Result<FakeTransport, SshError> {
        let host = self.host(&profile.host);
        host.connects.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = host.connect_error.lock().clone() {
            return Err(SshError::ConnectionFailed {
                host: profile.host.clone(),
                port: profile.port,
                reason,
            });
        }
        Ok(FakeTransport { host })
    }
}

pub struct FakeTransport {
    host: Arc<FakeHost>,
}

impl Transport for FakeTransport {
    type Files = FakeFiles;

    async fn authenticate(&self, _username: &str, auth: ResolvedAuth) -> Result<(), SshError> {
        self.host.auths.fetch_add(1, Ordering::SeqCst);
        self.host.auth_methods.lock().push(auth.method_name());
        match self.host.auth_error.lock().clone() {
            Some(reason) => Err(SshError::AuthenticationFailed(reason)),
            None => Ok(()),
        }
    }

    async fn open_shell(
        &self,
        _terminal_size: (u16, u16),
        events: mpsc::UnboundedSender<ShellEvent>,
    ) -> Result<ShellHandle, SshError> {
        if let Some(reason) = self.host.shell_error.lock().clone() {
            return Err(SshError::Channel(reason));
        }
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        *self.host.shell_events.lock() = Some(events);
        *self.host.shell_input.lock() = Some(command_rx);
        Ok(ShellHandle::new(command_tx))
    }

    async fn exec(&self, _command: &str) -> Result<String, SshError> {
        self.host.execs.fetch_add(1, Ordering::SeqCst);
        let mode = self.host.exec_mode.lock().clone();
        match mode {
            ExecMode::Output(out) => Ok(out),
            ExecMode::Fail => Err(SshError::Channel("exec refused".to_string())),
            ExecMode::Hang => std::future::pending().await,
            ExecMode::Delayed(delay, out) => {
                sleep(delay).await;
                Ok(out)
            }
        }
    }

    async fn open_file_channel(&self) -> Result<FakeFiles, SftpError> {
        if let Some(reason) = self.host.files_error.lock().clone() {
            return Err(SftpError::ConnectionFailed(reason));
        }
        Ok(FakeFiles {
            host: self.host.clone(),
        })
    }

    async fn disconnect(&self) -> Result<(), SshError> {
        self.host.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct FakeFiles {
    host: Arc<FakeHost>,
}

impl FileChannel for FakeFiles {
    async fn read_dir(&self, path: &str) -> Result<Vec<RemoteEntry>, SftpError> {
        let delay = self.host.list_delays.lock().get(path).copied();
        if let Some(delay) = delay {
            sleep(delay).await;
        }
        if self.host.list_failures.lock().contains(path) {
            return Err(SftpError::FileOperation(format!("permission denied: {}", path)));
        }
        self.host
            .dirs
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| SftpError::FileOperation(format!("no such directory: {}", path)))
    }

    async fn stat_is_dir(&self, path: &str) -> Result<bool, SftpError> {
        if self.host.dirs.lock().contains_key(path) {
            return Ok(true);
        }
        if self.host.files.lock().contains_key(path) {
            return Ok(false);
        }
        Err(SftpError::FileOperation(format!("no such file: {}", path)))
    }

    async fn upload(&self, local_path: &Path, remote_path: &str) -> Result<u64, SftpError> {
        let content = tokio::fs::read(local_path)
            .await
            .map_err(|e| SftpError::LocalIo(format!("{}: {}", local_path.display(), e)))?;
        let size = content.len() as u64;

        let (dir, name) = remote_path.rsplit_once('/').unwrap_or((".", remote_path));
        self.host.files.lock().insert(remote_path.to_string(), content);
        self.host
            .dirs
            .lock()
            .entry(dir.to_string())
            .or_default()
            .push(RemoteEntry::new(name, FILE_MODE, size));
        Ok(size)
    }

    async fn download(&self, remote_path: &str, local_path: &Path) -> Result<u64, SftpError> {
        if self.host.download_failures.lock().contains(remote_path) {
            return Err(SftpError::Transfer(format!("read error: {}", remote_path)));
        }
        let content = self
            .host
            .files
            .lock()
            .get(remote_path)
            .cloned()
            .ok_or_else(|| SftpError::Transfer(format!("no such file: {}", remote_path)))?;
        tokio::fs::write(local_path, &content)
            .await
            .map_err(|e| SftpError::LocalIo(e.to_string()))?;
        Ok(content.len() as u64)
    }
}

pub fn dir(name: &str) -> RemoteEntry {
    RemoteEntry::new(name, DIR_MODE, 0)
}

pub fn file(name: &str) -> RemoteEntry {
    RemoteEntry::new(name, FILE_MODE, 1)
}

/// Fast timings so poll behaviour is observable within a test
pub fn fast_options() -> SessionOptions {
    SessionOptions {
        poll_interval: Duration::from_millis(20),
        poll_timeout: Duration::from_millis(50),
        terminal_size: (80, 24),
    }
}

/// Options whose poller never ticks twice during a test
pub fn quiet_options() -> SessionOptions {
    SessionOptions {
        poll_interval: Duration::from_secs(3600),
        poll_timeout: Duration::from_secs(5),
        terminal_size: (80, 24),
    }
}

pub fn profile(host: &str) -> ConnectionProfile {
    ConnectionProfile::with_password(host, "tester", "secret")
}

pub struct Harness {
    pub connector: FakeConnector,
    pub facade: SessionFacade<FakeConnector>,
    pub notifications: mpsc::UnboundedReceiver<Notification>,
}

impl Harness {
    pub fn new(options: SessionOptions) -> Self {
        let connector = FakeConnector::new();
        let (facade, notifications) = SessionFacade::new(connector.clone(), options);
        Self {
            connector,
            facade,
            notifications,
        }
    }

    pub fn host(&self, host: &str) -> Arc<FakeHost> {
        self.connector.host(host)
    }

    /// Collect every notification arriving within `window`
    pub async fn drain_for(&mut self, window: Duration) -> Vec<Notification> {
        let deadline = Instant::now() + window;
        let mut seen = Vec::new();
        while let Ok(Some(n)) = timeout(
            deadline.saturating_duration_since(Instant::now()),
            self.notifications.recv(),
        )
        .await
        {
            seen.push(n);
        }
        seen
    }

    /// Wait for the first notification matching `pred`, keeping the ones before it
    pub async fn wait_for(
        &mut self,
        window: Duration,
        pred: impl Fn(&Notification) -> bool,
    ) -> Option<(Notification, Vec<Notification>)> {
        let deadline = Instant::now() + window;
        let mut before = Vec::new();
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match timeout(remaining, self.notifications.recv()).await {
                Ok(Some(n)) if pred(&n) => return Some((n, before)),
                Ok(Some(n)) => before.push(n),
                _ => return None,
            }
        }
    }
}

pub fn is_closed(n: &Notification, key: &str) -> bool {
    matches!(n, Notification::Closed { key: k } if k == key)
}

pub fn is_health(n: &Notification, key: &str) -> bool {
    matches!(n, Notification::HealthSnapshot { key: k, .. } if k == key)
}

pub fn listing_paths(notifications: &[Notification], key: &str) -> Vec<String> {
    notifications
        .iter()
        .filter_map(|n| match n {
            Notification::DirectoryListing { key: k, path, .. } if k == key => Some(path.clone()),
            _ => None,
        })
        .collect()
}
