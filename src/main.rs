use std::io::Write;

use anyhow::{Context, Result, bail};
use tokio::io::AsyncReadExt;

use neonterm::config::{CoreSettings, ProfileStore, paths};
use neonterm::ssh::SshConnector;
use neonterm::{Notification, Request, SessionFacade};

const SESSION_KEY: &str = "main";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging with file output.
    let log_dir = paths::ensure_log_dir().ok();
    let _guard = neonterm::logging::init_logging(log_dir);

    let Some(reference) = std::env::args().nth(1) else {
        bail!("usage: neonterm <group/profile>");
    };

    tracing::info!("Starting NeonTerm");
    if let Some(dir) = paths::log_dir() {
        tracing::info!("Logging to {}", dir.display());
    }

    let settings = CoreSettings::load().unwrap_or_else(|e| {
        tracing::warn!("Using default settings: {}", e);
        CoreSettings::default()
    });
    let store = ProfileStore::load();
    let profile = store
        .find(&reference)
        .cloned()
        .with_context(|| format!("no saved profile named '{}'", reference))?;

    let (facade, mut notifications) = SessionFacade::new(
        SshConnector::from_settings(&settings),
        settings.session_options(),
    );

    facade.handle(Request::Connect {
        key: SESSION_KEY.to_string(),
        profile,
    });

    let input = facade.clone();
    tokio::spawn(async move {
        let mut stdin = tokio::io::stdin();
        let mut buf = [0u8; 1024];
        loop {
            match stdin.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    input.handle(Request::ShellInput {
                        key: SESSION_KEY.to_string(),
                        data: buf[..n].to_vec(),
                    });
                }
            }
        }
        input.handle(Request::Disconnect {
            key: SESSION_KEY.to_string(),
        });
    });

    let mut stdout = std::io::stdout();
    loop {
        tokio::select! {
            notification = notifications.recv() => {
                let Some(notification) = notification else { break };
                match notification {
                    Notification::ShellOutput { data, .. } => {
                        stdout.write_all(&data).context("writing to stdout")?;
                        stdout.flush().context("flushing stdout")?;
                    }
                    Notification::Ready { key } => tracing::info!("Session '{}' ready", key),
                    Notification::Error { key, message } => {
                        tracing::error!("Session '{}': {}", key, message);
                        // Failed opens leave nothing registered and never send Closed
                        if facade.lookup(&key).is_none() {
                            break;
                        }
                    }
                    Notification::Closed { .. } => break,
                    Notification::HealthSnapshot { snapshot, .. } => tracing::info!(
                        "{} | mem {} | disk {}",
                        snapshot.cpu.as_deref().unwrap_or("-"),
                        snapshot.mem.as_deref().unwrap_or("-"),
                        snapshot.disk.as_deref().unwrap_or("-"),
                    ),
                    Notification::DirectoryListing { path, entries, .. } => {
                        tracing::debug!("{}: {} entries", path, entries.len());
                    }
                    other => tracing::debug!("{:?}", other),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                facade.shutdown();
                break;
            }
        }
    }

    Ok(())
}
