//! Transfer engine: batch upload, recursive download and drag-out export

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use futures::FutureExt;
use futures::future::{BoxFuture, join_all};

use crate::error::{SessionError, SftpError};
use crate::facade::Notification;
use crate::session::{FilesOf, SessionRegistry, SessionToken};
use crate::ssh::Connector;

use super::FileChannel;
use super::navigator;
use super::types::{DownloadSummary, format_size, remote_join};

/// Per-item results of an upload batch
#[derive(Debug, Default)]
pub struct UploadReport {
    /// Remote paths written
    pub uploaded: Vec<String>,
    pub failures: Vec<SessionError>,
}

/// Upload each of `local_paths` into `remote_dir`, all at once.
///
/// Every success re-lists `remote_dir`. Each failure is reported with a
/// `TransferFailed` notification and does not affect the other items.
pub async fn upload<C: Connector>(
    registry: &SessionRegistry<C>,
    key: &str,
    remote_dir: &str,
    local_paths: &[PathBuf],
) -> Result<UploadReport, SessionError> {
    let (token, files) = registry
        .file_channel(key)
        .ok_or_else(|| SessionError::FileChannelUnavailable(key.to_string()))?;

    let results = join_all(
        local_paths
            .iter()
            .map(|local| upload_one(registry, &token, &files, remote_dir, local)),
    )
    .await;

    let mut report = UploadReport::default();
    for result in results {
        match result {
            Ok(remote) => report.uploaded.push(remote),
            Err(e) => report.failures.push(e),
        }
    }
    Ok(report)
}

async fn upload_one<C: Connector>(
    registry: &SessionRegistry<C>,
    token: &SessionToken,
    files: &Arc<FilesOf<C>>,
    remote_dir: &str,
    local: &Path,
) -> Result<String, SessionError> {
    let result = match local.file_name() {
        Some(name) => {
            let remote = remote_join(remote_dir, &name.to_string_lossy());
            files.upload(local, &remote).await.map(|bytes| (remote, bytes))
        }
        None => Err(SftpError::LocalIo(format!(
            "{} has no file name",
            local.display()
        ))),
    };

    match result {
        Ok((remote, bytes)) => {
            tracing::info!(
                "Uploaded {} to {} ({})",
                local.display(),
                remote,
                format_size(bytes)
            );
            navigator::refresh(registry, token, remote_dir).await;
            Ok(remote)
        }
        Err(source) => Err(report_failure(
            registry,
            token,
            local.display().to_string(),
            source,
        )),
    }
}

/// Download `remote_src` and everything below it into `local_dest`.
///
/// `local_dest` is created first. Every subdirectory is fetched concurrently
/// with its siblings; the returned summary is complete only once every
/// branch has finished. A subdirectory that cannot be listed ends its own
/// branch and is counted as skipped. An entry whose name is not a single
/// plain path component is never written and is reported as a failure.
pub async fn download<C: Connector>(
    registry: &SessionRegistry<C>,
    key: &str,
    remote_src: &str,
    local_dest: &Path,
) -> Result<DownloadSummary, SessionError> {
    let (token, _) = registry
        .file_channel(key)
        .ok_or_else(|| SessionError::FileChannelUnavailable(key.to_string()))?;

    tokio::fs::create_dir_all(local_dest)
        .await
        .map_err(|e| SessionError::Transfer {
            item: local_dest.display().to_string(),
            source: SftpError::LocalIo(format!("Failed to create local directory: {}", e)),
        })?;

    let summary = download_tree(
        registry.clone(),
        token.clone(),
        remote_src.to_string(),
        local_dest.to_path_buf(),
    )
    .await;

    tracing::info!(
        "Download of {} finished: {} files, {} directories, {} skipped, {} failed",
        remote_src,
        summary.files,
        summary.directories,
        summary.skipped_directories,
        summary.failures.len()
    );

    registry.emit_if_live(
        &token,
        Notification::DownloadComplete {
            key: key.to_string(),
            remote: remote_src.to_string(),
            local: local_dest.to_path_buf(),
            summary: summary.clone(),
        },
    );
    Ok(summary)
}

fn download_tree<C: Connector>(
    registry: SessionRegistry<C>,
    token: SessionToken,
    remote: String,
    local: PathBuf,
) -> BoxFuture<'static, DownloadSummary> {
    async move {
        let skipped = DownloadSummary {
            skipped_directories: 1,
            ..Default::default()
        };

        // Re-fetched per directory so a closed session stops descending
        let Some(files) = registry.file_channel_for(&token) else {
            return skipped;
        };

        let entries = match files.read_dir(&remote).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Skipping {}: {}", remote, e);
                return skipped;
            }
        };

        let children = entries.into_iter().map(|entry| {
            let child_remote = remote_join(&remote, &entry.name);
            let registry = registry.clone();
            let token = token.clone();

            let Some(child_local) = local_child(&local, &entry.name) else {
                let source =
                    SftpError::FileOperation(format!("Unsafe entry name '{}'", entry.name));
                return async move {
                    report_failure(&registry, &token, child_remote.clone(), source);
                    DownloadSummary {
                        failures: vec![child_remote],
                        ..Default::default()
                    }
                }
                .boxed();
            };

            if entry.is_dir() {
                async move {
                    if let Err(e) = tokio::fs::create_dir_all(&child_local).await {
                        tracing::warn!("Cannot create {}: {}", child_local.display(), e);
                        return DownloadSummary {
                            skipped_directories: 1,
                            ..Default::default()
                        };
                    }
                    download_tree(registry, token, child_remote, child_local).await
                }
                .boxed()
            } else {
                let files = Arc::clone(&files);
                async move {
                    download_file(&registry, &token, &files, child_remote, &child_local).await
                }
                .boxed()
            }
        });

        let this_dir = DownloadSummary {
            directories: 1,
            ..Default::default()
        };
        join_all(children)
            .await
            .into_iter()
            .fold(this_dir, DownloadSummary::merge)
    }
    .boxed()
}

async fn download_file<C: Connector>(
    registry: &SessionRegistry<C>,
    token: &SessionToken,
    files: &Arc<FilesOf<C>>,
    remote: String,
    local: &Path,
) -> DownloadSummary {
    match files.download(&remote, local).await {
        Ok(bytes) => {
            tracing::debug!("Downloaded {} ({})", remote, format_size(bytes));
            DownloadSummary {
                files: 1,
                ..Default::default()
            }
        }
        Err(source) => {
            report_failure(registry, token, remote.clone(), source);
            DownloadSummary {
                failures: vec![remote],
                ..Default::default()
            }
        }
    }
}

/// Fetch one remote file into the drag-out temp directory.
///
/// Returns `Ok(None)` without transferring anything when `remote_path` is a
/// directory. The returned path exists and is complete.
pub async fn export_to_temp<C: Connector>(
    registry: &SessionRegistry<C>,
    key: &str,
    remote_path: &str,
    filename: &str,
) -> Result<Option<PathBuf>, SessionError> {
    let (token, files) = registry
        .file_channel(key)
        .ok_or_else(|| SessionError::FileChannelUnavailable(key.to_string()))?;

    let transfer_error = |source: SftpError| SessionError::Transfer {
        item: remote_path.to_string(),
        source,
    };

    if files.stat_is_dir(remote_path).await.map_err(transfer_error)? {
        tracing::debug!("Not exporting directory {}", remote_path);
        return Ok(None);
    }

    let name = export_name(filename, remote_path).ok_or_else(|| {
        transfer_error(SftpError::LocalIo(format!(
            "Invalid export file name '{}'",
            filename
        )))
    })?;
    let dir = registry
        .drag_dir()
        .map_err(|e| transfer_error(SftpError::LocalIo(e.to_string())))?;
    let local_path = dir.join(name);

    let bytes = files
        .download(remote_path, &local_path)
        .await
        .map_err(transfer_error)?;
    tracing::debug!(
        "Exported {} to {} ({})",
        remote_path,
        local_path.display(),
        format_size(bytes)
    );

    registry.emit_if_live(
        &token,
        Notification::Exported {
            key: key.to_string(),
            remote_path: remote_path.to_string(),
            local_path: local_path.clone(),
        },
    );
    Ok(Some(local_path))
}

/// `dir/name`, provided `name` stays inside `dir`
fn local_child(dir: &Path, name: &str) -> Option<PathBuf> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(part)), None) => Some(dir.join(part)),
        _ => None,
    }
}

/// Final component of `filename`, falling back to the remote base name
fn export_name(filename: &str, remote_path: &str) -> Option<String> {
    let from = |s: &str| {
        Path::new(s)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
    };
    from(filename).or_else(|| remote_path.rsplit('/').find(|s| !s.is_empty()).and_then(from))
}

fn report_failure<C: Connector>(
    registry: &SessionRegistry<C>,
    token: &SessionToken,
    item: String,
    source: SftpError,
) -> SessionError {
    let err = SessionError::Transfer {
        item: item.clone(),
        source,
    };
    tracing::warn!("{}", err);

    registry.emit_if_live(
        token,
        Notification::TransferFailed {
            key: token.key().to_string(),
            item,
            message: err.to_string(),
        },
    );
    err
}
