//! SFTP session for file operations

use std::path::Path;

use russh_sftp::client::SftpSession as RusshSftpSession;
use russh_sftp::protocol::OpenFlags;
use tokio::fs::OpenOptions;
use tokio::io;

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

use crate::error::SftpError;

use super::FileChannel;
use super::types::RemoteEntry;

/// SFTP session wrapper implementing the file channel.
///
/// russh-sftp multiplexes requests internally, so transfers on the same
/// session run concurrently without an outer lock.
pub struct SftpSession {
    sftp: RusshSftpSession,
}

impl std::fmt::Debug for SftpSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SftpSession").finish_non_exhaustive()
    }
}

impl SftpSession {
    pub fn new(sftp: RusshSftpSession) -> Self {
        Self { sftp }
    }
}

impl FileChannel for SftpSession {
    async fn read_dir(&self, path: &str) -> Result<Vec<RemoteEntry>, SftpError> {
        let read_dir = self.sftp.read_dir(path.to_string()).await.map_err(|e| {
            SftpError::FileOperation(format!("Failed to read directory {}: {}", path, e))
        })?;

        let entries = read_dir
            .filter_map(|entry| {
                let name = entry.file_name();
                if name == "." || name == ".." {
                    return None;
                }
                let metadata = entry.metadata();
                Some(RemoteEntry::new(
                    name,
                    metadata.permissions.unwrap_or(0),
                    metadata.size.unwrap_or(0),
                ))
            })
            .collect();

        Ok(entries)
    }

    async fn stat_is_dir(&self, path: &str) -> Result<bool, SftpError> {
        let metadata = self.sftp.metadata(path.to_string()).await.map_err(|e| {
            SftpError::FileOperation(format!("Failed to get metadata for {}: {}", path, e))
        })?;
        Ok(super::types::is_dir_mode(metadata.permissions.unwrap_or(0)))
    }

    async fn upload(&self, local_path: &Path, remote_path: &str) -> Result<u64, SftpError> {
        // Checked before the remote file is created or truncated
        let mut local = open_upload_source(local_path).await?;

        let mut remote = self
            .sftp
            .open_with_flags(
                remote_path.to_string(),
                OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNCATE,
            )
            .await
            .map_err(|e| {
                SftpError::Transfer(format!("Failed to open remote file {}: {}", remote_path, e))
            })?;

        let bytes = io::copy(&mut local, &mut remote).await.map_err(|e| {
            SftpError::Transfer(format!(
                "Failed to upload {} to {}: {}",
                local_path.display(),
                remote_path,
                e
            ))
        })?;

        Ok(bytes)
    }

    async fn download(&self, remote_path: &str, local_path: &Path) -> Result<u64, SftpError> {
        let mut remote = self.sftp.open(remote_path.to_string()).await.map_err(|e| {
            SftpError::Transfer(format!("Failed to open remote file {}: {}", remote_path, e))
        })?;

        let mut local = {
            let mut options = OpenOptions::new();
            options.create(true).write(true).truncate(true);
            #[cfg(unix)]
            {
                options.mode(0o600);
            }
            options.open(local_path).await.map_err(|e| {
                SftpError::LocalIo(format!(
                    "Failed to write local file {}: {}",
                    local_path.display(),
                    e
                ))
            })?
        };

        let bytes = io::copy(&mut remote, &mut local).await.map_err(|e| {
            SftpError::Transfer(format!(
                "Failed to download {} to {}: {}",
                remote_path,
                local_path.display(),
                e
            ))
        })?;

        Ok(bytes)
    }
}

/// Open a local file for upload, refusing anything that is not a regular file
async fn open_upload_source(local_path: &Path) -> Result<tokio::fs::File, SftpError> {
    let read_error = |e: std::io::Error| {
        SftpError::LocalIo(format!(
            "Failed to read local file {}: {}",
            local_path.display(),
            e
        ))
    };

    let file = tokio::fs::File::open(local_path).await.map_err(read_error)?;
    if !file.metadata().await.map_err(read_error)?.is_file() {
        return Err(SftpError::LocalIo(format!(
            "{} is not a regular file",
            local_path.display()
        )));
    }
    Ok(file)
}
