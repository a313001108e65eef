//! File channel: remote listings and transfers
//!
//! The russh-sftp backed [`SftpSession`] implements [`FileChannel`]; the
//! navigator and transfer engine only see the trait.

pub mod navigator;
pub mod session;
pub mod transfer;
pub mod types;

use std::future::Future;
use std::path::Path;

use crate::error::SftpError;

pub use session::SftpSession;
pub use types::{DownloadSummary, RemoteEntry, directories_first, format_size, remote_join};

/// Remote file operations available once a session's file channel is up
pub trait FileChannel: Send + Sync + 'static {
    /// List a remote directory. `.` and `..` are not included.
    fn read_dir(
        &self,
        path: &str,
    ) -> impl Future<Output = Result<Vec<RemoteEntry>, SftpError>> + Send;

    /// Whether the remote path is a directory (follows symlinks)
    fn stat_is_dir(&self, path: &str) -> impl Future<Output = Result<bool, SftpError>> + Send;

    /// Copy a local file to a remote path, returning bytes written
    fn upload(
        &self,
        local_path: &Path,
        remote_path: &str,
    ) -> impl Future<Output = Result<u64, SftpError>> + Send;

    /// Copy a remote file to a local path, returning bytes written
    fn download(
        &self,
        remote_path: &str,
        local_path: &Path,
    ) -> impl Future<Output = Result<u64, SftpError>> + Send;
}
