//! Remote directory entries and POSIX path helpers

use serde::Serialize;

const S_IFMT: u32 = 0o170000;
const S_IFDIR: u32 = 0o040000;

/// One entry of a remote directory listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteEntry {
    pub name: String,
    /// Raw mode word as reported by the server (type bits + permissions)
    pub mode: u32,
    pub size: u64,
}

impl RemoteEntry {
    pub fn new(name: impl Into<String>, mode: u32, size: u64) -> Self {
        Self {
            name: name.into(),
            mode,
            size,
        }
    }

    pub fn is_dir(&self) -> bool {
        is_dir_mode(self.mode)
    }
}

/// Whether a mode word has the directory file type
pub fn is_dir_mode(mode: u32) -> bool {
    mode & S_IFMT == S_IFDIR
}

/// Move directories ahead of everything else, keeping the server's order
/// within each group.
pub fn directories_first(mut entries: Vec<RemoteEntry>) -> Vec<RemoteEntry> {
    // sort_by_key is stable
    entries.sort_by_key(|e| !e.is_dir());
    entries
}

/// Join a remote directory and a child name with `/`, whatever the local OS.
pub fn remote_join(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        return name.to_string();
    }
    if dir.ends_with('/') {
        format!("{}{}", dir, name)
    } else {
        format!("{}/{}", dir, name)
    }
}

/// Outcome of a recursive download, folded over every branch of the tree
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DownloadSummary {
    /// Files transferred successfully
    pub files: usize,
    /// Directories listed and descended into (the root included)
    pub directories: usize,
    /// Directories whose listing failed; their branch counts as done
    pub skipped_directories: usize,
    /// Remote paths of entries that failed to transfer or were refused
    pub failures: Vec<String>,
}

impl DownloadSummary {
    pub fn merge(mut self, other: DownloadSummary) -> Self {
        self.files += other.files;
        self.directories += other.directories;
        self.skipped_directories += other.skipped_directories;
        self.failures.extend(other.failures);
        self
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.skipped_directories == 0
    }
}

/// Format a byte count for log lines
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
