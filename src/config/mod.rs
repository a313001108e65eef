pub mod paths;
pub mod profiles;
pub mod settings;
pub mod snippets;

pub use profiles::{ConnectionProfile, Credential, ProfileGroup, ProfileStore};
pub use settings::{CoreSettings, SessionOptions};
pub use snippets::{Snippet, SnippetStore};

use std::io::Write;
use std::path::Path;

/// Replace `path` with `content` without ever exposing a half-written file.
///
/// The document is written to a sibling temp file and renamed over the
/// target. On Unix the result is readable by the owner only.
pub fn write_atomic(path: &Path, content: &str) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(content.as_bytes())?;
    tmp.as_file().sync_all()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(tmp.path(), std::fs::Permissions::from_mode(0o600))?;
    }

    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
