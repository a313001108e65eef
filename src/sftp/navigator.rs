//! Directory navigation over a session's file channel

use crate::error::SessionError;
use crate::session::{SessionRegistry, SessionToken};
use crate::ssh::Connector;

use super::FileChannel;
use super::types::{RemoteEntry, directories_first};

/// List `path` for the session `key` and publish the result.
///
/// `path` must already be resolved by the caller (including `..`). The
/// listing is emitted with directories first. If another `navigate` for the
/// same session is issued before this one finishes, this result is stale and
/// is dropped (`Ok(None)`), as it is when the session closes meanwhile.
pub async fn navigate<C: Connector>(
    registry: &SessionRegistry<C>,
    key: &str,
    path: &str,
) -> Result<Option<Vec<RemoteEntry>>, SessionError> {
    let (token, seq, files) = registry
        .begin_navigation(key)
        .ok_or_else(|| SessionError::FileChannelUnavailable(key.to_string()))?;

    let entries = files
        .read_dir(path)
        .await
        .map(directories_first)
        .map_err(|source| SessionError::Listing {
            path: path.to_string(),
            source,
        })?;

    if registry.complete_navigation(&token, seq, path, entries.clone()) {
        Ok(Some(entries))
    } else {
        tracing::debug!("Dropped stale listing of '{}' for '{}'", path, key);
        Ok(None)
    }
}

/// Re-list `path` after a change, outside navigation sequencing.
///
/// Failures only get logged. The session's working directory is not changed.
pub(crate) async fn refresh<C: Connector>(
    registry: &SessionRegistry<C>,
    token: &SessionToken,
    path: &str,
) -> Option<Vec<RemoteEntry>> {
    let files = registry.file_channel_for(token)?;

    match files.read_dir(path).await {
        Ok(entries) => {
            let entries = directories_first(entries);
            let notification = crate::facade::Notification::DirectoryListing {
                key: token.key().to_string(),
                path: path.to_string(),
                entries: entries.clone(),
            };
            registry
                .emit_if_live(token, notification)
                .then_some(entries)
        }
        Err(e) => {
            tracing::warn!("Refresh of '{}' failed: {}", path, e);
            None
        }
    }
}
