//! Warm boot snapshot: record shapes, codec, builder, loader and persistence.
//!
//! The on-disk document keeps multipath records under the host table
//! grouping:
//!
//! ```text
//! {"hostTable": {"hosts": [...], "ecmpHosts": [...]}}
//! ```

pub mod builder;
pub mod codec;
pub mod loader;
pub mod record;
pub mod schema;

pub use builder::{build, capture};
pub use codec::CodecError;
pub use loader::{load_from_slice, load_from_str, load_value, LoadError, LoadedSnapshot, SnapshotSummary};
pub use record::SnapshotDocument;
pub use schema::{sniff_layout, SchemaLayout};

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Serializes a document to JSON text.
pub fn to_json(document: &SnapshotDocument, pretty: bool) -> serde_json::Result<Vec<u8>> {
    if pretty {
        serde_json::to_vec_pretty(document)
    } else {
        serde_json::to_vec(document)
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Writes a document atomically: a sibling temp file is written, synced and
/// renamed over `path`. Readers see either the old file or the new one.
pub async fn write_document(
    path: &Path,
    document: &SnapshotDocument,
    pretty: bool,
) -> crate::Result<()> {
    let bytes = to_json(document, pretty)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let tmp = temp_path(path);
    let result = async {
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&tmp, path).await
    }
    .await;

    if let Err(e) = result {
        if let Err(cleanup) = tokio::fs::remove_file(&tmp).await {
            if cleanup.kind() != ErrorKind::NotFound {
                warn!(path = %tmp.display(), error = %cleanup, "Failed to remove temp snapshot");
            }
        }
        return Err(e.into());
    }

    debug!(path = %path.display(), bytes = bytes.len(), "Wrote warm boot snapshot");
    Ok(())
}

/// Reads and loads a snapshot file.
///
/// Returns `Ok(None)` if no snapshot exists.
pub async fn read_snapshot(path: &Path) -> Result<Option<LoadedSnapshot>, LoadError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    load_from_slice(&bytes).map(Some)
}

/// Removes a snapshot file. Returns true if a file was removed.
pub async fn remove_snapshot(path: &Path) -> std::io::Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
