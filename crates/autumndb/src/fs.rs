//! Filesystem access primitive (component A).
//!
//! A small capability type bound to nothing more than the `tokio::fs` API,
//! passed into [`crate::collection::Collection`] on construction rather than
//! reached for as a global singleton.

use std::path::Path;

use tokio::fs;
use tokio::io::AsyncWriteExt as _;

use crate::error::{AutumnError, Result};

/// Atomic create/update/read/delete of a named byte blob.
///
/// `create` fails if the path already exists; `update` is a truncating
/// overwrite performed via a temp file + rename so that readers never
/// observe a partial write.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsAccess;

impl FsAccess {
    /// Creates a new, empty filesystem access handle.
    pub const fn new() -> Self { Self }

    /// Writes `bytes` to `path`, failing if `path` already exists.
    pub async fn create(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        if fs::try_exists(path).await? {
            return Err(AutumnError::AlreadyExists {
                what: "file",
                name: path.display().to_string(),
            });
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, bytes).await?;
        Ok(())
    }

    /// Overwrites `path` with `bytes`, atomically from a reader's perspective.
    ///
    /// Writes to a sibling temp file and renames it into place; a reader
    /// either sees the old content or the new content in full, never a
    /// partial write.
    pub async fn update(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let tmp_path = Self::temp_sibling(path);
        {
            let mut tmp_file = fs::File::create(&tmp_path).await?;
            tmp_file.write_all(bytes).await?;
            tmp_file.flush().await?;
        }
        fs::rename(&tmp_path, path).await?;
        Ok(())
    }

    /// Reads the full contents of `path`.
    pub async fn read(&self, path: &Path) -> Result<Vec<u8>> { Ok(fs::read(path).await?) }

    /// Deletes `path`.
    pub async fn delete(&self, path: &Path) -> Result<()> {
        fs::remove_file(path).await?;
        Ok(())
    }

    /// Returns whether `path` exists.
    pub async fn exists(&self, path: &Path) -> Result<bool> { Ok(fs::try_exists(path).await?) }

    fn temp_sibling(path: &Path) -> std::path::PathBuf {
        let file_name = path.file_name().map_or_else(|| ".tmp".to_string(), |name| format!(".{}.tmp", name.to_string_lossy()));
        path.with_file_name(file_name)
    }
}
