use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use uuid::Uuid;

/// Longest accepted blob id.
const MAX_BLOB_ID_LEN: usize = 128;

/// Manages on-disk blob storage.
///
/// Each blob is stored as a single flat file at `{storage_dir}/{blob_id}`.
pub struct Storage {
    dir: PathBuf,
}

/// Blob ids are single path components: ASCII alphanumerics plus `-`, `_`
/// and `.`, not starting with a dot.
pub fn is_valid_blob_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_BLOB_ID_LEN
        && !id.starts_with('.')
        && id.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Partial upload file, removed on drop unless it was renamed into place.
/// Covers both failed bodies and handlers dropped mid-upload.
struct TempUpload {
    path: PathBuf,
    persisted: bool,
}

impl TempUpload {
    fn new(path: PathBuf) -> Self {
        Self { path, persisted: false }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn persisted(&mut self) {
        self.persisted = true;
    }
}

impl Drop for TempUpload {
    fn drop(&mut self) {
        if self.persisted {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove partial upload {}: {}", self.path.display(), e),
        }
    }
}

impl Storage {
    pub async fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Blob storage directory: {}", dir.display());
        Ok(Self { dir })
    }

    /// Path to the file for a blob, or `None` if the id is not acceptable.
    pub fn blob_path(&self, blob_id: &str) -> Option<PathBuf> {
        is_valid_blob_id(blob_id).then(|| self.dir.join(blob_id))
    }

    /// Size of a stored blob, `None` if it does not exist.
    pub async fn blob_size(&self, blob_id: &str) -> Result<Option<u64>> {
        let Some(path) = self.blob_path(blob_id) else {
            return Ok(None);
        };
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(Some(meta.len())),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Stream `body` into the blob, replacing any previous content once the
    /// whole body has arrived. Returns the number of bytes stored.
    pub async fn write_blob<S, E>(&self, blob_id: &str, body: S) -> Result<u64>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let Some(path) = self.blob_path(blob_id) else {
            bail!("Invalid blob id: {:?}", blob_id);
        };
        // Written next to the target and renamed, so readers never see a partial blob.
        let mut tmp = TempUpload::new(self.dir.join(format!(".upload-{}", Uuid::new_v4())));

        let mut file = fs::File::create(tmp.path()).await?;
        let mut written: u64 = 0;
        futures_util::pin_mut!(body);
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        drop(file);
        fs::rename(tmp.path(), &path).await?;
        tmp.persisted();
        Ok(written)
    }

    /// Delete a blob. Returns false if it did not exist.
    pub async fn delete_blob(&self, blob_id: &str) -> Result<bool> {
        let Some(path) = self.blob_path(blob_id) else {
            return Ok(false);
        };
        match fs::remove_file(&path).await {
            Ok(()) => {
                info!("Deleted blob {}", blob_id);
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
