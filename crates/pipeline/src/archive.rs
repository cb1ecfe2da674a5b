//! Content-addressed archive of original device files.
//!
//! [`ArchiveStore::archive`] hashes the bytes with SHA-256 and writes them
//! under that hash if absent. [`ArchiveStore::verify`] re-hashes what is
//! stored and fails with [`ArchiveError::Integrity`] on mismatch.
//!
//! Blobs live behind the [`BlobStore`] trait; [`FilesystemBlobStore`] is the
//! production backend. Its writes go to a unique temp file that is fsynced
//! and then renamed into place, so a reader never sees a partial blob.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use pqa_core::file_type::FileType;
use pqa_core::hashing::{sha256_hex, validate_content_hash};
use pqa_core::types::DbId;
use pqa_db::models::archived_file::{ArchivedFile, CreateArchivedFile};
use pqa_db::repositories::ArchivedFileRepo;
use sqlx::PgPool;
use tokio::fs;
use tokio::io::AsyncWriteExt;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// Stored bytes no longer hash to their key.
    #[error("Archive integrity failure for {content_hash}: stored bytes hash to {actual}")]
    Integrity { content_hash: String, actual: String },

    #[error("No archived blob for {0}")]
    NotFound(String),

    #[error("Invalid content hash: {0}")]
    InvalidHash(String),

    #[error("Blob storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

// ---------------------------------------------------------------------------
// BlobStore
// ---------------------------------------------------------------------------

/// Raw byte storage keyed by content hash.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `data` under `key` unless something is already stored there.
    /// Returns `true` when this call wrote the blob.
    async fn put_if_absent(&self, key: &str, data: &[u8]) -> std::io::Result<bool>;

    /// Read a blob, or `None` if it does not exist.
    async fn get(&self, key: &str) -> std::io::Result<Option<Vec<u8>>>;
}

/// Stores blobs as files under `{root}/{hash[0..2]}/{hash[2..4]}/{hash}`.
pub struct FilesystemBlobStore {
    root: PathBuf,
}

impl FilesystemBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, key: &str) -> std::io::Result<PathBuf> {
        if key.len() < 4 || !key.is_ascii() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("invalid blob key '{key}'"),
            ));
        }
        Ok(self.root.join(&key[0..2]).join(&key[2..4]).join(key))
    }

    /// Round-trip a scratch file so misconfigured storage fails at startup.
    pub async fn validate(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.root).await?;
        let scratch = self.root.join(format!(".scratch-{}", uuid::Uuid::new_v4()));
        fs::write(&scratch, b"pqa-scratch").await?;
        let read_back = fs::read(&scratch).await?;
        fs::remove_file(&scratch).await?;
        if read_back != b"pqa-scratch" {
            return Err(std::io::Error::other("blob root read-back mismatch"));
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for FilesystemBlobStore {
    async fn put_if_absent(&self, key: &str, data: &[u8]) -> std::io::Result<bool> {
        let path = self.blob_path(key)?;
        if fs::try_exists(&path).await? {
            return Ok(false);
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Unique temp name: concurrent writers of the same hash never share
        // a temp file, and the rename is atomic.
        let temp = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));
        let mut file = fs::File::create(&temp).await?;
        if let Err(e) = write_synced(&mut file, data).await {
            drop(file);
            let _ = fs::remove_file(&temp).await;
            return Err(e);
        }
        drop(file);

        if let Err(e) = fs::rename(&temp, &path).await {
            tracing::warn!(from = %temp.display(), to = %path.display(), error = %e, "Blob rename failed");
            let _ = fs::remove_file(&temp).await;
            return Err(e);
        }
        Ok(true)
    }

    async fn get(&self, key: &str) -> std::io::Result<Option<Vec<u8>>> {
        match fs::read(self.blob_path(key)?).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

async fn write_synced(file: &mut fs::File, data: &[u8]) -> std::io::Result<()> {
    file.write_all(data).await?;
    file.sync_all().await
}

// ---------------------------------------------------------------------------
// ArchiveStore
// ---------------------------------------------------------------------------

/// Content-addressed archive over a [`BlobStore`].
#[derive(Clone)]
pub struct ArchiveStore {
    blobs: Arc<dyn BlobStore>,
}

impl ArchiveStore {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self { blobs }
    }

    /// Store bytes under their digest. A repeated call with identical bytes
    /// writes nothing and returns the same hash.
    pub async fn archive(&self, bytes: &[u8]) -> Result<String, ArchiveError> {
        let content_hash = sha256_hex(bytes);
        let written = self.blobs.put_if_absent(&content_hash, bytes).await?;
        tracing::debug!(%content_hash, size = bytes.len(), written, "Archived blob");
        Ok(content_hash)
    }

    /// Read stored bytes back and prove they still hash to `content_hash`.
    pub async fn verify(&self, content_hash: &str) -> Result<Vec<u8>, ArchiveError> {
        validate_content_hash(content_hash)
            .map_err(|e| ArchiveError::InvalidHash(e.to_string()))?;

        let bytes = self
            .blobs
            .get(content_hash)
            .await?
            .ok_or_else(|| ArchiveError::NotFound(content_hash.to_string()))?;

        let actual = sha256_hex(&bytes);
        if actual != content_hash {
            tracing::error!(%content_hash, %actual, "Archived bytes failed hash re-verification");
            return Err(ArchiveError::Integrity {
                content_hash: content_hash.to_string(),
                actual,
            });
        }
        Ok(bytes)
    }

    /// Archive an upload for a device and record it.
    ///
    /// The blob is durable before the row is inserted, so a visible row
    /// always has readable bytes. Returns the row and whether it is new.
    pub async fn archive_device_file(
        &self,
        pool: &PgPool,
        device_id: DbId,
        file_type: FileType,
        bytes: &[u8],
    ) -> Result<(ArchivedFile, bool), ArchiveError> {
        let content_hash = self.archive(bytes).await?;
        let input = CreateArchivedFile {
            device_id,
            file_type: file_type.as_str().to_string(),
            content_hash,
            size_bytes: bytes.len() as i64,
        };
        let (row, created) = ArchivedFileRepo::insert(pool, &input).await?;
        if created {
            tracing::info!(
                device_id,
                file_type = %file_type,
                content_hash = %row.content_hash,
                size_bytes = row.size_bytes,
                "Archived original file",
            );
        }
        Ok((row, created))
    }
}
