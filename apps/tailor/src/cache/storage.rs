//! Durable storage behind the content cache.
//!
//! Layout under the root: `<job_id>/<section>/entry.json` (the record) and
//! `<job_id>/<section>/content-<uuid>.json` (content blobs). Every write lands
//! in a temp file first and is renamed into place, so a reader never sees a
//! half-written file.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::errors::CacheError;

const RECORD_FILE: &str = "entry.json";

/// Validated (job, section) address. Both parts are restricted to
/// `[A-Za-z0-9_-]` so they are safe as path components.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub job_id: String,
    pub section: String,
}

impl CacheKey {
    pub fn new(job_id: &str, section: &str) -> Result<Self, CacheError> {
        for part in [job_id, section] {
            if !is_safe_component(part) {
                return Err(CacheError::InvalidKey(format!(
                    "'{part}' must be non-empty and contain only letters, digits, '-' or '_'"
                )));
            }
        }
        Ok(Self {
            job_id: job_id.to_string(),
            section: section.to_string(),
        })
    }
}

pub fn is_safe_component(part: &str) -> bool {
    !part.is_empty()
        && part.len() <= 128
        && part
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Blob names are generated by the cache; a hand-edited record may only
/// reference a `content-*.json` file in its own section directory.
pub fn is_blob_name(name: &str) -> bool {
    name.strip_prefix("content-")
        .and_then(|rest| rest.strip_suffix(".json"))
        .map(is_safe_component)
        .unwrap_or(false)
}

#[async_trait]
pub trait CacheStorage: Send + Sync {
    async fn write_blob(&self, key: &CacheKey, blob: &str, bytes: &[u8]) -> io::Result<()>;
    async fn read_blob(&self, key: &CacheKey, blob: &str) -> io::Result<Vec<u8>>;
    async fn remove_blob(&self, key: &CacheKey, blob: &str) -> io::Result<()>;
    async fn write_record(&self, key: &CacheKey, bytes: &[u8]) -> io::Result<()>;
    /// `Ok(None)` when no record exists.
    async fn read_record(&self, key: &CacheKey) -> io::Result<Option<Vec<u8>>>;
    async fn remove_section(&self, key: &CacheKey) -> io::Result<()>;
    async fn remove_job(&self, job_id: &str) -> io::Result<()>;
}

/// Plain-file storage: every record and blob is pretty JSON that can be
/// inspected or hand-edited.
#[derive(Debug, Clone)]
pub struct FileCacheStorage {
    root: PathBuf,
}

impl FileCacheStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn section_dir(&self, key: &CacheKey) -> PathBuf {
        self.root.join(&key.job_id).join(&key.section)
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no parent"))?;
    tokio::fs::create_dir_all(dir).await?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("cache");
    let tmp = dir.join(format!(".{file_name}.{}.tmp", Uuid::new_v4()));

    let written = async {
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        tokio::fs::rename(&tmp, path).await
    }
    .await;

    if written.is_err() {
        let _ = tokio::fs::remove_file(&tmp).await;
    }
    written
}

async fn remove_dir_if_present(path: &Path) -> io::Result<()> {
    match tokio::fs::remove_dir_all(path).await {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

#[async_trait]
impl CacheStorage for FileCacheStorage {
    async fn write_blob(&self, key: &CacheKey, blob: &str, bytes: &[u8]) -> io::Result<()> {
        write_atomic(&self.section_dir(key).join(blob), bytes).await
    }

    async fn read_blob(&self, key: &CacheKey, blob: &str) -> io::Result<Vec<u8>> {
        tokio::fs::read(self.section_dir(key).join(blob)).await
    }

    async fn remove_blob(&self, key: &CacheKey, blob: &str) -> io::Result<()> {
        match tokio::fs::remove_file(self.section_dir(key).join(blob)).await {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    async fn write_record(&self, key: &CacheKey, bytes: &[u8]) -> io::Result<()> {
        write_atomic(&self.section_dir(key).join(RECORD_FILE), bytes).await
    }

    async fn read_record(&self, key: &CacheKey) -> io::Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.section_dir(key).join(RECORD_FILE)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn remove_section(&self, key: &CacheKey) -> io::Result<()> {
        remove_dir_if_present(&self.section_dir(key)).await
    }

    async fn remove_job(&self, job_id: &str) -> io::Result<()> {
        remove_dir_if_present(&self.root.join(job_id)).await
    }
}
