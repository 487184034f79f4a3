//! Collaborators the signer persists through
//!
//! Source documents, signed outputs and audit records each sit behind a
//! narrow async trait so the backing storage can be swapped without touching
//! the signing pipeline.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use shared_types::AuditRecord;
use tokio::{
    fs,
    io::{AsyncWrite, AsyncWriteExt},
};
use tracing::warn;

use crate::error::StoreError;

/// Read access to source documents
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn read(&self, document_id: &str) -> Result<Vec<u8>, StoreError>;
}

/// Where a signed output ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredOutput {
    /// Store-internal location, recorded in the audit trail
    pub location: String,
    /// Caller-resolvable locator returned in the signing result
    pub url: String,
}

/// Write-once storage for signed outputs
#[async_trait]
pub trait OutputStore: Send + Sync {
    /// Store bytes under a new name; fails rather than overwrite
    async fn write(&self, name: &str, bytes: &[u8]) -> Result<StoredOutput, StoreError>;

    async fn read(&self, location: &str) -> Result<Vec<u8>, StoreError>;

    async fn remove(&self, location: &str) -> Result<(), StoreError>;
}

/// Append-only audit trail
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append(&self, record: &AuditRecord) -> Result<(), StoreError>;

    /// Records for one document, in insertion order
    async fn list(&self, document_id: &str) -> Result<Vec<AuditRecord>, StoreError>;
}

fn map_not_found(err: io::Error, what: &str) -> StoreError {
    if err.kind() == io::ErrorKind::NotFound {
        StoreError::NotFound(what.to_string())
    } else {
        StoreError::Io(err)
    }
}

/// Source documents stored as `<root>/<document_id>.pdf`
#[derive(Debug, Clone)]
pub struct FsDocumentStore {
    root_dir: PathBuf,
}

impl FsDocumentStore {
    pub fn new<P: AsRef<Path>>(root_dir: P) -> Self {
        Self {
            root_dir: root_dir.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, document_id: &str) -> PathBuf {
        self.root_dir.join(format!("{}.pdf", document_id))
    }
}

#[async_trait]
impl DocumentStore for FsDocumentStore {
    async fn read(&self, document_id: &str) -> Result<Vec<u8>, StoreError> {
        fs::read(self.path_for(document_id))
            .await
            .map_err(|e| map_not_found(e, document_id))
    }
}

/// Signed outputs stored in a directory that is also served under `url_prefix`
#[derive(Debug, Clone)]
pub struct FsOutputStore {
    root_dir: PathBuf,
    url_prefix: String,
}

impl FsOutputStore {
    /// Create the store, making sure the output directory exists
    pub fn new<P: AsRef<Path>>(root_dir: P, url_prefix: &str) -> io::Result<Self> {
        let root_dir = root_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&root_dir)?;

        Ok(Self {
            root_dir,
            url_prefix: url_prefix.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl OutputStore for FsOutputStore {
    async fn write(&self, name: &str, bytes: &[u8]) -> Result<StoredOutput, StoreError> {
        let path = self.root_dir.join(name);

        let file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        fill_or_discard(&path, file, bytes).await?;

        Ok(StoredOutput {
            location: path.to_string_lossy().into_owned(),
            url: format!("{}/{}", self.url_prefix, name),
        })
    }

    async fn read(&self, location: &str) -> Result<Vec<u8>, StoreError> {
        fs::read(location)
            .await
            .map_err(|e| map_not_found(e, location))
    }

    async fn remove(&self, location: &str) -> Result<(), StoreError> {
        fs::remove_file(location)
            .await
            .map_err(|e| map_not_found(e, location))
    }
}

/// Write all bytes, removing the file again if the write does not complete
async fn fill_or_discard<W>(path: &Path, mut writer: W, bytes: &[u8]) -> Result<(), StoreError>
where
    W: AsyncWrite + Unpin,
{
    let written = async {
        writer.write_all(bytes).await?;
        writer.flush().await
    }
    .await;

    if let Err(e) = written {
        drop(writer);
        if let Err(cleanup) = fs::remove_file(path).await {
            warn!(
                "Failed to remove partial output {}: {}",
                path.display(),
                cleanup
            );
        }
        return Err(StoreError::Io(e));
    }
    Ok(())
}

/// Audit trail kept in process memory
#[derive(Debug, Default)]
pub struct MemoryAuditStore {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn append(&self, record: &AuditRecord) -> Result<(), StoreError> {
        self.records
            .lock()
            .map_err(|_| StoreError::Backend("audit store lock poisoned".to_string()))?
            .push(record.clone());
        Ok(())
    }

    async fn list(&self, document_id: &str) -> Result<Vec<AuditRecord>, StoreError> {
        let records = self
            .records
            .lock()
            .map_err(|_| StoreError::Backend("audit store lock poisoned".to_string()))?;
        Ok(records
            .iter()
            .filter(|r| r.document_id == document_id)
            .cloned()
            .collect())
    }
}
