use thiserror::Error;

#[derive(Error, Debug)]
pub enum SignError {
    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Invalid document id: {0}")]
    InvalidDocumentId(String),

    #[error("Invalid field #{index}: {reason}")]
    InvalidField { index: usize, reason: &'static str },

    #[error("Failed to parse PDF: {0}")]
    CorruptDocument(String),

    #[error("Unsupported signature image format (expected PNG or JPEG)")]
    UnsupportedFormat,

    #[error("Page {page} not found (document has {page_count} pages)")]
    PageNotFound { page: u32, page_count: usize },

    #[error("Degenerate geometry: {0}")]
    DegenerateGeometry(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Persistence error: {0}")]
    PersistenceError(String),
}

/// Failure reported by a document, output or audit store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Backend error: {0}")]
    Backend(String),
}
