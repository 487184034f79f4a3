//! Signature stamping core logic
//!
//! This crate places a raster signature image onto fields of an existing PDF
//! without distorting it, and records before/after content digests so every
//! signing can be audited later.
//!
//! - [`geometry`]: normalized field to absolute placement conversion
//! - [`decoder`]: PNG/JPEG signature decoding
//! - [`integrity`]: SHA-256 content digests
//! - [`document`]: lopdf-backed loading, drawing and serialization
//! - [`signer`]: the end-to-end signing pipeline over injected stores

pub mod decoder;
pub mod document;
pub mod error;
pub mod geometry;
pub mod integrity;
pub mod signer;
pub mod store;

pub use decoder::{DecodedImage, ImageDecoder, ImageFormat};
pub use document::{EmbeddedImage, PdfDocument};
pub use error::{SignError, StoreError};
pub use signer::{
    stamp_document, SignRequest, SignatureImage, SigningOrchestrator, StampedDocument,
    VerificationEntry,
};
pub use store::{
    AuditStore, DocumentStore, FsDocumentStore, FsOutputStore, MemoryAuditStore, OutputStore,
    StoredOutput,
};
