//! Signing pipeline: load, decode, place, serialize, hash, persist
//!
//! Every stage either succeeds or aborts the whole request. Nothing is
//! retried, and a failed request never reports a partial result.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use shared_types::{AuditRecord, Field, SigningResult};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::decoder::{ImageDecoder, ImageFormat};
use crate::document::PdfDocument;
use crate::error::{SignError, StoreError};
use crate::geometry;
use crate::integrity;
use crate::store::{AuditStore, DocumentStore, OutputStore};

const MAX_DOCUMENT_ID_LEN: usize = 128;

/// Signature image bytes plus the MIME type the caller declared, if any
#[derive(Debug, Clone)]
pub struct SignatureImage {
    pub bytes: Vec<u8>,
    pub mime_hint: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SignRequest {
    pub document_id: String,
    pub signature: SignatureImage,
    pub fields: Vec<Field>,
}

/// A signed document that exists only in memory so far
#[derive(Debug, Clone)]
pub struct StampedDocument {
    pub original_hash: String,
    pub signed_hash: String,
    pub bytes: Vec<u8>,
    pub image_format: ImageFormat,
}

/// Result of re-hashing one stored output against its audit record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationEntry {
    pub output_location: String,
    pub signed_at: DateTime<Utc>,
    pub signed_hash: String,
    pub actual_hash: Option<String>,
    pub intact: bool,
}

/// Reject ids that are empty, overly long, or could escape a storage directory
pub fn validate_document_id(document_id: &str) -> Result<(), SignError> {
    let valid_chars = document_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));

    if document_id.is_empty()
        || document_id.len() > MAX_DOCUMENT_ID_LEN
        || !valid_chars
        || document_id.contains("..")
        || document_id.starts_with('.')
    {
        return Err(SignError::InvalidDocumentId(document_id.to_string()));
    }
    Ok(())
}

/// Unique file name for a signed output
pub fn output_name(document_id: &str, now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "{}-signed-{}-{}.pdf",
        document_id,
        now.timestamp_millis(),
        &suffix[..8]
    )
}

/// Apply the signature image to every field of an in-memory document.
///
/// Runs the CPU-bound stages: parse, decode, geometry, drawing,
/// serialization and hashing.
pub fn stamp_document(
    raw: &[u8],
    signature: &SignatureImage,
    fields: &[Field],
    decoder: &ImageDecoder,
) -> Result<StampedDocument, SignError> {
    let original_hash = integrity::digest(raw);
    let mut pdf = PdfDocument::from_bytes(raw)?;

    let decoded = decoder.decode(&signature.bytes)?;
    if let Some(hint) = signature.mime_hint.as_deref() {
        match ImageFormat::from_mime(hint) {
            Some(declared) if declared != decoded.format => warn!(
                "Signature declared as {} but decoded as {}",
                hint,
                decoded.format.mime_type()
            ),
            None => debug!("Unrecognized signature MIME hint: {}", hint),
            _ => {}
        }
    }
    let embedded = pdf.embed_image(&decoded)?;
    let ratio = geometry::aspect_ratio(embedded.pixel_width, embedded.pixel_height)?;

    for field in fields {
        let page = pdf.page_size(field.page)?;
        let placement = geometry::resolve(field, page, ratio)?;
        debug!(
            "Placing signature on page {} at ({:.2}, {:.2}) size {:.2}x{:.2}",
            field.page, placement.x, placement.y, placement.width, placement.height
        );
        pdf.draw_image(field.page, &embedded, &placement)?;
    }

    let bytes = pdf.save_to_bytes()?;
    let signed_hash = integrity::digest(&bytes);

    Ok(StampedDocument {
        original_hash,
        signed_hash,
        bytes,
        image_format: decoded.format,
    })
}

/// Runs signing requests against injected stores
pub struct SigningOrchestrator {
    documents: Arc<dyn DocumentStore>,
    outputs: Arc<dyn OutputStore>,
    audit: Arc<dyn AuditStore>,
    decoder: Arc<ImageDecoder>,
}

impl SigningOrchestrator {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        outputs: Arc<dyn OutputStore>,
        audit: Arc<dyn AuditStore>,
    ) -> Self {
        Self {
            documents,
            outputs,
            audit,
            decoder: Arc::new(ImageDecoder::default()),
        }
    }

    /// Replace the default PNG-then-JPEG decoder
    pub fn with_decoder(mut self, decoder: ImageDecoder) -> Self {
        self.decoder = Arc::new(decoder);
        self
    }

    /// Sign a document and record the operation in the audit trail
    pub async fn sign(&self, request: SignRequest) -> Result<SigningResult, SignError> {
        let SignRequest {
            document_id,
            signature,
            fields,
        } = request;

        validate_document_id(&document_id)?;
        for (index, field) in fields.iter().enumerate() {
            field
                .validate()
                .map_err(|reason| SignError::InvalidField { index, reason })?;
        }

        let raw = self.documents.read(&document_id).await.map_err(|e| match e {
            StoreError::NotFound(_) => SignError::NotFound(document_id.clone()),
            other => SignError::PersistenceError(format!("Failed to read document: {}", other)),
        })?;

        let decoder = Arc::clone(&self.decoder);
        let stamp_fields = fields.clone();
        let stamped = tokio::task::spawn_blocking(move || {
            stamp_document(&raw, &signature, &stamp_fields, &decoder)
        })
        .await
        .map_err(|e| SignError::SerializationError(format!("Signing task aborted: {}", e)))??;

        let name = output_name(&document_id, Utc::now());
        let stored = self
            .outputs
            .write(&name, &stamped.bytes)
            .await
            .map_err(|e| SignError::PersistenceError(format!("Failed to store output: {}", e)))?;

        let record = AuditRecord::new(
            &document_id,
            &stamped.original_hash,
            &stamped.signed_hash,
            fields,
            &stored.location,
        );
        if let Err(e) = self.audit.append(&record).await {
            // No audit record means the output must not survive either
            match self.outputs.remove(&stored.location).await {
                Ok(()) => warn!("Removed unaudited output {}", stored.location),
                Err(cleanup) => warn!(
                    "Failed to remove unaudited output {}: {}",
                    stored.location, cleanup
                ),
            }
            return Err(SignError::PersistenceError(format!(
                "Failed to write audit record: {}",
                e
            )));
        }

        info!(
            "Signed document {} ({} fields, {}): {} -> {}",
            document_id,
            record.fields.len(),
            stamped.image_format.mime_type(),
            stamped.original_hash,
            stamped.signed_hash
        );
        if !record.content_changed() {
            debug!("Signing left document {} byte-identical", document_id);
        }

        Ok(SigningResult {
            success: true,
            url: stored.url,
            original_hash: stamped.original_hash,
            signed_hash: stamped.signed_hash,
        })
    }

    /// Audit records for a document, oldest first
    pub async fn audit_trail(&self, document_id: &str) -> Result<Vec<AuditRecord>, SignError> {
        validate_document_id(document_id)?;
        self.audit
            .list(document_id)
            .await
            .map_err(|e| SignError::PersistenceError(format!("Failed to read audit trail: {}", e)))
    }

    /// Recompute the digest of every stored output and compare with the audit trail
    pub async fn verify(&self, document_id: &str) -> Result<Vec<VerificationEntry>, SignError> {
        let records = self.audit_trail(document_id).await?;
        let mut entries = Vec::with_capacity(records.len());

        for record in records {
            let actual_hash = match self.outputs.read(&record.output_location).await {
                Ok(bytes) => Some(integrity::digest(&bytes)),
                Err(StoreError::NotFound(_)) => None,
                Err(e) => {
                    return Err(SignError::PersistenceError(format!(
                        "Failed to read output {}: {}",
                        record.output_location, e
                    )))
                }
            };
            let intact = actual_hash.as_deref() == Some(record.signed_hash.as_str());

            entries.push(VerificationEntry {
                output_location: record.output_location,
                signed_at: record.signed_at,
                signed_hash: record.signed_hash,
                actual_hash,
                intact,
            });
        }

        Ok(entries)
    }
}
