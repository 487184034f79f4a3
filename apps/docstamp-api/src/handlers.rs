//! HTTP handlers for DocStamp API

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use shared_types::SigningResult;
use std::sync::Arc;

use crate::error::ApiError;
use crate::models::*;
use crate::state::AppState;

/// Health check endpoint
pub async fn health() -> &'static str {
    "OK"
}

/// Stamp a signature image onto a stored document
pub async fn sign_pdf(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SignPdfRequest>, JsonRejection>,
) -> Result<Json<SigningResult>, ApiError> {
    let Json(req) = payload?;

    tracing::info!(
        "Sign request for document {} ({} fields)",
        req.document_id,
        req.fields.len()
    );

    let request = req.into_sign_request().map_err(ApiError::InvalidRequest)?;
    let result = state.signer.sign(request).await?;

    Ok(Json(result))
}

/// List audit records for a document
pub async fn get_audit_trail(
    State(state): State<Arc<AppState>>,
    Path(document_id): Path<String>,
) -> Result<Json<AuditTrailResponse>, ApiError> {
    let records = state.signer.audit_trail(&document_id).await?;

    Ok(Json(AuditTrailResponse {
        ok: true,
        document_id,
        records,
    }))
}

/// Re-hash stored outputs and compare them with the audit trail
pub async fn verify_audit_trail(
    State(state): State<Arc<AppState>>,
    Path(document_id): Path<String>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let entries = state.signer.verify(&document_id).await?;
    let intact = entries.iter().all(|e| e.intact);

    if !intact {
        tracing::warn!("Audit verification failed for document {}", document_id);
    }

    Ok(Json(VerifyResponse {
        ok: true,
        document_id,
        intact,
        entries,
    }))
}
