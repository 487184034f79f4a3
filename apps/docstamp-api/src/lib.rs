//! DocStamp API - stamps signature images onto stored PDFs
//!
//! Provides REST endpoints for:
//! - Signing a stored document with a signature image
//! - Serving signed outputs
//! - Reading and verifying the audit trail

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub mod audit_store;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod state;

pub use config::Config;
pub use state::AppState;

/// Build the application router
pub fn build_router(state: Arc<AppState>, config: &Config) -> Router {
    // CORS configuration for web clients
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(handlers::health))
        // Signing
        .route("/sign-pdf", post(handlers::sign_pdf))
        .route("/api/sign", post(handlers::sign_pdf))
        // Audit trail
        .route("/api/audit/:document_id", get(handlers::get_audit_trail))
        .route(
            "/api/audit/:document_id/verify",
            get(handlers::verify_audit_trail),
        )
        // Signed outputs
        .nest_service(config.signed_route(), ServeDir::new(&config.signed_dir))
        // Add middleware
        .layer(DefaultBodyLimit::max(config.body_limit_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
