//! Application state for DocStamp API

use anyhow::{Context, Result};
use docstamp_core::{FsDocumentStore, FsOutputStore, SigningOrchestrator};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::sync::Arc;

use crate::audit_store::SqliteAuditStore;
use crate::config::Config;

pub struct AppState {
    pub db: SqlitePool,
    pub signer: SigningOrchestrator,
}

impl AppState {
    /// Open the audit database once and wire the filesystem stores
    pub async fn new(config: &Config) -> Result<Self> {
        tracing::info!("Connecting to database: {}", config.database_url);

        let pool = connect(&config.database_url, config.database_max_connections).await?;
        run_migrations(&pool).await?;

        let outputs = FsOutputStore::new(&config.signed_dir, &config.signed_url_prefix)
            .with_context(|| {
                format!(
                    "Failed to create signed output directory {}",
                    config.signed_dir.display()
                )
            })?;

        let signer = SigningOrchestrator::new(
            Arc::new(FsDocumentStore::new(&config.documents_dir)),
            Arc::new(outputs),
            Arc::new(SqliteAuditStore::new(pool.clone())),
        );

        Ok(Self { db: pool, signer })
    }

    /// Release database connections
    pub async fn close(&self) {
        self.db.close().await;
        tracing::info!("Database connections closed");
    }
}

pub(crate) async fn connect(database_url: &str, max_connections: u32) -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;
    Ok(pool)
}

pub(crate) async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    tracing::info!("Running database migrations...");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS audit (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            document_id TEXT NOT NULL,
            original_hash TEXT NOT NULL,
            signed_hash TEXT NOT NULL,
            signed_at TEXT NOT NULL,
            fields_json TEXT NOT NULL,
            output_location TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_audit_document_id ON audit(document_id)
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Migrations complete");
    Ok(())
}
