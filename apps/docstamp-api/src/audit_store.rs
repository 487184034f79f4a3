//! SQLite-backed audit trail

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docstamp_core::{AuditStore, StoreError};
use shared_types::{AuditRecord, Field};
use sqlx::sqlite::SqlitePool;
use sqlx::FromRow;

/// Audit row as stored in the database
#[derive(Debug, Clone, FromRow)]
pub struct DbAuditRecord {
    pub id: i64,
    pub document_id: String,
    pub original_hash: String,
    pub signed_hash: String,
    pub signed_at: DateTime<Utc>,
    pub fields_json: String,
    pub output_location: String,
}

impl TryFrom<DbAuditRecord> for AuditRecord {
    type Error = StoreError;

    fn try_from(row: DbAuditRecord) -> Result<Self, Self::Error> {
        let fields: Vec<Field> = serde_json::from_str(&row.fields_json).map_err(|e| {
            StoreError::Backend(format!("Corrupt fields in audit row {}: {}", row.id, e))
        })?;

        Ok(AuditRecord {
            document_id: row.document_id,
            original_hash: row.original_hash,
            signed_hash: row.signed_hash,
            signed_at: row.signed_at,
            fields,
            output_location: row.output_location,
        })
    }
}

/// Append-only audit collection in the `audit` table
#[derive(Debug, Clone)]
pub struct SqliteAuditStore {
    pool: SqlitePool,
}

impl SqliteAuditStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

#[async_trait]
impl AuditStore for SqliteAuditStore {
    async fn append(&self, record: &AuditRecord) -> Result<(), StoreError> {
        let fields_json = serde_json::to_string(&record.fields)
            .map_err(|e| StoreError::Backend(format!("Failed to encode fields: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO audit (document_id, original_hash, signed_hash, signed_at, fields_json, output_location)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.document_id)
        .bind(&record.original_hash)
        .bind(&record.signed_hash)
        .bind(record.signed_at)
        .bind(&fields_json)
        .bind(&record.output_location)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        Ok(())
    }

    async fn list(&self, document_id: &str) -> Result<Vec<AuditRecord>, StoreError> {
        let rows: Vec<DbAuditRecord> = sqlx::query_as(
            r#"
            SELECT id, document_id, original_hash, signed_hash, signed_at, fields_json, output_location
            FROM audit
            WHERE document_id = ?
            ORDER BY id ASC
            "#,
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.into_iter().map(AuditRecord::try_from).collect()
    }
}
