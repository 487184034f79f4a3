//! Append-only audit trail entries for signing operations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Field;

/// Proof-of-operation entry linking pre- and post-signing content hashes.
///
/// One record is written per successful signing and never updated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub document_id: String,
    pub original_hash: String,
    pub signed_hash: String,
    pub signed_at: DateTime<Utc>,
    pub fields: Vec<Field>,
    pub output_location: String,
}

impl AuditRecord {
    /// Create a record stamped with the current time
    pub fn new(
        document_id: &str,
        original_hash: &str,
        signed_hash: &str,
        fields: Vec<Field>,
        output_location: &str,
    ) -> Self {
        Self {
            document_id: document_id.to_string(),
            original_hash: original_hash.to_string(),
            signed_hash: signed_hash.to_string(),
            signed_at: Utc::now(),
            fields,
            output_location: output_location.to_string(),
        }
    }

    /// True when the signing changed the document bytes
    pub fn content_changed(&self) -> bool {
        self.original_hash != self.signed_hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_field() -> Field {
        Field {
            page: 1,
            left_pct: 0.1,
            top_pct: 0.8,
            width_pct: 0.3,
            height_pct: 0.1,
        }
    }

    #[test]
    fn test_new_record_keeps_inputs() {
        let record = AuditRecord::new(
            "lease-42",
            "aaa",
            "bbb",
            vec![sample_field()],
            "signed/lease-42-signed.pdf",
        );

        assert_eq!(record.document_id, "lease-42");
        assert_eq!(record.fields.len(), 1);
        assert_eq!(record.output_location, "signed/lease-42-signed.pdf");
        assert!(record.content_changed());
        assert!(record.signed_at <= Utc::now());
    }

    #[test]
    fn test_record_json_uses_camel_case() {
        let record = AuditRecord::new("doc", "same", "same", vec![], "out.pdf");
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["documentId"], "doc");
        assert_eq!(value["outputLocation"], "out.pdf");
        assert!(value["signedAt"].is_string());
        assert!(!record.content_changed());
    }
}
