//! Request and response bodies for DocStamp API

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use docstamp_core::{SignRequest, SignatureImage, VerificationEntry};
use serde::{Deserialize, Serialize};
use shared_types::{AuditRecord, Field};

/// Body of `POST /sign-pdf` and `POST /api/sign`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignPdfRequest {
    #[serde(alias = "pdfId")]
    pub document_id: String,
    #[serde(alias = "signature")]
    pub signature_image: String,
    #[serde(default)]
    pub fields: Vec<Field>,
}

impl SignPdfRequest {
    /// Decode the signature image and hand the request to the engine
    pub fn into_sign_request(self) -> Result<SignRequest, String> {
        let signature = parse_data_url(&self.signature_image)?;
        Ok(SignRequest {
            document_id: self.document_id,
            signature,
            fields: self.fields,
        })
    }
}

/// Parse `data:<mime>;base64,<payload>` or a bare base64 payload
pub fn parse_data_url(input: &str) -> Result<SignatureImage, String> {
    let input = input.trim();

    let (mime_hint, payload) = match input.strip_prefix("data:") {
        Some(rest) => {
            let (header, payload) = rest
                .split_once(',')
                .ok_or_else(|| "Malformed data URL: missing ','".to_string())?;
            let mut params = header.split(';');
            let mime = params.next().unwrap_or_default().trim();
            if !params.any(|p| p.trim().eq_ignore_ascii_case("base64")) {
                return Err("Data URL must be base64-encoded".to_string());
            }
            let mime_hint = (!mime.is_empty()).then(|| mime.to_ascii_lowercase());
            (mime_hint, payload)
        }
        None => (None, input),
    };

    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Err("Signature image is empty".to_string());
    }

    let bytes = BASE64
        .decode(compact.as_bytes())
        .map_err(|e| format!("Invalid signature base64: {}", e))?;

    Ok(SignatureImage { bytes, mime_hint })
}

/// Response of `GET /api/audit/:document_id`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditTrailResponse {
    pub ok: bool,
    pub document_id: String,
    pub records: Vec<AuditRecord>,
}

/// Response of `GET /api/audit/:document_id/verify`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub ok: bool,
    pub document_id: String,
    /// True when every recorded output still matches its signed hash
    pub intact: bool,
    pub entries: Vec<VerificationEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_png_data_url() {
        let image = parse_data_url("data:image/png;base64,iVBORw0KGgo=").unwrap();
        assert_eq!(image.mime_hint.as_deref(), Some("image/png"));
        assert_eq!(&image.bytes[1..4], b"PNG");
    }

    #[test]
    fn test_parse_bare_base64() {
        let image = parse_data_url("aGVsbG8=").unwrap();
        assert_eq!(image.mime_hint, None);
        assert_eq!(image.bytes, b"hello");
    }

    #[test]
    fn test_parse_rejects_non_base64_data_url() {
        assert!(parse_data_url("data:image/png,rawbytes").is_err());
        assert!(parse_data_url("data:image/png;base64").is_err());
    }

    #[test]
    fn test_parse_rejects_bad_payload() {
        assert!(parse_data_url("data:image/png;base64,***").is_err());
        assert!(parse_data_url("data:image/png;base64,").is_err());
        assert!(parse_data_url("").is_err());
    }

    #[test]
    fn test_request_accepts_legacy_names() {
        let req: SignPdfRequest = serde_json::from_str(
            r#"{"pdfId":"lease","signature":"aGVsbG8=","fields":[
                {"page":1,"leftPct":0.1,"topPct":0.8,"widthPct":0.3,"heightPct":0.1}
            ]}"#,
        )
        .unwrap();
        assert_eq!(req.document_id, "lease");

        let sign = req.into_sign_request().unwrap();
        assert_eq!(sign.fields.len(), 1);
        assert_eq!(sign.signature.bytes, b"hello");
    }

    #[test]
    fn test_request_fields_default_to_empty() {
        let req: SignPdfRequest =
            serde_json::from_str(r#"{"documentId":"lease","signatureImage":"aGVsbG8="}"#).unwrap();
        assert!(req.fields.is_empty());
    }
}
