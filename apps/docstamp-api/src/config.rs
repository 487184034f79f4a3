//! Environment-driven configuration for DocStamp API

use anyhow::{bail, Context, Result};
use std::path::PathBuf;

const DEFAULT_PORT: u16 = 3001;
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
/// Signature images arrive base64-encoded inside JSON
const DEFAULT_BODY_LIMIT_BYTES: usize = 20 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub database_max_connections: u32,
    pub documents_dir: PathBuf,
    pub signed_dir: PathBuf,
    pub signed_url_prefix: String,
    pub body_limit_bytes: usize,
}

impl Config {
    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            port: parse_var("PORT")?.unwrap_or(DEFAULT_PORT),
            database_url: std::env::var("DATABASE_URL").unwrap_or_else(|_| default_database_url()),
            database_max_connections: parse_var("DATABASE_MAX_CONNECTIONS")?
                .unwrap_or(DEFAULT_MAX_CONNECTIONS),
            documents_dir: std::env::var("DOCUMENTS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./pdfs")),
            signed_dir: std::env::var("SIGNED_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./signed")),
            signed_url_prefix: normalize_url_prefix(
                &std::env::var("SIGNED_URL_PREFIX").unwrap_or_else(|_| "/signed-files".to_string()),
            )?,
            body_limit_bytes: parse_var("BODY_LIMIT_BYTES")?.unwrap_or(DEFAULT_BODY_LIMIT_BYTES),
        })
    }

    /// Route path the signed output directory is served under
    pub fn signed_route(&self) -> &str {
        &self.signed_url_prefix
    }
}

/// Root the prefix at `/` and drop trailing slashes; the bare root is refused
/// since signed files cannot share it with the API routes
pub fn normalize_url_prefix(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        bail!(
            "SIGNED_URL_PREFIX must name a path below the root, got {:?}",
            raw
        );
    }
    Ok(format!("/{}", trimmed))
}

fn parse_var<T>(name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("Invalid value for {}: {:?}", name, raw)),
        Err(_) => Ok(None),
    }
}

fn default_database_url() -> String {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("docstamp-api");
    std::fs::create_dir_all(&data_dir).ok();
    format!("sqlite:{}/docstamp.db?mode=rwc", data_dir.display())
}

/// Get platform-specific data directory
mod dirs {
    use std::path::PathBuf;

    pub fn data_dir() -> Option<PathBuf> {
        #[cfg(target_os = "macos")]
        {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join("Library/Application Support"))
        }
        #[cfg(target_os = "linux")]
        {
            std::env::var("XDG_DATA_HOME")
                .ok()
                .map(PathBuf::from)
                .or_else(|| {
                    std::env::var("HOME")
                        .ok()
                        .map(|h| PathBuf::from(h).join(".local/share"))
                })
        }
        #[cfg(target_os = "windows")]
        {
            std::env::var("APPDATA").ok().map(PathBuf::from)
        }
        #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
        {
            None
        }
    }
}
