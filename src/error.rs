//! Error types for walkr

use thiserror::Error;

/// Errors surfaced by walkr's stores, collaborators and CLI commands
#[derive(Debug, Error)]
pub enum WalkError {
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid trace: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid trace record at line {line}: {reason}")]
    TraceRecord { line: u64, reason: String },

    #[error("Backend request failed: {0}")]
    Backend(#[from] reqwest::Error),

    #[error("Backend rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Login failed: {0}")]
    Login(String),

    #[error("Asset fetch failed for {path}: {reason}")]
    AssetFetch { path: String, reason: String },
}

pub type Result<T> = std::result::Result<T, WalkError>;
