use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("schema error: {0}")]
    Schema(String),
    #[error("{0} lock poisoned")]
    Lock(&'static str),
    #[error("draft has no entries")]
    EmptyDraft,
    #[error("invalid import: {0}")]
    InvalidImport(String),
    #[error("fee rate {0} is outside [0, 1)")]
    InvalidFeeRate(f64),
    #[error("unknown platform: {0}")]
    UnknownPlatform(String),
    #[error("unknown menu: {0}")]
    UnknownMenu(String),
    #[error("invalid date: {0}")]
    InvalidDate(String),
    #[error("validation error: {0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
