use concilia_import::DetectError;
use thiserror::Error;

/// Failures surfaced by the reconciliation engine.
///
/// Per-line parse anomalies are deliberately absent: parsers skip bad lines
/// and report a skip count instead of failing the import.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Statement file unreadable. Fatal; nothing is persisted.
    #[error("failed to read statement file: {0}")]
    Io(#[from] std::io::Error),

    /// Content matched none of the known statement formats. Fatal; nothing
    /// is persisted.
    #[error("unsupported statement format")]
    UnsupportedFormat,

    /// Malformed caller input (rule draft, manual-match parameters). No
    /// state change.
    #[error("{0}")]
    Validation(String),

    /// A manual match targeted an obligation belonging to another tenant.
    #[error("{0}")]
    CrossTenantReference(String),

    /// Unknown id, or an id owned by another tenant. Cross-tenant lookups
    /// surface as not-found, never as a permission error.
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<DetectError> for EngineError {
    fn from(_: DetectError) -> Self {
        EngineError::UnsupportedFormat
    }
}

impl EngineError {
    pub fn validation(message: impl Into<String>) -> Self {
        EngineError::Validation(message.into())
    }
}
