//! Error types for biblion.

use thiserror::Error;

/// Main error type for biblion operations.
///
/// Domain variants carry a stable machine-readable code (see [`Error::code`])
/// so the CLI boundary can emit structured errors without matching on
/// display strings.
#[derive(Error, Debug)]
pub enum Error {
    /// Title does not exist (or is hidden from the requester).
    #[error("Title not found: {0}")]
    TitleNotFound(i64),

    /// No inventory record exists for the title.
    #[error("No inventory record for title {0}")]
    InventoryNotFound(i64),

    /// Inventory record already exists, or a direct set would over-allocate.
    #[error("Inventory conflict for title {title_id}: {reason}")]
    InventoryConflict { title_id: i64, reason: String },

    /// No copies available for borrowing.
    #[error("No copies of title {0} available for borrowing")]
    Exhausted(i64),

    /// No active loan exists for the (member, title) pair.
    #[error("No active loan for member {member_id} on title {title_id}")]
    NoActiveLoan { member_id: i64, title_id: i64 },

    /// Ledger counts contradict the loan records. Signals a prior bug:
    /// the engine is supposed to make this state unreachable.
    #[error(
        "Inventory inconsistent for title {title_id}: borrowed_copies={borrowed_copies} with an active loan present"
    )]
    InventoryInconsistent { title_id: i64, borrowed_copies: i64 },

    /// An inventory adjustment would violate 0 <= borrowed <= total.
    #[error("Invalid inventory range: {0}")]
    InvalidRange(String),

    /// Search limit outside the accepted bounds.
    #[error("Invalid limit: {0}")]
    InvalidLimit(String),

    /// Embedding provider unreachable while the caller required it.
    #[error("Embedding provider unavailable: {0}")]
    ServiceUnavailable(String),

    /// Operation requires a privileged role.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Embedding provider request failed (internal detail; surfaced to
    /// callers as unavailability, never as a hard failure of a write).
    #[error("Provider error: {0}")]
    Provider(String),

    /// Stored embedding BLOB has the wrong byte length.
    #[error("Invalid BLOB size: expected {expected} bytes, got {actual} bytes")]
    InvalidBlobSize { expected: usize, actual: usize },

    /// Vector dimensionality mismatch.
    #[error("Mismatched dimensions: expected {expected}, got {actual}")]
    MismatchedDimensions { expected: usize, actual: usize },

    /// Embedding vector contains NaN or infinite values.
    #[error("Invalid embedding: {0}")]
    InvalidEmbedding(String),

    /// SQLite error.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Stable code for the request boundary.
    pub fn code(&self) -> &'static str {
        match self {
            Error::TitleNotFound(_) => "not_found",
            Error::InventoryNotFound(_) => "not_found",
            Error::InventoryConflict { .. } => "conflict",
            Error::Exhausted(_) => "exhausted",
            Error::NoActiveLoan { .. } => "no_active_loan",
            Error::InventoryInconsistent { .. } => "inventory_inconsistent",
            Error::InvalidRange(_) => "invalid_range",
            Error::InvalidLimit(_) => "invalid_limit",
            Error::ServiceUnavailable(_) => "service_unavailable",
            Error::Forbidden(_) => "forbidden",
            Error::InvalidInput(_) => "invalid_input",
            Error::Config(_) => "config",
            Error::Provider(_) => "provider",
            Error::InvalidBlobSize { .. }
            | Error::MismatchedDimensions { .. }
            | Error::InvalidEmbedding(_) => "invalid_embedding",
            Error::Sqlite(_) | Error::Io(_) | Error::Json(_) => "internal",
        }
    }
}
