//! Error types for the ticket resolver.

use crate::ticket::RowId;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Ticket error: {0}")]
    Ticket(#[from] TicketError),
}

/// Configuration-related errors. Fatal at startup: the process refuses
/// to start rather than degrade at runtime.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Ticket-store errors.
///
/// `UpdateMissing` and `DeleteMissing` mean the row vanished (typically a
/// concurrent actor got there first) and are tolerated by the lifecycle.
/// `Append` is the loud one — a failed append to the processed log risks
/// losing the ticket's durable record entirely.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to read {table}: {reason}")]
    Read { table: String, reason: String },

    #[error("Pending row {row} no longer exists")]
    UpdateMissing { row: RowId },

    #[error("Failed to update pending row {row}: {reason}")]
    Update { row: RowId, reason: String },

    #[error("Failed to append to processed log: {0}")]
    Append(String),

    #[error("Pending row {row} already absent")]
    DeleteMissing { row: RowId },

    #[error("Failed to delete pending row {row}: {reason}")]
    Delete { row: RowId, reason: String },

    #[error("Workbook I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// True when the row was simply gone already — the caller can treat the
    /// operation as applied.
    pub fn is_already_gone(&self) -> bool {
        matches!(self, Self::UpdateMissing { .. } | Self::DeleteMissing { .. })
    }
}

/// LLM provider errors. Classification and reply generation catch these
/// and substitute defaults; they only surface in logs.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} returned status {status}: {body}")]
    HttpStatus {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Ticket validation errors.
#[derive(Debug, thiserror::Error)]
pub enum TicketError {
    #[error("Ticket message must not be empty")]
    EmptyMessage,
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
