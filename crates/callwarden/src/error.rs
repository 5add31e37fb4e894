//! Error types for Callwarden.

use thiserror::Error;
use uuid::Uuid;

/// Callwarden error type.
///
/// An absent caller number and an unreachable foreground runtime are not
/// errors; they are modelled as `PhoneNumber::Unknown` and
/// `Reachability::Unreachable` respectively.
#[derive(Error, Debug)]
pub enum WardenError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error (config file)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A screening decision with flags the platform would reject
    #[error("Invalid screening decision: {0}")]
    InvalidDecision(String),

    /// The external classifier failed to produce a verdict
    #[error("Classifier error: {0}")]
    Classifier(String),

    /// Background dispatch used every attempt without a delivery
    #[error("Dispatch task {task_id} exhausted after {attempts} attempts")]
    DispatchExhausted { task_id: Uuid, attempts: u32 },

    /// Background dispatch ran past its overall execution budget
    #[error("Dispatch task {task_id} timed out after {elapsed_ms} ms")]
    DispatchTimedOut { task_id: Uuid, elapsed_ms: u64 },

    /// The relay queue is full; the request was dropped
    #[error("Relay queue full")]
    RelayFull,

    /// The relay worker is gone and no longer accepts requests
    #[error("Relay worker closed")]
    RelayClosed,
}

/// Result type for Callwarden operations.
pub type WardenResult<T> = Result<T, WardenError>;
