//! Core error types for panictutor-core.
//!
//! Errors are split by who is expected to handle them:
//!
//! - [`StorageError`] is propagated to the caller; the core cannot recover
//!   from a broken persistence substrate.
//! - [`GenerationError`] never leaves the core. Every consumer of the
//!   text generator routes it into fallback content.
//! - [`CoreError::LockedPeriod`] is a user-facing blocking condition.
//! - [`ScheduleDateError`] is only reported to callers that parse dates
//!   explicitly; window computations drop the offending entry instead.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for panictutor-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Persistence-related errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Deletion refused because the test is inside the lock window.
    #[error("cannot delete within 7 days of the test ({date} is {days_until} day(s) away)")]
    LockedPeriod { date: String, days_until: i64 },

    /// Quiz workflow misuse
    #[error("Quiz error: {0}")]
    Quiz(#[from] QuizError),

    /// Notification delivery errors
    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Credential store errors
    #[error("Credential error: {0}")]
    Credential(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Persistence errors raised by a [`crate::storage::KvStore`].
#[derive(Error, Debug)]
pub enum StorageError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// A stored value could not be decoded
    #[error("Corrupt value at {partition}/{key}: {message}")]
    Corrupt {
        partition: String,
        key: String,
        message: String,
    },

    /// Another writer panicked while holding the store
    #[error("Storage mutex poisoned")]
    Poisoned,

    /// Backend refused the operation (used by test doubles and read-only stores)
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown dot-path key
    #[error("unknown config key: {0}")]
    UnknownKey(String),

    /// The data directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Failures from the text-generation collaborator.
///
/// Always recovered locally by the caller.
#[derive(Error, Debug)]
pub enum GenerationError {
    /// No API key is configured
    #[error("text generation is not configured (missing API key)")]
    NotConfigured,

    /// The call did not complete in time
    #[error("text generation timed out after {secs}s")]
    Timeout { secs: u64 },

    /// Transport failure
    #[error("text generation request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success HTTP status
    #[error("text generation returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The response did not have the expected shape
    #[error("malformed generation response: {0}")]
    Malformed(String),

    /// The response had no usable text
    #[error("text generation returned no content")]
    Empty,
}

/// A stored test date that does not parse.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unparseable test date '{0}' (expected YYYY/MM/DD)")]
pub struct ScheduleDateError(pub String);

/// Quiz workflow sequencing errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QuizError {
    /// An operation was invoked in the wrong state
    #[error("quiz is in state {actual:?}, expected {expected:?}")]
    OutOfOrder {
        expected: crate::quiz::QuizState,
        actual: crate::quiz::QuizState,
    },

    /// Finish was requested while items were still waiting for answers
    #[error("quiz still has {remaining} unanswered item(s)")]
    Unanswered { remaining: usize },

    /// The workflow already reached its final state
    #[error("quiz already finished")]
    Finished,
}

/// Notification delivery errors.
#[derive(Error, Debug)]
pub enum NotifyError {
    /// The sink refused or failed to display the payload
    #[error("delivery of notification {id} failed: {message}")]
    DeliveryFailed { id: u32, message: String },
}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Period number outside 1..=6
    #[error("period {0} out of range (expected 1..=6)")]
    PeriodOutOfRange(u8),

    /// Grade assigned to a slot with no subject
    #[error("period {period} on {date} has no subject; grade must stay NONE")]
    GradeOnBlankSlot { date: String, period: u8 },

    /// No entry for a date
    #[error("no schedule entry for {0}")]
    UnknownDate(String),

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(err, _msg) => {
                if err.code == rusqlite::ErrorCode::DatabaseLocked
                    || err.code == rusqlite::ErrorCode::DatabaseBusy
                {
                    StorageError::Locked
                } else {
                    StorageError::QueryFailed(err.to_string())
                }
            }
            _ => StorageError::QueryFailed(err.to_string()),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
