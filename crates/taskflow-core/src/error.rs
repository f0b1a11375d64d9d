//! Core error types for taskflow-core.
//!
//! Precondition violations, persistence failures and configuration errors
//! are kept in separate enums so callers can treat them differently:
//! a rejected command is a soft warning, a recorder failure is a
//! recoverable notification, a bad profile is fatal at construction.

use std::path::PathBuf;
use thiserror::Error;

use crate::task::TaskId;

/// Core error type for taskflow-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Timer command rejected by a precondition
    #[error("Command rejected: {0}")]
    Command(#[from] CommandError),

    /// Session recorder errors
    #[error("Recorder error: {0}")]
    Recorder(#[from] RecorderError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
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

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,
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

    /// Key does not exist in the configuration tree
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// A timer command whose precondition did not hold.
///
/// State is never modified when one of these is returned.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    #[error("timer is already running")]
    AlreadyRunning,

    #[error("timer is not running")]
    NotRunning,

    #[error("cannot change phase while the timer is running; pause or reset first")]
    PhaseChangeWhileRunning,

    #[error("cannot change the bound task while the timer is running")]
    BindWhileRunning,

    #[error("tasks can only be bound during a work phase")]
    BindOutsideWork,
}

/// Failure reported by a [`SessionRecorder`](crate::recorder::SessionRecorder).
#[derive(Error, Debug)]
pub enum RecorderError {
    /// Underlying storage failed
    #[error("storage failure: {0}")]
    Storage(#[from] DatabaseError),

    /// The task to credit does not exist
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    /// The recorder cannot be reached right now
    #[error("recorder unavailable: {0}")]
    Unavailable(String),
}

// Helper implementations for converting from other error types

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(inner, _msg) => {
                if inner.code == rusqlite::ErrorCode::DatabaseBusy
                    || inner.code == rusqlite::ErrorCode::DatabaseLocked
                {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for RecorderError {
    fn from(err: rusqlite::Error) -> Self {
        RecorderError::Storage(err.into())
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_errors_have_readable_messages() {
        assert_eq!(
            CommandError::PhaseChangeWhileRunning.to_string(),
            "cannot change phase while the timer is running; pause or reset first"
        );
        let core: CoreError = CommandError::AlreadyRunning.into();
        assert_eq!(core.to_string(), "Command rejected: timer is already running");
    }

    #[test]
    fn sqlite_errors_map_to_query_failed() {
        let err: DatabaseError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, DatabaseError::QueryFailed(_)));
    }

    #[test]
    fn recorder_error_wraps_task_id() {
        let err = RecorderError::TaskNotFound(TaskId::from("task-9"));
        assert_eq!(err.to_string(), "task not found: task-9");
    }
}
