//! Error type definitions for the task queue service
//!
//! `TaskError` is the outcome taxonomy delivered through a task's completion
//! handle. `AppError` covers everything around it: configuration loading,
//! startup wiring and the web layer.

use std::time::Duration;
use thiserror::Error;

/// Classified failure of a single submitted task
///
/// Every variant is delivered solely through the task's own outcome handle.
/// Callers are expected to match on the variant rather than on the message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// Invalid submission parameters (empty argument list, zero timeout)
    #[error("Invalid task configuration: {message}")]
    Configuration { message: String },

    /// The external interpreter could not be started
    #[error("Failed to spawn {program}: {message}")]
    Spawn { program: String, message: String },

    /// The process ran and exited unsuccessfully
    #[error("{message}")]
    NonZeroExit { code: Option<i32>, message: String },

    /// The process exceeded its budget and was killed
    #[error("Process timeout after {}", format_timeout(.timeout))]
    Timeout { timeout: Duration },

    /// The task was discarded by a bulk cancellation before it started
    #[error("{reason}")]
    QueueCleared { reason: String },
}

fn format_timeout(timeout: &Duration) -> String {
    humantime::format_duration(*timeout).to_string()
}

impl TaskError {
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn spawn<P: Into<String>, M: Into<String>>(program: P, message: M) -> Self {
        Self::Spawn {
            program: program.into(),
            message: message.into(),
        }
    }

    /// Build a non-zero exit error from captured stderr
    ///
    /// Falls back to a generic message naming the exit code when the process
    /// wrote nothing to stderr.
    pub fn non_zero_exit(code: Option<i32>, stderr: &str) -> Self {
        let stderr = stderr.trim();
        let message = if !stderr.is_empty() {
            stderr.to_string()
        } else {
            match code {
                Some(code) => format!("Process exited with code {code}"),
                None => "Process terminated by signal".to_string(),
            }
        };
        Self::NonZeroExit { code, message }
    }

    pub fn queue_cleared<S: Into<String>>(reason: S) -> Self {
        Self::QueueCleared {
            reason: reason.into(),
        }
    }

    /// Stable identifier for logs and API payloads
    pub fn kind(&self) -> &'static str {
        match self {
            TaskError::Configuration { .. } => "configuration",
            TaskError::Spawn { .. } => "spawn",
            TaskError::NonZeroExit { .. } => "non_zero_exit",
            TaskError::Timeout { .. } => "timeout",
            TaskError::QueueCleared { .. } => "queue_cleared",
        }
    }
}

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// A submitted task failed
    #[error("Task error: {0}")]
    Task(#[from] TaskError),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Validation errors on incoming requests
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Configuration sources could not be merged or deserialized
    #[error("Configuration error: {0}")]
    Figment(#[from] Box<figment::Error>),

    /// Filesystem errors while reading or writing configuration
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl From<figment::Error> for AppError {
    fn from(error: figment::Error) -> Self {
        Self::Figment(Box::new(error))
    }
}

/// Convenience methods for creating common error types
impl AppError {
    /// Create a validation error with a custom message
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}
