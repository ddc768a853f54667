//! Error types for the worker pool

use std::any::Any;

/// Result type for worker pool operations
pub type Result<T> = std::result::Result<T, PoolError>;

/// Errors that can occur in the worker pool
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum PoolError {
    /// The pool has been shut down and no longer accepts work
    #[error("worker pool is shutting down")]
    ShuttingDown,

    /// Failed to spawn a pool thread
    #[error("failed to spawn thread '{thread}': {message}")]
    Spawn {
        /// Name of the thread that failed to spawn
        thread: String,
        /// Error message
        message: String,
        /// Source IO error
        #[source]
        source: Option<std::io::Error>,
    },

    /// Timed out waiting for an idle worker or free capacity
    #[error("dispatch timed out after {timeout_ms}ms waiting for a worker")]
    DispatchTimeout {
        /// Timeout duration in milliseconds
        timeout_ms: u64,
    },

    /// A checked-out worker went away before the job could be handed over
    #[error("failed to hand job to a worker")]
    Delivery,

    /// Invalid configuration with parameter
    #[error("invalid configuration for '{parameter}': {message}")]
    InvalidConfig {
        /// Configuration parameter name
        parameter: String,
        /// Error message
        message: String,
    },

    /// A task panicked while executing
    #[error("task panicked: {message}")]
    TaskPanic {
        /// Panic message
        message: String,
    },

    /// Failed to join a pool thread
    #[error("failed to join thread '{thread}': {message}")]
    Join {
        /// Name of the thread that failed to join
        thread: String,
        /// Error message
        message: String,
    },

    /// General error
    #[error("{0}")]
    Other(String),
}

impl PoolError {
    /// Create a spawn error
    pub fn spawn(thread: impl Into<String>, message: impl Into<String>) -> Self {
        PoolError::Spawn {
            thread: thread.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a spawn error with source
    pub fn spawn_with_source(
        thread: impl Into<String>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        PoolError::Spawn {
            thread: thread.into(),
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create a dispatch timeout error
    pub fn dispatch_timeout(timeout_ms: u64) -> Self {
        PoolError::DispatchTimeout { timeout_ms }
    }

    /// Create an invalid config error
    pub fn invalid_config(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        PoolError::InvalidConfig {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create a task panic error
    pub fn task_panic(message: impl Into<String>) -> Self {
        PoolError::TaskPanic {
            message: message.into(),
        }
    }

    /// Create a task panic error from a caught panic payload
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        PoolError::TaskPanic {
            message: panic_message(payload.as_ref()),
        }
    }

    /// Create a join error
    pub fn join(thread: impl Into<String>, message: impl Into<String>) -> Self {
        PoolError::Join {
            thread: thread.into(),
            message: message.into(),
        }
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        PoolError::Other(msg.into())
    }
}

/// Extract a human-readable message from a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
