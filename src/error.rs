//! Error types for patternworks.
//!
//! All errors are strongly typed using thiserror so callers can pattern match
//! on specific conditions. The flyweight cache never fails; every error here
//! comes from the task queue or from configuration loading.

use thiserror::Error;

/// Boxed error returned by task actions and command receivers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors recorded on a task handle.
///
/// These never propagate to the worker loop; they are local to the task that
/// produced them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// The action returned an error or panicked.
    #[error("Action for '{category}' task failed: {message}")]
    ActionFailed {
        /// Category of the failed task.
        category: String,
        /// The action's error message or panic payload.
        message: String,
    },
}

/// Errors raised by queue operations.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// The queue's worker is gone and accepts no more tasks.
    #[error("Queue '{queue}' is closed")]
    QueueClosed {
        /// Queue name.
        queue: String,
    },

    /// A bounded wait elapsed first.
    #[error("Operation timed out after {duration_ms}ms")]
    Timeout {
        /// How long the caller waited.
        duration_ms: u64,
    },

    /// The worker thread could not be started.
    #[error("Failed to spawn worker: {message}")]
    WorkerSpawn {
        /// OS error text.
        message: String,
    },
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading the file failed.
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid TOML for this schema.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value parsed but is unusable.
    #[error("Invalid config field '{field}': {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: String,
        /// What is wrong with it.
        reason: String,
    },
}

/// Top-level error type for patternworks.
#[derive(Debug, Error)]
pub enum PatternError {
    /// A task's action failed.
    #[error("Task error: {0}")]
    Task(#[from] TaskError),

    /// A queue operation failed.
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// Configuration could not be loaded.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl PatternError {
    /// Returns true if this is a task error.
    #[must_use]
    pub const fn is_task(&self) -> bool {
        matches!(self, Self::Task(_))
    }

    /// Returns true if this is an execution error.
    #[must_use]
    pub const fn is_execution(&self) -> bool {
        matches!(self, Self::Execution(_))
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Returns true if waiting again may succeed.
    ///
    /// Only timeouts qualify: a closed queue stays closed and failed actions
    /// are never resubmitted.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Execution(ExecutionError::Timeout { .. }))
    }
}

/// Result type alias for patternworks operations.
pub type PatternResult<T> = Result<T, PatternError>;

pub(crate) fn timeout_error(timeout: std::time::Duration) -> PatternError {
    PatternError::Execution(ExecutionError::Timeout {
        duration_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
    })
}
