//! Error types for rule-group lifecycle and scheduling.

use thiserror::Error;

use crate::store::StoreError;

/// Errors that can occur during rule-group operations.
#[derive(Debug, Error)]
pub enum RulesError {
    /// Lookup by id found no rule group. Returned (never panicked) so
    /// callers can react without dereferencing a missing row.
    #[error("rule group {0} not found")]
    GroupNotFound(i64),

    /// A cron expression failed to parse.
    #[error("invalid cron expression '{expression}': {source}")]
    InvalidCron {
        expression: String,
        #[source]
        source: cron::error::Error,
    },

    /// A job with this name is already registered.
    #[error("job '{0}' already registered")]
    JobExists(String),

    /// Update/delete targeted a job that does not exist.
    #[error("job '{0}' not found")]
    JobNotFound(String),

    /// Persistence collaborator failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result alias for rule-group operations.
pub type Result<T> = std::result::Result<T, RulesError>;
