//! Queue error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("evaluation failed: {0}")]
    Evaluation(String),
}
