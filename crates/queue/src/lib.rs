pub mod error;
pub mod lock;
pub mod queue;
pub mod runner;

pub use error::QueueError;
pub use lock::{KeyedLock, LockGuard};
pub use queue::ExecutionQueue;
pub use runner::{EvaluationReport, Evaluator, QueueRunner};
