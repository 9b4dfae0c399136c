pub mod config;

pub use config::{Config, QueueConfig, SchedulerConfig};
