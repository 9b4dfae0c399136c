//! Rule-group scheduling and lifecycle engine.
//!
//! This crate provides:
//! - Rule-group and rule schema types with serde serialization
//! - Cron-driven job registry and scheduler with per-group and global jobs
//! - Lifecycle orchestration (CRUD, cascading deletes, event emission)
//! - Cross-source rule migration between media-server property namespaces
//! - Typed in-process event bus consumed by the scheduler

pub mod error;
pub mod events;
pub mod lifecycle;
pub mod migration;
pub mod schema;
pub mod scheduler;
pub mod store;

pub use error::{Result, RulesError};
pub use events::{EventBus, RuleGroupEvent};
pub use lifecycle::{MigrationSummary, RuleGroupService};
pub use schema::{Application, Rule, RuleGroup, Settings};
pub use scheduler::RuleGroupScheduler;
