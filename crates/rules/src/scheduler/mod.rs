//! Cron-driven rule-group scheduling.
//!
//! A [`JobRegistry`] holds one named job per rule group with a dedicated
//! cron schedule, plus a single global fallback job. The
//! [`RuleGroupScheduler`] ticks the registry from a cooperative timer loop,
//! enqueues due work into the execution queue, and reconciles the registry
//! when rule groups or settings change.
//!
//! This module does NOT evaluate rules. It decides when and how often a
//! rule group's evaluation runs; the queue's drain loop does the rest.

mod core;
pub(crate) mod cron;
mod job;
mod registry;


pub use self::core::RuleGroupScheduler;
pub use self::job::{rule_group_job_name, JobKind, ScheduledJob, GLOBAL_JOB_NAME};
pub use self::registry::JobRegistry;
