//! Scheduled-job entry types.

use chrono::{DateTime, Utc};
use cron::Schedule;

/// Name of the single global fallback job.
pub const GLOBAL_JOB_NAME: &str = "rule-group-executor-global";

/// Registry name for a rule group's dedicated job.
pub fn rule_group_job_name(rule_group_id: i64) -> String {
    format!("rule-group-executor-{rule_group_id}")
}

/// What a job's tick enqueues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    /// Dedicated job for one rule group.
    RuleGroup(i64),
    /// Fallback driving every active group without a dedicated schedule.
    Global,
}

/// A named, cron-driven registry entry.
#[derive(Debug, Clone)]
pub struct ScheduledJob {
    pub name: String,
    pub kind: JobKind,
    /// Normalized 6-field cron expression.
    pub cron_expression: String,
    pub(crate) schedule: Schedule,
    /// When the job last fired.
    pub last_fired: Option<DateTime<Utc>>,
}
