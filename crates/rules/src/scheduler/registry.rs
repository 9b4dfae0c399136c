//! Named scheduled-job registry.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::{Result, RulesError};

use super::cron::{is_cron_due, parse_schedule};
use super::job::{JobKind, ScheduledJob};

/// Registry of named cron jobs. At most one job per name.
///
/// The registry never ticks itself; [`super::RuleGroupScheduler`] owns it
/// behind a mutex and serializes every mutation with the tick loop and
/// lifecycle events.
#[derive(Default)]
pub struct JobRegistry {
    jobs: HashMap<String, ScheduledJob>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            jobs: HashMap::new(),
        }
    }

    /// Register a new job. Fails with [`RulesError::JobExists`] when the
    /// name is taken.
    pub fn register(&mut self, name: &str, kind: JobKind, cron_expression: &str) -> Result<()> {
        if self.jobs.contains_key(name) {
            return Err(RulesError::JobExists(name.to_string()));
        }
        let (normalized, schedule) = parse_schedule(cron_expression)?;
        debug!(job = name, cron = %normalized, "job registered");
        self.jobs.insert(
            name.to_string(),
            ScheduledJob {
                name: name.to_string(),
                kind,
                cron_expression: normalized,
                schedule,
                last_fired: None,
            },
        );
        Ok(())
    }

    /// Update an existing job's timing in place.
    ///
    /// The job keeps its identity: `kind` and `last_fired` survive the
    /// change.
    pub fn update_timing(&mut self, name: &str, cron_expression: &str) -> Result<()> {
        let (normalized, schedule) = parse_schedule(cron_expression)?;
        let job = self
            .jobs
            .get_mut(name)
            .ok_or_else(|| RulesError::JobNotFound(name.to_string()))?;
        debug!(job = name, cron = %normalized, "job timing updated");
        job.cron_expression = normalized;
        job.schedule = schedule;
        Ok(())
    }

    /// Remove a job by name, returning it.
    pub fn remove(&mut self, name: &str) -> Result<ScheduledJob> {
        let job = self
            .jobs
            .remove(name)
            .ok_or_else(|| RulesError::JobNotFound(name.to_string()))?;
        debug!(job = name, "job removed");
        Ok(job)
    }

    pub fn get(&self, name: &str) -> Option<&ScheduledJob> {
        self.jobs.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.jobs.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Registered job names, sorted for stable diagnostics.
    pub fn job_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.jobs.keys().cloned().collect();
        names.sort();
        names
    }

    /// Jobs whose most recent cron tick falls after their last firing.
    pub fn due_jobs(&self, now: DateTime<Utc>) -> Vec<(String, JobKind)> {
        self.jobs
            .values()
            .filter(|job| is_cron_due(&job.schedule, now, job.last_fired))
            .map(|job| (job.name.clone(), job.kind))
            .collect()
    }

    /// Record that a job fired.
    pub fn record_fired(&mut self, name: &str, at: DateTime<Utc>) {
        if let Some(job) = self.jobs.get_mut(name) {
            job.last_fired = Some(at);
        }
    }
}
