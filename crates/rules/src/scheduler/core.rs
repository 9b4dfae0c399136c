//! [`RuleGroupScheduler`] — drives the job registry and reconciles it with
//! lifecycle events.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio::sync::{Mutex, Notify};
use tracing::{debug, info, warn};

use custodian_queue::ExecutionQueue;

use crate::error::{Result, RulesError};
use crate::events::RuleGroupEvent;
use crate::schema::{RuleGroup, Settings};
use crate::store::RuleGroupStore;

use super::job::{rule_group_job_name, JobKind, ScheduledJob, GLOBAL_JOB_NAME};
use super::registry::JobRegistry;

/// Owns the job registry and the queue-facing scheduling decisions.
///
/// All registry and queue mutations go through the registry mutex, so ticks,
/// lifecycle events, and settings updates never interleave mid-reconcile.
pub struct RuleGroupScheduler {
    registry: Mutex<JobRegistry>,
    queue: Arc<ExecutionQueue>,
    groups: Arc<dyn RuleGroupStore>,
    /// Global default cron used at bootstrap; later changes arrive via
    /// settings events.
    default_cron: String,
    stopped: AtomicBool,
    shutdown: Notify,
}

impl RuleGroupScheduler {
    pub fn new(
        queue: Arc<ExecutionQueue>,
        groups: Arc<dyn RuleGroupStore>,
        default_cron: String,
    ) -> Self {
        Self {
            registry: Mutex::new(JobRegistry::new()),
            queue,
            groups,
            default_cron,
            stopped: AtomicBool::new(false),
            shutdown: Notify::new(),
        }
    }

    // ── Bootstrap ───────────────────────────────────────────────────

    /// Load all rule groups and build the initial job registry: one
    /// dedicated job per active group with a cron schedule, plus the global
    /// fallback job.
    pub async fn bootstrap(&self) -> Result<()> {
        let groups = self.groups.find_all().await?;
        let mut registry = self.registry.lock().await;

        for group in &groups {
            if group.wants_dedicated_job() {
                Self::register_group_job(&mut registry, group);
            }
        }

        match registry.register(GLOBAL_JOB_NAME, JobKind::Global, &self.default_cron) {
            Ok(()) => {}
            Err(RulesError::JobExists(_)) => {
                warn!(job = GLOBAL_JOB_NAME, "global job already registered, skipping");
            }
            Err(e) => return Err(e),
        }

        info!(jobs = registry.len(), "scheduler bootstrapped");
        Ok(())
    }

    /// Register a group's dedicated job. A duplicate name or bad cron is
    /// logged and skipped; the scheduler keeps running.
    fn register_group_job(registry: &mut JobRegistry, group: &RuleGroup) {
        let Some(cron) = group.cron_schedule.as_deref() else {
            return;
        };
        let name = rule_group_job_name(group.id);
        match registry.register(&name, JobKind::RuleGroup(group.id), cron) {
            Ok(()) => {}
            Err(RulesError::JobExists(_)) => {
                warn!(job = %name, "job already registered, skipping");
            }
            Err(e) => {
                warn!(job = %name, error = %e, "failed to register job");
            }
        }
    }

    // ── Lifecycle reconciliation ────────────────────────────────────

    pub async fn on_rule_group_created(&self, rule_group: &RuleGroup) {
        if !rule_group.wants_dedicated_job() {
            return;
        }
        let mut registry = self.registry.lock().await;
        Self::register_group_job(&mut registry, rule_group);
    }

    pub async fn on_rule_group_updated(&self, rule_group: &RuleGroup, old_rule_group: &RuleGroup) {
        let name = rule_group_job_name(rule_group.id);
        let mut registry = self.registry.lock().await;

        if !rule_group.wants_dedicated_job() {
            // Became inactive, or the dedicated schedule was cleared: the
            // job goes away and a queued run whose trigger is now invalid
            // is cancelled.
            if registry.contains(&name) {
                if let Err(e) = registry.remove(&name) {
                    warn!(job = %name, error = %e, "failed to remove job");
                }
            }
            self.queue.remove(rule_group.id);
            return;
        }

        if !registry.contains(&name) {
            // Became active with a schedule where no job existed before.
            Self::register_group_job(&mut registry, rule_group);
            return;
        }

        // Job exists and the group still wants it: refresh the timing in
        // place (identity preserved) and cancel any pending run queued
        // under the previous timing; the next valid tick re-enqueues it.
        let Some(cron) = rule_group.cron_schedule.as_deref() else {
            return;
        };
        match registry.update_timing(&name, cron) {
            Ok(()) => {
                self.queue.remove(rule_group.id);
                if old_rule_group.cron_schedule != rule_group.cron_schedule {
                    debug!(job = %name, cron, "dedicated schedule changed");
                }
            }
            Err(e) => warn!(job = %name, error = %e, "failed to update job timing"),
        }
    }

    pub async fn on_rule_group_deleted(&self, rule_group: &RuleGroup) {
        let name = rule_group_job_name(rule_group.id);
        {
            let mut registry = self.registry.lock().await;
            if registry.contains(&name) {
                if let Err(e) = registry.remove(&name) {
                    warn!(job = %name, error = %e, "failed to remove job");
                }
            }
        }
        self.queue.remove(rule_group.id);
    }

    pub async fn on_settings_updated(&self, settings: &Settings, old_settings: &Settings) {
        if settings.rules_handler_job_cron == old_settings.rules_handler_job_cron {
            return;
        }
        let mut registry = self.registry.lock().await;
        if registry.contains(GLOBAL_JOB_NAME) {
            if let Err(e) =
                registry.update_timing(GLOBAL_JOB_NAME, &settings.rules_handler_job_cron)
            {
                warn!(error = %e, "failed to update global job timing");
            }
        } else {
            // First-run edge case: the global job is missing entirely.
            if let Err(e) = registry.register(
                GLOBAL_JOB_NAME,
                JobKind::Global,
                &settings.rules_handler_job_cron,
            ) {
                warn!(error = %e, "failed to register global job");
            }
        }
    }

    /// Dispatch one lifecycle event. Called from the event loop, one event
    /// at a time.
    pub async fn handle_event(&self, event: RuleGroupEvent) {
        debug!(kind = event.kind(), "handling event");
        match event {
            RuleGroupEvent::Created { rule_group } => {
                self.on_rule_group_created(&rule_group).await;
            }
            RuleGroupEvent::Updated {
                rule_group,
                old_rule_group,
            } => {
                self.on_rule_group_updated(&rule_group, &old_rule_group).await;
            }
            RuleGroupEvent::Deleted { rule_group } => {
                self.on_rule_group_deleted(&rule_group).await;
            }
            RuleGroupEvent::SettingsUpdated {
                settings,
                old_settings,
            } => {
                self.on_settings_updated(&settings, &old_settings).await;
            }
        }
    }

    // ── Ticking ─────────────────────────────────────────────────────

    /// Fire every due job at `now`: dedicated jobs enqueue their group, the
    /// global job enqueues every active group without a dedicated schedule.
    ///
    /// The registry lock is held for the whole tick so lifecycle events
    /// never interleave between a job firing and its enqueue.
    pub async fn tick(&self, now: DateTime<Utc>) {
        let mut registry = self.registry.lock().await;
        for (name, kind) in registry.due_jobs(now) {
            registry.record_fired(&name, now);
            match kind {
                JobKind::RuleGroup(rule_group_id) => {
                    debug!(job = %name, rule_group_id, "dedicated job tick");
                    self.queue.enqueue(rule_group_id);
                }
                JobKind::Global => self.global_tick().await,
            }
        }
    }

    /// The global fallback tick. Dedicated schedules take precedence: only
    /// groups without one are enqueued here.
    async fn global_tick(&self) {
        match self.groups.find_all().await {
            Ok(groups) => {
                let mut enqueued = 0usize;
                for group in groups.iter().filter(|g| g.uses_global_schedule()) {
                    if self.queue.enqueue(group.id) {
                        enqueued += 1;
                    }
                }
                debug!(enqueued, "global job tick");
            }
            Err(e) => warn!(error = %e, "global tick failed to load rule groups"),
        }
    }

    // ── Loops and shutdown ──────────────────────────────────────────

    /// Timer loop: tick once per `tick_interval` until shutdown.
    pub async fn run(&self, tick_interval: Duration) {
        info!(interval_secs = tick_interval.as_secs(), "scheduler started");
        let mut interval = tokio::time::interval(tick_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            if self.stopped.load(Ordering::Relaxed) {
                break;
            }
            tokio::select! {
                _ = interval.tick() => self.tick(Utc::now()).await,
                _ = self.shutdown.notified() => break,
            }
        }
        info!("scheduler stopped");
    }

    /// Event loop: apply lifecycle events as they arrive until shutdown.
    pub async fn run_events(&self, mut events: broadcast::Receiver<RuleGroupEvent>) {
        loop {
            if self.stopped.load(Ordering::Relaxed) {
                break;
            }
            tokio::select! {
                result = events.recv() => match result {
                    Ok(event) => self.handle_event(event).await,
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "event stream lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = self.shutdown.notified() => break,
            }
        }
        info!("scheduler event loop stopped");
    }

    /// Signal every scheduler loop to stop.
    pub fn shutdown(&self) {
        self.stopped.store(true, Ordering::Relaxed);
        self.shutdown.notify_waiters();
    }

    // ── Introspection ───────────────────────────────────────────────

    /// Snapshot of a registered job, if present.
    pub async fn job(&self, name: &str) -> Option<ScheduledJob> {
        self.registry.lock().await.get(name).cloned()
    }

    pub async fn has_job(&self, name: &str) -> bool {
        self.registry.lock().await.contains(name)
    }

    /// Registered job names, sorted.
    pub async fn job_names(&self) -> Vec<String> {
        self.registry.lock().await.job_names()
    }
}
