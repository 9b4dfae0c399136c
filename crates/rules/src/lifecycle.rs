//! Rule-group lifecycle orchestration.
//!
//! [`RuleGroupService`] owns rule-group CRUD, cascading deletes, the global
//! settings record, and event emission. It never touches the job registry or
//! the queue directly; the scheduler reconciles those from the events this
//! service publishes.

use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{info, warn};

use crate::error::{Result, RulesError};
use crate::events::{EventBus, RuleGroupEvent};
use crate::migration::{detect_source_application, migrate_rule};
use crate::schema::{Application, NewRuleGroup, Rule, RuleGroup, RuleGroupUpdate, Settings};
use crate::scheduler::cron::parse_schedule;
use crate::store::{CollectionService, ExclusionStore, RuleGroupStore};

/// Aggregate result of a cross-source migration run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationSummary {
    /// Groups whose rules changed and were persisted.
    pub groups_updated: usize,
    /// Rules rewritten to the target source.
    pub rules_migrated: usize,
    /// Non-portable rules passed through unchanged.
    pub rules_skipped: usize,
}

pub struct RuleGroupService {
    groups: Arc<dyn RuleGroupStore>,
    exclusions: Arc<dyn ExclusionStore>,
    collections: Arc<dyn CollectionService>,
    events: EventBus,
    settings: Mutex<Settings>,
}

impl RuleGroupService {
    pub fn new(
        groups: Arc<dyn RuleGroupStore>,
        exclusions: Arc<dyn ExclusionStore>,
        collections: Arc<dyn CollectionService>,
        events: EventBus,
        settings: Settings,
    ) -> Self {
        Self {
            groups,
            exclusions,
            collections,
            events,
            settings: Mutex::new(settings),
        }
    }

    // ── CRUD ────────────────────────────────────────────────────────

    /// Create a rule group. A dedicated cron schedule, when present, must
    /// parse.
    pub async fn create_rule_group(&self, new: NewRuleGroup) -> Result<RuleGroup> {
        if let Some(cron) = new.cron_schedule.as_deref() {
            parse_schedule(cron)?;
        }
        let group = self.groups.insert(new).await?;
        info!(rule_group_id = group.id, name = %group.name, "rule group created");
        self.events.publish(RuleGroupEvent::Created {
            rule_group: group.clone(),
        });
        Ok(group)
    }

    /// Apply a partial update to an existing group.
    ///
    /// An unknown id comes back as [`RulesError::GroupNotFound`]; no field
    /// of a missing group is ever touched.
    pub async fn update_rule_group(&self, id: i64, update: RuleGroupUpdate) -> Result<RuleGroup> {
        let Some(old) = self.groups.find_by_id(id).await? else {
            return Err(RulesError::GroupNotFound(id));
        };
        if let Some(Some(cron)) = &update.cron_schedule {
            parse_schedule(cron)?;
        }

        let mut updated = old.clone();
        update.apply_to(&mut updated);
        self.groups.save(&updated).await?;
        info!(rule_group_id = id, "rule group updated");
        self.events.publish(RuleGroupEvent::Updated {
            rule_group: updated.clone(),
            old_rule_group: old,
        });
        Ok(updated)
    }

    /// Delete a rule group and its dependents.
    ///
    /// Idempotent: the row may already be gone (duplicate or retried
    /// request). Dependent-row cleanup always proceeds; the deleted event
    /// and collection cleanup only happen when the group was actually
    /// found.
    pub async fn delete_rule_group(&self, id: i64) -> Result<()> {
        let group = self.groups.find_by_id(id).await?;

        self.exclusions.delete_by_rule_group_id(id).await?;
        self.groups.delete(id).await?;

        let Some(group) = group else {
            info!(rule_group_id = id, "rule group already absent, cleanup only");
            return Ok(());
        };

        if let Some(collection_id) = group.collection_id {
            if let Err(e) = self.collections.delete(collection_id).await {
                warn!(
                    rule_group_id = id,
                    collection_id,
                    error = %e,
                    "failed to delete linked collection"
                );
            }
        }
        info!(rule_group_id = id, "rule group deleted");
        self.events.publish(RuleGroupEvent::Deleted { rule_group: group });
        Ok(())
    }

    // ── Settings ────────────────────────────────────────────────────

    pub fn settings(&self) -> Settings {
        self.settings.lock().expect("settings poisoned").clone()
    }

    /// Replace the global settings and notify subscribers.
    pub fn update_settings(&self, settings: Settings) {
        let old_settings = {
            let mut guard = self.settings.lock().expect("settings poisoned");
            std::mem::replace(&mut *guard, settings.clone())
        };
        self.events.publish(RuleGroupEvent::SettingsUpdated {
            settings,
            old_settings,
        });
    }

    // ── Migration ───────────────────────────────────────────────────

    /// Rewrite every group's rules to `target` (the "switch media source"
    /// operation).
    ///
    /// Best-effort per rule: non-portable rules stay as they are and are
    /// counted as skipped; no individual rule ever fails the run.
    pub async fn migrate_rule_groups(&self, target: Application) -> Result<MigrationSummary> {
        let groups = self.groups.find_all().await?;
        let mut summary = MigrationSummary::default();

        for group in groups {
            let mut changed = false;
            let mut new_rules: Vec<Rule> = Vec::with_capacity(group.rules.len());
            for rule in &group.rules {
                if detect_source_application(rule).is_none() {
                    summary.rules_skipped += 1;
                }
                let migrated = migrate_rule(rule, target);
                if migrated != *rule {
                    summary.rules_migrated += 1;
                    changed = true;
                }
                new_rules.push(migrated);
            }
            if !changed {
                continue;
            }

            let old_rule_group = group.clone();
            let mut rule_group = group;
            rule_group.rules = new_rules;
            self.groups.save(&rule_group).await?;
            summary.groups_updated += 1;
            self.events.publish(RuleGroupEvent::Updated {
                rule_group,
                old_rule_group,
            });
        }

        info!(
            target = %target,
            groups = summary.groups_updated,
            migrated = summary.rules_migrated,
            skipped = summary.rules_skipped,
            "rule migration finished"
        );
        Ok(summary)
    }
}
