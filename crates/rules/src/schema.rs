//! Rule-group schema types with serde serialization.
//!
//! Defines the persisted shape of rule groups and their rules:
//! - `RuleGroup`: a named, schedulable unit of rules targeting one library
//! - `Rule`: a single condition over media-item properties
//! - `Application`: the data source a property reference is read from
//!
//! Field names serialize in the wire/storage convention of the surrounding
//! application (camelCase, `ruleHandlerCronSchedule` for the per-group cron).

use std::fmt;

use serde::{Deserialize, Serialize};

// ── Application enum ────────────────────────────────────────────────

/// Data source a rule property is read from.
///
/// Only the two media servers are ever migration sources or targets; the
/// remaining applications are third-party services whose properties have no
/// counterpart on the other server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Application {
    Plex,
    Jellyfin,
    Radarr,
    Sonarr,
    Overseerr,
}

impl Application {
    /// Whether this application is a media server (a valid migration
    /// source/target).
    pub fn is_media_server(self) -> bool {
        matches!(self, Application::Plex | Application::Jellyfin)
    }
}

impl fmt::Display for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Application::Plex => write!(f, "Plex"),
            Application::Jellyfin => write!(f, "Jellyfin"),
            Application::Radarr => write!(f, "Radarr"),
            Application::Sonarr => write!(f, "Sonarr"),
            Application::Overseerr => write!(f, "Overseerr"),
        }
    }
}

// ── Media type ──────────────────────────────────────────────────────

/// Kind of media item a rule group evaluates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movies,
    Shows,
    Seasons,
    Episodes,
}

// ── Rules ───────────────────────────────────────────────────────────

/// How a rule combines with the previous rule in its section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RuleOperator {
    And,
    Or,
}

/// Comparator applied between the rule's values.
///
/// The comparison semantics live in the evaluator collaborator; this core
/// only carries the identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleAction {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    Bigger,
    Smaller,
    Before,
    After,
    InLast,
    InNext,
}

/// A property reference: which application it comes from, and the
/// application-specific property id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyRef {
    pub application: Application,
    pub property: i32,
}

impl PropertyRef {
    pub fn new(application: Application, property: i32) -> Self {
        Self {
            application,
            property,
        }
    }
}

/// A single condition within a rule group's section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    /// Combination with the preceding rule; `None` for the first rule of a
    /// section.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<RuleOperator>,
    pub action: RuleAction,
    pub first_val: PropertyRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_val: Option<PropertyRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_val: Option<serde_json::Value>,
    pub section: u32,
}

// ── Rule group ──────────────────────────────────────────────────────

/// A named, schedulable unit of rules targeting one library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleGroup {
    pub id: i64,
    pub name: String,
    pub library_id: i64,
    pub data_type: MediaType,
    pub is_active: bool,
    /// Dedicated cron schedule. Groups without one are driven by the global
    /// fallback job.
    #[serde(rename = "ruleHandlerCronSchedule", default)]
    pub cron_schedule: Option<String>,
    /// Linked collection, cascade-deleted with the group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_id: Option<i64>,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl RuleGroup {
    /// Whether the scheduler should own a dedicated job for this group.
    pub fn wants_dedicated_job(&self) -> bool {
        self.is_active && self.cron_schedule.is_some()
    }

    /// Whether the global fallback tick drives this group.
    pub fn uses_global_schedule(&self) -> bool {
        self.is_active && self.cron_schedule.is_none()
    }
}

/// Insert shape for a new rule group (id assigned by the store).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRuleGroup {
    pub name: String,
    pub library_id: i64,
    pub data_type: MediaType,
    pub is_active: bool,
    #[serde(rename = "ruleHandlerCronSchedule", default)]
    pub cron_schedule: Option<String>,
    #[serde(default)]
    pub collection_id: Option<i64>,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

/// Partial update for an existing rule group. `None` leaves a field
/// untouched; the nullable fields use a nested `Option` so a patch can
/// clear them explicitly.
#[derive(Debug, Clone, Default)]
pub struct RuleGroupUpdate {
    pub name: Option<String>,
    pub is_active: Option<bool>,
    pub cron_schedule: Option<Option<String>>,
    pub collection_id: Option<Option<i64>>,
    pub rules: Option<Vec<Rule>>,
}

impl RuleGroupUpdate {
    /// Apply this patch to a group in place.
    pub fn apply_to(&self, group: &mut RuleGroup) {
        if let Some(name) = &self.name {
            group.name = name.clone();
        }
        if let Some(is_active) = self.is_active {
            group.is_active = is_active;
        }
        if let Some(cron_schedule) = &self.cron_schedule {
            group.cron_schedule = cron_schedule.clone();
        }
        if let Some(collection_id) = &self.collection_id {
            group.collection_id = *collection_id;
        }
        if let Some(rules) = &self.rules {
            group.rules = rules.clone();
        }
    }
}

// ── Settings and dependents ─────────────────────────────────────────

/// Global application settings read by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Default cron expression for rule groups without a dedicated schedule.
    pub rules_handler_job_cron: String,
}

/// A media item excluded from a rule group's actions. Cascade-deleted with
/// the owning group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exclusion {
    pub id: i64,
    pub rule_group_id: i64,
    pub media_item_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_group() -> RuleGroup {
        RuleGroup {
            id: 7,
            name: "Stale movies".to_string(),
            library_id: 1,
            data_type: MediaType::Movies,
            is_active: true,
            cron_schedule: Some("0 0 3 * * *".to_string()),
            collection_id: Some(12),
            rules: vec![Rule {
                operator: None,
                action: RuleAction::Bigger,
                first_val: PropertyRef::new(Application::Plex, 4),
                last_val: None,
                custom_val: Some(serde_json::json!(30)),
                section: 0,
            }],
        }
    }

    #[test]
    fn media_servers_are_the_only_portable_sources() {
        assert!(Application::Plex.is_media_server());
        assert!(Application::Jellyfin.is_media_server());
        assert!(!Application::Radarr.is_media_server());
        assert!(!Application::Sonarr.is_media_server());
        assert!(!Application::Overseerr.is_media_server());
    }

    #[test]
    fn rule_group_serializes_with_storage_field_names() {
        let json = serde_json::to_value(sample_group()).unwrap();
        assert_eq!(json["ruleHandlerCronSchedule"], "0 0 3 * * *");
        assert_eq!(json["isActive"], true);
        assert_eq!(json["collectionId"], 12);
        assert_eq!(json["rules"][0]["firstVal"]["application"], "PLEX");
    }

    #[test]
    fn rule_group_roundtrips_through_json() {
        let group = sample_group();
        let json = serde_json::to_string(&group).unwrap();
        let back: RuleGroup = serde_json::from_str(&json).unwrap();
        assert_eq!(group, back);
    }

    #[test]
    fn wants_dedicated_job_requires_active_and_schedule() {
        let mut group = sample_group();
        assert!(group.wants_dedicated_job());
        assert!(!group.uses_global_schedule());

        group.is_active = false;
        assert!(!group.wants_dedicated_job());

        group.is_active = true;
        group.cron_schedule = None;
        assert!(!group.wants_dedicated_job());
        assert!(group.uses_global_schedule());
    }

    #[test]
    fn update_patch_applies_only_set_fields() {
        let mut group = sample_group();
        let patch = RuleGroupUpdate {
            is_active: Some(false),
            cron_schedule: Some(None),
            ..Default::default()
        };
        patch.apply_to(&mut group);

        assert!(!group.is_active);
        assert_eq!(group.cron_schedule, None);
        // Untouched fields survive.
        assert_eq!(group.name, "Stale movies");
        assert_eq!(group.collection_id, Some(12));
    }
}
