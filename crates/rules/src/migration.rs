//! Cross-source rule portability.
//!
//! When the application switches its active media server, rules referencing
//! server-specific property ids must be rewritten to the new server's
//! namespace. Rules referencing third-party applications, or mixing two
//! servers across their value references, are non-portable and pass through
//! unchanged; callers aggregate which rules were skipped.

use crate::schema::{Application, Rule};

/// Detect which media server a rule's property references belong to.
///
/// Returns `None` when the rule is non-portable: its `first_val` does not
/// come from a media server, or its `last_val` comes from a different
/// application than `first_val` (the rule mixes two sources).
pub fn detect_source_application(rule: &Rule) -> Option<Application> {
    let source = rule.first_val.application;
    if !source.is_media_server() {
        return None;
    }
    if let Some(last_val) = &rule.last_val {
        if last_val.application != source {
            return None;
        }
    }
    Some(source)
}

/// Rewrite one rule to `target`, preserving property ids and all other
/// fields. The input is not modified.
///
/// Rules that are non-portable or already on `target` come back as unchanged
/// copies.
pub fn migrate_rule(rule: &Rule, target: Application) -> Rule {
    let source = match detect_source_application(rule) {
        Some(source) if source != target => source,
        _ => return rule.clone(),
    };

    let mut migrated = rule.clone();
    migrated.first_val.application = target;
    if let Some(last_val) = &mut migrated.last_val {
        if last_val.application == source {
            last_val.application = target;
        }
    }
    migrated
}

/// Migrate a rule set to `target`. Best-effort per rule: unmigratable rules
/// are passed through unchanged, never an error.
///
/// Absent input passes through as `None`; an empty slice yields an empty
/// vec.
pub fn migrate(rules: Option<&[Rule]>, target: Application) -> Option<Vec<Rule>> {
    let rules = rules?;
    Some(rules.iter().map(|rule| migrate_rule(rule, target)).collect())
}
