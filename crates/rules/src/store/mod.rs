//! Persistence collaborator traits.
//!
//! The engine reads and writes rule groups, exclusions, and collections
//! through these seams; the storage mechanics behind them are not part of
//! this core. [`memory`] provides in-process implementations for the worker
//! binary and tests.

pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::schema::{NewRuleGroup, RuleGroup};

/// Persistence failure surfaced by a store implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Rule-group rows.
#[async_trait]
pub trait RuleGroupStore: Send + Sync {
    async fn find_all(&self) -> Result<Vec<RuleGroup>, StoreError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<RuleGroup>, StoreError>;

    /// Insert a new group; the store assigns the id.
    async fn insert(&self, new: NewRuleGroup) -> Result<RuleGroup, StoreError>;

    /// Persist the current state of an existing group.
    async fn save(&self, group: &RuleGroup) -> Result<(), StoreError>;

    /// Delete by id. Deleting an absent row is a no-op, not an error.
    async fn delete(&self, id: i64) -> Result<(), StoreError>;
}

/// Exclusion rows referencing a rule group.
#[async_trait]
pub trait ExclusionStore: Send + Sync {
    /// Delete every exclusion for the group. No-op when none exist.
    async fn delete_by_rule_group_id(&self, rule_group_id: i64) -> Result<(), StoreError>;
}

/// External collection entities linked to rule groups.
#[async_trait]
pub trait CollectionService: Send + Sync {
    async fn delete(&self, collection_id: i64) -> Result<(), StoreError>;
}
