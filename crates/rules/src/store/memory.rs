//! In-memory store implementations.
//!
//! Single-process, non-persistent backends for the worker binary and tests.
//! State is lost when the process exits.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use super::{CollectionService, ExclusionStore, RuleGroupStore, StoreError};
use crate::schema::{Exclusion, NewRuleGroup, RuleGroup};

fn poison_err<T>(_: PoisonError<T>) -> StoreError {
    StoreError::Backend("lock poisoned".to_string())
}

// ── Rule groups ─────────────────────────────────────────────────────

pub struct InMemoryRuleGroupStore {
    groups: RwLock<HashMap<i64, RuleGroup>>,
    next_id: AtomicI64,
}

impl InMemoryRuleGroupStore {
    pub fn new() -> Self {
        Self {
            groups: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Seed the store with existing groups (ids preserved).
    pub fn with_groups(groups: Vec<RuleGroup>) -> Self {
        let max_id = groups.iter().map(|g| g.id).max().unwrap_or(0);
        let map = groups.into_iter().map(|g| (g.id, g)).collect();
        Self {
            groups: RwLock::new(map),
            next_id: AtomicI64::new(max_id + 1),
        }
    }
}

#[async_trait]
impl RuleGroupStore for InMemoryRuleGroupStore {
    async fn find_all(&self) -> Result<Vec<RuleGroup>, StoreError> {
        let groups = self.groups.read().map_err(poison_err)?;
        let mut all: Vec<RuleGroup> = groups.values().cloned().collect();
        all.sort_by_key(|g| g.id);
        Ok(all)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<RuleGroup>, StoreError> {
        let groups = self.groups.read().map_err(poison_err)?;
        Ok(groups.get(&id).cloned())
    }

    async fn insert(&self, new: NewRuleGroup) -> Result<RuleGroup, StoreError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let group = RuleGroup {
            id,
            name: new.name,
            library_id: new.library_id,
            data_type: new.data_type,
            is_active: new.is_active,
            cron_schedule: new.cron_schedule,
            collection_id: new.collection_id,
            rules: new.rules,
        };
        let mut groups = self.groups.write().map_err(poison_err)?;
        groups.insert(id, group.clone());
        Ok(group)
    }

    async fn save(&self, group: &RuleGroup) -> Result<(), StoreError> {
        let mut groups = self.groups.write().map_err(poison_err)?;
        groups.insert(group.id, group.clone());
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        let mut groups = self.groups.write().map_err(poison_err)?;
        groups.remove(&id);
        Ok(())
    }
}

// ── Exclusions ──────────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryExclusionStore {
    rows: RwLock<Vec<Exclusion>>,
    /// Every group id a delete was issued for, in call order.
    delete_calls: RwLock<Vec<i64>>,
}

impl InMemoryExclusionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, exclusion: Exclusion) {
        self.rows
            .write()
            .expect("exclusion rows poisoned")
            .push(exclusion);
    }

    pub fn for_group(&self, rule_group_id: i64) -> Vec<Exclusion> {
        self.rows
            .read()
            .expect("exclusion rows poisoned")
            .iter()
            .filter(|e| e.rule_group_id == rule_group_id)
            .cloned()
            .collect()
    }

    /// Group ids passed to `delete_by_rule_group_id`, in call order.
    pub fn delete_calls(&self) -> Vec<i64> {
        self.delete_calls
            .read()
            .expect("exclusion calls poisoned")
            .clone()
    }
}

#[async_trait]
impl ExclusionStore for InMemoryExclusionStore {
    async fn delete_by_rule_group_id(&self, rule_group_id: i64) -> Result<(), StoreError> {
        self.delete_calls
            .write()
            .map_err(poison_err)?
            .push(rule_group_id);
        let mut rows = self.rows.write().map_err(poison_err)?;
        rows.retain(|e| e.rule_group_id != rule_group_id);
        Ok(())
    }
}

// ── Collections ─────────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryCollectionService {
    deleted: RwLock<Vec<i64>>,
}

impl InMemoryCollectionService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collection ids deleted so far, in call order.
    pub fn deleted_ids(&self) -> Vec<i64> {
        self.deleted.read().expect("collection ids poisoned").clone()
    }
}

#[async_trait]
impl CollectionService for InMemoryCollectionService {
    async fn delete(&self, collection_id: i64) -> Result<(), StoreError> {
        self.deleted.write().map_err(poison_err)?.push(collection_id);
        Ok(())
    }
}
