//! Pending rule-group execution queue.
//!
//! [`ExecutionQueue`] is an ordered membership set of rule-group ids awaiting
//! evaluation. Scheduler ticks insert ids; the drain loop ([`crate::runner`])
//! pops them. Removing an id only cancels a run that has not been dequeued
//! yet — an execution already handed to a runner always completes.

use std::sync::Mutex;

use indexmap::IndexSet;
use tokio::sync::Notify;
use tracing::{debug, info};

struct QueueState {
    pending: IndexSet<i64>,
    stopped: bool,
}

pub struct ExecutionQueue {
    state: Mutex<QueueState>,
    wakeup: Notify,
}

impl ExecutionQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                pending: IndexSet::new(),
                stopped: false,
            }),
            wakeup: Notify::new(),
        }
    }

    /// Add a rule group to the pending set.
    ///
    /// Returns `true` only when the id was newly added. A duplicate enqueue
    /// returns `false` and keeps the existing entry's position; moving it to
    /// the back could starve earlier entries.
    pub fn enqueue(&self, rule_group_id: i64) -> bool {
        let added = {
            let mut state = self.state.lock().expect("queue state poisoned");
            state.pending.insert(rule_group_id)
        };
        if added {
            debug!(rule_group_id, "rule group queued");
            self.wakeup.notify_one();
        } else {
            debug!(rule_group_id, "rule group already queued, skipping");
        }
        added
    }

    /// Remove a pending (not-yet-started) entry. Returns whether it was
    /// present.
    pub fn remove(&self, rule_group_id: i64) -> bool {
        let removed = {
            let mut state = self.state.lock().expect("queue state poisoned");
            state.pending.shift_remove(&rule_group_id)
        };
        if removed {
            debug!(rule_group_id, "rule group removed from queue");
        }
        removed
    }

    /// Whether the id is currently pending.
    pub fn contains(&self, rule_group_id: i64) -> bool {
        let state = self.state.lock().expect("queue state poisoned");
        state.pending.contains(&rule_group_id)
    }

    /// Ordered snapshot of pending rule-group ids.
    pub fn queued_ids(&self) -> Vec<i64> {
        let state = self.state.lock().expect("queue state poisoned");
        state.pending.iter().copied().collect()
    }

    /// Stop the drain loop: in-flight work finishes, no new dequeues are
    /// admitted. Pending entries stay queued.
    pub fn stop_processing(&self) {
        {
            let mut state = self.state.lock().expect("queue state poisoned");
            state.stopped = true;
        }
        self.wakeup.notify_waiters();
        info!("queue processing stopped");
    }

    pub fn is_stopped(&self) -> bool {
        self.state.lock().expect("queue state poisoned").stopped
    }

    /// Wait for the next pending id, in insertion order.
    ///
    /// Returns `None` once [`stop_processing`](Self::stop_processing) has
    /// been called.
    pub async fn next(&self) -> Option<i64> {
        loop {
            {
                let mut state = self.state.lock().expect("queue state poisoned");
                if state.stopped {
                    return None;
                }
                if let Some(id) = state.pending.first().copied() {
                    state.pending.shift_remove(&id);
                    return Some(id);
                }
            }
            self.wakeup.notified().await;
        }
    }
}

impl Default for ExecutionQueue {
    fn default() -> Self {
        Self::new()
    }
}
