//! Queue drain loop.
//!
//! [`QueueRunner`] pops pending rule-group ids from the [`ExecutionQueue`]
//! and invokes the [`Evaluator`] collaborator for each, holding the per-group
//! [`KeyedLock`] for the duration of the run. Several runners may drain the
//! same queue; the lock guarantees at most one concurrent evaluation per
//! rule group.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::QueueError;
use crate::lock::KeyedLock;
use crate::queue::ExecutionQueue;

/// Outcome of a single rule-group evaluation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EvaluationReport {
    /// Media items inspected.
    pub items_evaluated: usize,
    /// Media items that matched the group's rules.
    pub items_matched: usize,
}

/// Collaborator that evaluates a rule group's rules against live media data.
///
/// Invoked by the drain loop inside the lock held for that rule-group id.
#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn run(&self, rule_group_id: i64) -> Result<EvaluationReport, QueueError>;
}

pub struct QueueRunner {
    queue: Arc<ExecutionQueue>,
    locks: Arc<KeyedLock<i64>>,
    evaluator: Arc<dyn Evaluator>,
}

impl QueueRunner {
    pub fn new(
        queue: Arc<ExecutionQueue>,
        locks: Arc<KeyedLock<i64>>,
        evaluator: Arc<dyn Evaluator>,
    ) -> Self {
        Self {
            queue,
            locks,
            evaluator,
        }
    }

    /// Drain the queue until `stop_processing` is called on it.
    ///
    /// Evaluator failures are logged and never abort the loop.
    pub async fn run(&self) {
        while let Some(rule_group_id) = self.queue.next().await {
            let mut guard = self.locks.acquire(rule_group_id).await;
            debug!(rule_group_id, "evaluating rule group");
            match self.evaluator.run(rule_group_id).await {
                Ok(report) => debug!(
                    rule_group_id,
                    evaluated = report.items_evaluated,
                    matched = report.items_matched,
                    "rule group evaluation finished"
                ),
                Err(e) => warn!(rule_group_id, error = %e, "rule group evaluation failed"),
            }
            guard.release();
        }
        info!("queue runner stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::time::timeout;

    use super::{EvaluationReport, Evaluator, QueueRunner};
    use crate::error::QueueError;
    use crate::lock::KeyedLock;
    use crate::queue::ExecutionQueue;

    /// Records every id it runs; optionally fails for chosen ids.
    struct RecordingEvaluator {
        seen: Mutex<Vec<i64>>,
        fail_for: Vec<i64>,
        delay: Duration,
    }

    impl RecordingEvaluator {
        fn new() -> Self {
            Self {
                seen: Mutex::new(Vec::new()),
                fail_for: Vec::new(),
                delay: Duration::ZERO,
            }
        }
    }

    #[async_trait]
    impl Evaluator for RecordingEvaluator {
        async fn run(&self, rule_group_id: i64) -> Result<EvaluationReport, QueueError> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.seen.lock().unwrap().push(rule_group_id);
            if self.fail_for.contains(&rule_group_id) {
                return Err(QueueError::Evaluation(format!(
                    "synthetic failure for {rule_group_id}"
                )));
            }
            Ok(EvaluationReport::default())
        }
    }

    fn runner_with(evaluator: Arc<RecordingEvaluator>) -> (Arc<ExecutionQueue>, QueueRunner) {
        let queue = Arc::new(ExecutionQueue::new());
        let locks = Arc::new(KeyedLock::new());
        let runner = QueueRunner::new(Arc::clone(&queue), locks, evaluator);
        (queue, runner)
    }

    #[tokio::test]
    async fn drains_in_order_and_stops() {
        let evaluator = Arc::new(RecordingEvaluator::new());
        let (queue, runner) = runner_with(Arc::clone(&evaluator));

        queue.enqueue(1);
        queue.enqueue(2);
        queue.enqueue(3);

        let task = tokio::spawn(async move { runner.run().await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        queue.stop_processing();
        timeout(Duration::from_millis(500), task)
            .await
            .expect("runner should stop")
            .unwrap();

        assert_eq!(*evaluator.seen.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn evaluation_failure_does_not_abort_the_loop() {
        let evaluator = Arc::new(RecordingEvaluator {
            seen: Mutex::new(Vec::new()),
            fail_for: vec![1],
            delay: Duration::ZERO,
        });
        let (queue, runner) = runner_with(Arc::clone(&evaluator));

        queue.enqueue(1);
        queue.enqueue(2);

        let task = tokio::spawn(async move { runner.run().await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        queue.stop_processing();
        timeout(Duration::from_millis(500), task)
            .await
            .expect("runner should stop")
            .unwrap();

        assert_eq!(*evaluator.seen.lock().unwrap(), vec![1, 2]);
    }

    /// Tracks how many evaluations run at once per rule group.
    struct ConcurrencyProbe {
        active: Mutex<HashMap<i64, usize>>,
        max_seen: Mutex<usize>,
    }

    #[async_trait]
    impl Evaluator for ConcurrencyProbe {
        async fn run(&self, rule_group_id: i64) -> Result<EvaluationReport, QueueError> {
            {
                let mut active = self.active.lock().unwrap();
                let slot = active.entry(rule_group_id).or_insert(0);
                *slot += 1;
                let mut max = self.max_seen.lock().unwrap();
                *max = (*max).max(*slot);
            }
            tokio::time::sleep(Duration::from_millis(40)).await;
            {
                let mut active = self.active.lock().unwrap();
                *active.get_mut(&rule_group_id).unwrap() -= 1;
            }
            Ok(EvaluationReport::default())
        }
    }

    #[tokio::test]
    async fn same_group_never_runs_twice_concurrently() {
        let probe = Arc::new(ConcurrencyProbe {
            active: Mutex::new(HashMap::new()),
            max_seen: Mutex::new(0),
        });
        let queue = Arc::new(ExecutionQueue::new());
        let locks = Arc::new(KeyedLock::new());

        // Two runners draining the same queue.
        let mut tasks = Vec::new();
        for _ in 0..2 {
            let runner = QueueRunner::new(
                Arc::clone(&queue),
                Arc::clone(&locks),
                Arc::clone(&probe) as Arc<dyn Evaluator>,
            );
            tasks.push(tokio::spawn(async move { runner.run().await }));
        }

        // The id is re-enqueued after dequeue, so the second runner picks it
        // up while the first is still evaluating.
        queue.enqueue(1);
        tokio::time::sleep(Duration::from_millis(10)).await;
        queue.enqueue(1);

        tokio::time::sleep(Duration::from_millis(150)).await;
        queue.stop_processing();
        for task in tasks {
            timeout(Duration::from_millis(500), task)
                .await
                .expect("runner should stop")
                .unwrap();
        }

        assert_eq!(*probe.max_seen.lock().unwrap(), 1);
    }
}
