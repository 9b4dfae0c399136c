//! Keyed mutual exclusion with FIFO hand-off.
//!
//! [`KeyedLock`] serializes work per key: concurrent `acquire` calls for the
//! same key queue up and are granted in arrival order, while different keys
//! never contend. There is no acquisition timeout; a holder that never
//! releases blocks every later acquirer of that key.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::Mutex;

use tokio::sync::oneshot;

/// Keyed FIFO lock.
///
/// Internally a map from key to the chain of waiters for that key. A map
/// entry exists exactly while the key is held; releasing with an empty chain
/// drops the entry so the map never grows beyond the set of held keys.
pub struct KeyedLock<K: Eq + Hash + Clone> {
    chains: Mutex<HashMap<K, VecDeque<oneshot::Sender<()>>>>,
}

impl<K: Eq + Hash + Clone> KeyedLock<K> {
    pub fn new() -> Self {
        Self {
            chains: Mutex::new(HashMap::new()),
        }
    }

    /// Acquire the lock for `key`, waiting behind any earlier acquirers.
    ///
    /// The returned guard releases on drop; [`LockGuard::release`] releases
    /// earlier and is idempotent.
    pub async fn acquire(&self, key: K) -> LockGuard<'_, K> {
        let waiter = {
            let mut chains = self.chains.lock().expect("keyed lock poisoned");
            match chains.entry(key.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(VecDeque::new());
                    None
                }
                Entry::Occupied(mut slot) => {
                    let (tx, rx) = oneshot::channel();
                    slot.get_mut().push_back(tx);
                    Some(rx)
                }
            }
        };

        if let Some(rx) = waiter {
            // The sender stays in the chain until hand-off; an Err means the
            // lock itself was dropped, at which point exclusion is moot.
            let _ = rx.await;
        }

        LockGuard {
            lock: self,
            key: Some(key),
        }
    }

    /// Number of keys currently held (including those with waiters).
    pub fn held_keys(&self) -> usize {
        self.chains.lock().expect("keyed lock poisoned").len()
    }

    fn release(&self, key: &K) {
        let mut chains = self.chains.lock().expect("keyed lock poisoned");
        let Some(chain) = chains.get_mut(key) else {
            return;
        };
        // Hand the key to the next waiter still interested; waiters whose
        // acquire future was dropped before their turn are skipped.
        while let Some(next) = chain.pop_front() {
            if next.send(()).is_ok() {
                return;
            }
        }
        chains.remove(key);
    }
}

impl<K: Eq + Hash + Clone> Default for KeyedLock<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive hold on one key of a [`KeyedLock`].
pub struct LockGuard<'a, K: Eq + Hash + Clone> {
    lock: &'a KeyedLock<K>,
    key: Option<K>,
}

impl<K: Eq + Hash + Clone> LockGuard<'_, K> {
    /// Release the key, waking the next waiter in arrival order.
    ///
    /// Idempotent: calling this more than once (or dropping the guard after
    /// calling it) has no further effect and never releases a later holder's
    /// turn.
    pub fn release(&mut self) {
        if let Some(key) = self.key.take() {
            self.lock.release(&key);
        }
    }
}

impl<K: Eq + Hash + Clone> Drop for LockGuard<'_, K> {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::sync::Mutex;
    use tokio::time::timeout;

    use super::KeyedLock;

    #[tokio::test]
    async fn second_acquirer_waits_for_release() {
        let lock = Arc::new(KeyedLock::new());
        let mut held = lock.acquire("k").await;

        let lock2 = Arc::clone(&lock);
        let waiter = tokio::spawn(async move {
            let mut guard = lock2.acquire("k").await;
            guard.release();
        });

        // B must not resolve while A holds the key.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        held.release();
        timeout(Duration::from_millis(200), waiter)
            .await
            .expect("waiter should resolve after release")
            .unwrap();
    }

    #[tokio::test]
    async fn waiters_are_granted_in_arrival_order() {
        let lock = Arc::new(KeyedLock::new());
        let order = Arc::new(Mutex::new(Vec::new()));

        let mut held = lock.acquire(1_i64).await;

        let mut handles = Vec::new();
        for label in ["b", "c", "d"] {
            let lock = Arc::clone(&lock);
            let order = Arc::clone(&order);
            handles.push(tokio::spawn(async move {
                let mut guard = lock.acquire(1_i64).await;
                order.lock().await.push(label);
                guard.release();
            }));
            // Give each spawned task time to join the chain before the next.
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        held.release();
        for handle in handles {
            timeout(Duration::from_millis(500), handle)
                .await
                .expect("waiter should finish")
                .unwrap();
        }

        assert_eq!(*order.lock().await, vec!["b", "c", "d"]);
    }

    #[tokio::test]
    async fn different_keys_never_contend() {
        let lock = KeyedLock::new();
        let _a = lock.acquire("a").await;
        // Must not block.
        let b = timeout(Duration::from_millis(100), lock.acquire("b")).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn release_is_idempotent() {
        let lock = Arc::new(KeyedLock::new());

        let mut first = lock.acquire("k").await;
        first.release();
        first.release();

        // B now holds the key; C queues behind it.
        let _b = lock.acquire("k").await;
        let lock2 = Arc::clone(&lock);
        let c = tokio::spawn(async move {
            let _guard = lock2.acquire("k").await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        // A stale extra release must not hand C the key while B holds it.
        first.release();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!c.is_finished());
        c.abort();
    }

    #[tokio::test]
    async fn holder_never_releasing_blocks_forever() {
        // Pins the no-timeout behavior: changing it should break this test.
        let lock = Arc::new(KeyedLock::new());
        let held = lock.acquire(7_i64).await;

        let lock2 = Arc::clone(&lock);
        let stuck = tokio::spawn(async move {
            let _guard = lock2.acquire(7_i64).await;
        });

        let result = timeout(Duration::from_millis(150), stuck).await;
        assert!(result.is_err(), "acquire must not resolve without a release");
        drop(held);
    }

    #[tokio::test]
    async fn empty_chain_is_dropped_from_the_map() {
        let lock = KeyedLock::new();
        {
            let _guard = lock.acquire(1_i64).await;
            assert_eq!(lock.held_keys(), 1);
        }
        assert_eq!(lock.held_keys(), 0);
    }
}
