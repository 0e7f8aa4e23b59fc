use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-key mutual exclusion.
///
/// Every read-modify-write sequence for one employee (or one transaction
/// id) must be serialized; storage-level atomicity is not enough because
/// a single reconciliation event spans multiple advance records. Locks
/// are allocated lazily and never reclaimed; the key space is bounded by
/// the number of employees and transactions.
#[derive(Default)]
pub struct KeyedLocks<K> {
    locks: Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Acquires the lock for `key`, waiting if another task holds it.
    pub async fn acquire(&self, key: K) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.locks.lock().await;
            Arc::clone(map.entry(key).or_default())
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn test_same_key_serializes() {
        let locks = Arc::new(KeyedLocks::new());
        let in_section = Arc::new(AtomicBool::new(false));
        let mut handles = Vec::new();
        for _ in 0..10 {
            let locks = Arc::clone(&locks);
            let in_section = Arc::clone(&in_section);
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire(1u32).await;
                assert!(!in_section.swap(true, Ordering::SeqCst));
                tokio::task::yield_now().await;
                in_section.store(false, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_block() {
        let locks = KeyedLocks::new();
        let _a = locks.acquire(1u32).await;
        // Would deadlock if keys shared a lock.
        let _b = locks.acquire(2u32).await;
    }
}
