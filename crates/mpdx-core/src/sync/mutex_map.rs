//! Per-key async locks

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Map from key to its own async lock.
///
/// Locks are created on first use and never removed. Keys are sync scopes
/// such as account list ids, a small bounded set for the lifetime of the
/// process, so the table is allowed to grow instead of tracking waiters for
/// pruning.
///
/// Waiters for the same key are served in arrival order (`tokio`'s mutex is
/// fair); different keys never contend.
pub struct MutexMap<K> {
    locks: Arc<Mutex<HashMap<K, Arc<Mutex<()>>>>>,
}

impl<K> Clone for MutexMap<K> {
    fn clone(&self) -> Self {
        Self {
            locks: Arc::clone(&self.locks),
        }
    }
}

impl<K: Eq + Hash> Default for MutexMap<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash> MutexMap<K> {
    pub fn new() -> Self {
        Self {
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Wait for the lock on `key`. Released when the guard is dropped.
    pub async fn lock(&self, key: K) -> OwnedMutexGuard<()> {
        let handle = {
            let mut locks = self.locks.lock().await;
            Arc::clone(locks.entry(key).or_default())
        };
        handle.lock_owned().await
    }

    /// Run `f` while holding the lock on `key`.
    ///
    /// The lock is released however the future ends: completion, error
    /// return, panic, or being dropped mid-flight.
    pub async fn with_lock<F, Fut, T>(&self, key: K, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _guard = self.lock(key).await;
        f().await
    }

    /// Number of keys that have ever been locked.
    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
