//! Named Lock Registry
//!
//! Process-wide keyed mutual exclusion for mutations that touch the same
//! remote object. Keys are `(name, scope)` where the scope is the resource
//! type from the identifier path, lowercased, so a subnet and a virtual
//! network that share a name don't contend.
//!
//! Entries are created on first use and never removed. The registry grows
//! with the number of distinct keys seen by the process, in exchange for
//! never having to reason about an entry being deleted while another task
//! is about to wait on it.
//!
//! When an operation needs several locks at once, every caller must take
//! them in the same order (child before parent, and sorted within a scope).
//! [`LockRegistry::acquire_many`] sorts for the single-scope case; the
//! registry cannot check the cross-scope order.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::resourceid::ResourceId;

/// Identity of one lock.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LockKey {
    pub name: String,
    pub scope: String,
}

impl LockKey {
    pub fn new(name: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scope: scope.into(),
        }
    }

    /// The key guarding a resource of path type `resource_type`, e.g.
    /// `virtualNetworks`. Types compare case-insensitively.
    pub fn for_type(name: impl Into<String>, resource_type: &str) -> Self {
        Self::new(name, resource_type.to_ascii_lowercase())
    }

    /// The key guarding mutations of `id`: its name within its resource type.
    pub fn for_resource<T: ResourceId>(id: &T) -> Self {
        Self::for_type(id.name(), T::resource_type())
    }
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.scope, self.name)
    }
}

/// Held lock. Dropping it releases the key.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct LockGuard {
    key: LockKey,
    _guard: OwnedMutexGuard<()>,
}

impl LockGuard {
    pub fn key(&self) -> &LockKey {
        &self.key
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        tracing::trace!(lock = %self.key, "released");
    }
}

impl fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockGuard").field("key", &self.key).finish()
    }
}

/// Several held locks, released in reverse acquisition order.
#[must_use = "the locks are released as soon as the guard is dropped"]
#[derive(Debug, Default)]
pub struct MultiLockGuard {
    guards: Vec<LockGuard>,
}

impl MultiLockGuard {
    pub fn keys(&self) -> impl Iterator<Item = &LockKey> {
        self.guards.iter().map(|g| g.key())
    }

    pub fn len(&self) -> usize {
        self.guards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guards.is_empty()
    }
}

impl Drop for MultiLockGuard {
    fn drop(&mut self) {
        while let Some(guard) = self.guards.pop() {
            drop(guard);
        }
    }
}

/// Concurrency-safe map from key to mutex.
#[derive(Default)]
pub struct LockRegistry {
    entries: Mutex<HashMap<LockKey, Arc<AsyncMutex<()>>>>,
}

static GLOBAL: OnceLock<Arc<LockRegistry>> = OnceLock::new();

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry shared by every operation in this process.
    pub fn global() -> Arc<LockRegistry> {
        GLOBAL
            .get_or_init(|| Arc::new(LockRegistry::new()))
            .clone()
    }

    fn entry(&self, key: &LockKey) -> Arc<AsyncMutex<()>> {
        // The map is only touched for lookups and inserts, so a poisoned
        // guard still holds a consistent map.
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        entries
            .entry(key.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Wait for exclusive use of `(name, scope)`.
    pub async fn acquire(&self, name: &str, scope: &str) -> LockGuard {
        self.acquire_key(LockKey::new(name, scope)).await
    }

    pub async fn acquire_key(&self, key: LockKey) -> LockGuard {
        let mutex = self.entry(&key);
        tracing::trace!(lock = %key, "acquiring");
        let guard = mutex.lock_owned().await;
        tracing::trace!(lock = %key, "acquired");
        LockGuard { key, _guard: guard }
    }

    /// Take the lock only if nobody holds it.
    pub fn try_acquire(&self, name: &str, scope: &str) -> Option<LockGuard> {
        let key = LockKey::new(name, scope);
        let guard = self.entry(&key).try_lock_owned().ok()?;
        Some(LockGuard { key, _guard: guard })
    }

    /// Lock several names within one scope.
    ///
    /// Names are de-duplicated and sorted so that concurrent callers locking
    /// overlapping sets always take them in the same order.
    pub async fn acquire_many<S: AsRef<str>>(&self, names: &[S], scope: &str) -> MultiLockGuard {
        let mut keys: Vec<LockKey> = names
            .iter()
            .map(|name| LockKey::new(name.as_ref(), scope))
            .collect();
        keys.sort();
        keys.dedup();
        self.acquire_ordered(keys).await
    }

    /// Lock `keys` in exactly the given order.
    ///
    /// Callers mixing scopes must agree on a global order (child before
    /// parent); duplicates are skipped rather than deadlocking on themselves.
    pub async fn acquire_ordered(&self, keys: impl IntoIterator<Item = LockKey>) -> MultiLockGuard {
        let mut held = MultiLockGuard::default();
        for key in keys {
            if held.keys().any(|k| *k == key) {
                continue;
            }
            held.guards.push(self.acquire_key(key).await);
        }
        held
    }

    /// Number of tasks holding or waiting on `(name, scope)`.
    pub fn holders(&self, name: &str, scope: &str) -> usize {
        let entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        entries
            .get(&LockKey::new(name, scope))
            .map(|mutex| Arc::strong_count(mutex) - 1)
            .unwrap_or(0)
    }

    /// Number of distinct keys ever locked.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
