//! Reactive data store: per-namespace key/value state where every write
//! produces a change dispatch.
//!
//! The backing map is private to this type and the change-listener
//! registry lives inside it, so the write path here is the only route
//! to both. Callers observe values through cloned snapshots; there is
//! no raw handle to the underlying storage.

use serde_json::{Map, Value};

use crate::dispatch::{Callback, Dispatch, ListenerSet};

/// Key/value state for one namespace, with post-write change notification.
pub(crate) struct DataStore {
    entries: Map<String, Value>,
    change: ListenerSet,
}

impl DataStore {
    /// Create a store seeded with a shallow copy of `seed`.
    pub(crate) fn seeded(seed: &Map<String, Value>) -> Self {
        Self {
            entries: seed.clone(),
            change: ListenerSet::default(),
        }
    }

    /// Read the current value for `key`. No side effects.
    pub(crate) fn get(&self, key: &str) -> Option<Value> {
        self.entries.get(key).cloned()
    }

    /// Commit `value` under `key` and return the change dispatch for it.
    ///
    /// The value is committed before the listener list is snapshotted,
    /// so listeners observe post-write state. The caller delivers the
    /// returned [`Dispatch`] after releasing the registry lock.
    pub(crate) fn write(&mut self, key: &str, value: Value) -> Dispatch {
        self.entries.insert(key.to_owned(), value.clone());
        Dispatch::new(self.change.snapshot(key), value)
    }

    /// Remove `key` from the store.
    ///
    /// Deletion fires no change notification; only writes do. Consumers
    /// may rely on the asymmetry, so it stays.
    pub(crate) fn delete(&mut self, key: &str) {
        self.entries.remove(key);
    }

    /// Clone the full key/value state.
    pub(crate) fn snapshot(&self) -> Map<String, Value> {
        self.entries.clone()
    }

    /// Register a change listener for `key`.
    pub(crate) fn subscribe(&mut self, key: &str, cb: Callback) {
        self.change.add(key, cb);
    }

    /// Remove the first matching change listener for `key`, by identity.
    pub(crate) fn unsubscribe(&mut self, key: &str, cb: &Callback) {
        self.change.remove(key, cb);
    }
}
