//! Ordered listener lists and dispatch batches, shared by both event
//! channels.
//!
//! The change channel (driven by data writes) and the command channel
//! (driven by explicit [`run`](crate::ContextRegistry::run)) are two
//! independent instances of the same structure: a map from code to an
//! insertion-ordered list of callbacks. Dispatch always operates on a
//! snapshot taken under the registry lock, so a listener that registers
//! or removes listeners for the same code never affects the in-flight
//! delivery.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

/// A registered listener callback.
///
/// Callbacks receive the dispatch payload by reference: the post-write
/// value on the change channel, the `run` params on the command channel.
/// Identity matters: removal (`off`/`remove`) matches by allocation, so
/// callers keep a clone of the `Callback` they registered and pass it
/// back to unregister. Clones of the same `Callback` compare equal.
pub type Callback = Arc<dyn Fn(&Value) + Send + Sync + 'static>;

/// Wrap a closure into a [`Callback`].
///
/// # Examples
///
/// ```
/// use ctxbus::callback;
///
/// let cb = callback(|value| {
///     let _ = value;
/// });
/// let clone = cb.clone();
/// assert!(std::sync::Arc::ptr_eq(&cb, &clone));
/// ```
pub fn callback<F>(f: F) -> Callback
where
    F: Fn(&Value) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// A map from code to an insertion-ordered list of callbacks.
///
/// Used once per namespace for each channel. Duplicate registrations of
/// the same callback are allowed; removal only ever takes out the first
/// occurrence.
#[derive(Default)]
pub(crate) struct ListenerSet {
    entries: HashMap<String, Vec<Callback>>,
}

impl ListenerSet {
    /// Append `cb` to the list for `code`, creating the list if absent.
    pub(crate) fn add(&mut self, code: &str, cb: Callback) {
        self.entries.entry(code.to_owned()).or_default().push(cb);
    }

    /// Remove the first registration of `cb` under `code`, by identity.
    ///
    /// A no-op if `code` has no list or `cb` was never registered, so
    /// calling it twice for the same registration is safe.
    pub(crate) fn remove(&mut self, code: &str, cb: &Callback) {
        if let Some(list) = self.entries.get_mut(code)
            && let Some(index) = list.iter().position(|entry| Arc::ptr_eq(entry, cb))
        {
            list.remove(index);
        }
    }

    /// Clone the current list for `code`, empty if absent.
    ///
    /// Dispatch iterates over this snapshot, never the live list.
    pub(crate) fn snapshot(&self, code: &str) -> Vec<Callback> {
        self.entries.get(code).cloned().unwrap_or_default()
    }
}

/// A dispatch captured under the registry lock, delivered after release.
///
/// Holding the callbacks and payload outside the lock keeps listener
/// invocation re-entrant: a listener may call back into the registry
/// (register, remove, write, `run`) without deadlocking.
pub(crate) struct Dispatch {
    callbacks: Vec<Callback>,
    payload: Value,
}

impl Dispatch {
    pub(crate) fn new(callbacks: Vec<Callback>, payload: Value) -> Self {
        Self { callbacks, payload }
    }

    /// Number of listeners this dispatch will reach.
    pub(crate) fn len(&self) -> usize {
        self.callbacks.len()
    }

    /// Invoke every callback in registration order with the payload.
    ///
    /// A panicking listener aborts the remaining listeners in this
    /// dispatch and propagates to the caller; the core does not isolate
    /// listener failures.
    pub(crate) fn deliver(self) {
        for cb in &self.callbacks {
            cb(&self.payload);
        }
    }
}
