//! Data watches: change subscriptions projected through a dotted path,
//! with drop-guard unsubscription.
//!
//! A watch is the setup/teardown pairing external bindings need: it
//! subscribes a change listener on creation and removes it when the
//! guard drops, so unmounting a consumer cannot leak listeners.

use std::sync::{Mutex, PoisonError, Weak};

use serde_json::Value;

use crate::dispatch::{Callback, callback};
use crate::error::Result;
use crate::path::{QualifiedPath, project};
use crate::registry::{self, ContextRegistry, Inner};

/// Keeps a watch subscription alive; dropping it unsubscribes.
///
/// Dropping after the registry was destroyed or dropped is harmless.
#[must_use = "dropping the guard removes the watch subscription"]
pub struct WatchGuard {
    inner: Weak<Mutex<Inner>>,
    namespace: String,
    code: String,
    cb: Callback,
}

impl Drop for WatchGuard {
    fn drop(&mut self) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        // Best effort: a destroyed registry has already dropped the listener.
        let _ = registry::off(&inner, &self.namespace, &self.code, &self.cb);
    }
}

impl std::fmt::Debug for WatchGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchGuard")
            .field("namespace", &self.namespace)
            .field("code", &self.code)
            .finish_non_exhaustive()
    }
}

impl ContextRegistry {
    /// Read the value a dotted path currently projects to.
    ///
    /// Returns `Ok(None)` when the key is absent or the path walks off
    /// the stored value.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] for a malformed path,
    /// [`Error::NamespaceNotFound`] / [`Error::RegistryDestroyed`] from
    /// addressing.
    ///
    /// [`Error::InvalidArgument`]: crate::Error::InvalidArgument
    /// [`Error::NamespaceNotFound`]: crate::Error::NamespaceNotFound
    /// [`Error::RegistryDestroyed`]: crate::Error::RegistryDestroyed
    pub fn peek(&self, path: &str) -> Result<Option<Value>> {
        let parsed = QualifiedPath::parse(path)?;
        let current = registry::get_value(self.inner(), parsed.namespace(), parsed.code())?;
        Ok(current
            .as_ref()
            .and_then(|value| project(value, parsed.segments()))
            .cloned())
    }

    /// Watch the value a dotted path projects to.
    ///
    /// Registers a change listener on the path's key. On every write,
    /// the path is re-projected out of the post-write value and `f` is
    /// invoked with the result, but only when it differs from the
    /// previously delivered projection, so writes that leave the
    /// watched slice unchanged are filtered out. A projection of `None`
    /// (path walked off the value) is delivered as such.
    ///
    /// The baseline for the first comparison is the projection at watch
    /// time, mirroring a consumer that read the initial value via
    /// [`peek`](Self::peek) before subscribing.
    ///
    /// # Errors
    ///
    /// Same as [`peek`](Self::peek).
    ///
    /// # Examples
    ///
    /// ```
    /// use ctxbus::ContextRegistry;
    /// use serde_json::json;
    /// use std::sync::{Arc, Mutex};
    ///
    /// # fn main() -> ctxbus::Result<()> {
    /// let registry = ContextRegistry::new(json!(null))?;
    /// registry.create_namespace("user", json!({ "profile": { "city": "Oslo" } }))?;
    ///
    /// let seen = Arc::new(Mutex::new(Vec::new()));
    /// let sink = Arc::clone(&seen);
    /// let guard = registry.watch("user:profile.city", move |city| {
    ///     sink.lock().unwrap().push(city.cloned());
    /// })?;
    ///
    /// // Writing the same city again does not fire; a new one does.
    /// registry.set("user:profile", json!({ "city": "Oslo" }))?;
    /// registry.set("user:profile", json!({ "city": "Bergen" }))?;
    /// assert_eq!(*seen.lock().unwrap(), vec![Some(json!("Bergen"))]);
    ///
    /// drop(guard);
    /// # Ok(())
    /// # }
    /// ```
    pub fn watch<F>(&self, path: &str, f: F) -> Result<WatchGuard>
    where
        F: Fn(Option<&Value>) + Send + Sync + 'static,
    {
        let parsed = QualifiedPath::parse(path)?;
        let segments: Vec<String> = parsed.segments().iter().map(|s| s.to_string()).collect();

        // The baseline is read and the listener registered under one
        // lock acquisition, so no write can slip between the two and be
        // swallowed by the changed-only filter.
        let cb = registry::on_with_current(
            self.inner(),
            parsed.namespace(),
            parsed.code(),
            |current| {
                let baseline = current
                    .as_ref()
                    .and_then(|value| project(value, &segments))
                    .cloned();
                let last = Mutex::new(baseline);
                callback(move |value: &Value| {
                    let projected = project(value, &segments).cloned();
                    let mut last = last.lock().unwrap_or_else(PoisonError::into_inner);
                    if *last != projected {
                        *last = projected.clone();
                        drop(last);
                        f(projected.as_ref());
                    }
                })
            },
        )?;
        Ok(WatchGuard {
            inner: std::sync::Arc::downgrade(self.inner()),
            namespace: parsed.namespace().to_owned(),
            code: parsed.code().to_owned(),
            cb,
        })
    }
}
