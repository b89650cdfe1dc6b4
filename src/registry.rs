//! The context registry: owner of every namespace's store, listener
//! registries, and latch table.
//!
//! The registry is an explicit, constructible type with caller-controlled
//! lifetime. Construct one at application start, hand out clones (all
//! clones share state), and call [`destroy`](ContextRegistry::destroy)
//! at shutdown. There is no process-wide singleton, so tests construct
//! isolated instances freely.
//!
//! A single mutex serializes every operation, which preserves the fully
//! synchronous semantics of the core in a multi-threaded host. The lock
//! is never held across listener invocation: mutations are committed and
//! the listener list snapshotted under the lock, then the lock is
//! released and the snapshot delivered. Listener code may therefore
//! re-enter the registry freely.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::{Map, Value};

use crate::address::{GLOBAL_NAMESPACE, QualifiedCode, validate_namespace};
use crate::context::CtxHandle;
use crate::dispatch::{Callback, Dispatch, ListenerSet};
use crate::error::{Error, Result};
use crate::latch::{LatchTable, Next};
use crate::store::DataStore;

/// All state owned by one namespace.
pub(crate) struct NamespaceState {
    /// Key/value data plus the change-listener registry.
    pub(crate) store: DataStore,
    /// Command listeners, fired only by explicit `run`.
    pub(crate) commands: ListenerSet,
    /// Once-latch states, keyed by code.
    pub(crate) latches: LatchTable,
}

impl NamespaceState {
    fn seeded(seed: &Map<String, Value>) -> Self {
        Self {
            store: DataStore::seeded(seed),
            commands: ListenerSet::default(),
            latches: LatchTable::default(),
        }
    }
}

/// Registry state behind the mutex.
pub(crate) struct Inner {
    pub(crate) namespaces: HashMap<String, NamespaceState>,
    pub(crate) destroyed: bool,
}

impl Inner {
    fn ensure_alive(&self) -> Result<()> {
        if self.destroyed {
            return Err(Error::RegistryDestroyed);
        }
        Ok(())
    }

    fn namespace(&self, name: &str) -> Result<&NamespaceState> {
        self.ensure_alive()?;
        self.namespaces
            .get(name)
            .ok_or_else(|| Error::NamespaceNotFound(name.to_owned()))
    }

    fn namespace_mut(&mut self, name: &str) -> Result<&mut NamespaceState> {
        self.ensure_alive()?;
        self.namespaces
            .get_mut(name)
            .ok_or_else(|| Error::NamespaceNotFound(name.to_owned()))
    }
}

/// Lock the registry state, recovering from poisoning.
///
/// Listener callbacks never run under this lock, so a poisoned mutex can
/// only come from a panic inside a short internal critical section; the
/// state is still coherent and the guard is recovered rather than
/// cascading the panic into every later caller.
pub(crate) fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Interpret a seed value as namespace data.
///
/// Accepts a JSON object (its entries become the initial keys) or
/// `null` (an empty namespace). Anything else is an [`Error::InvalidArgument`].
fn as_seed(value: Value) -> Result<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(Error::InvalidArgument(format!(
            "namespace seed must be a JSON object or null, got {other}"
        ))),
    }
}

// Per-namespace operations shared by the registry's qualified entry
// points and the namespace facade. Each one commits under the lock,
// then delivers any resulting dispatch after releasing it.

pub(crate) fn ensure(inner: &Arc<Mutex<Inner>>, ns: &str) -> Result<()> {
    lock(inner).namespace(ns).map(|_| ())
}

pub(crate) fn get_value(inner: &Arc<Mutex<Inner>>, ns: &str, key: &str) -> Result<Option<Value>> {
    Ok(lock(inner).namespace(ns)?.store.get(key))
}

pub(crate) fn set_value(
    inner: &Arc<Mutex<Inner>>,
    ns: &str,
    key: &str,
    value: Value,
) -> Result<()> {
    let dispatch = {
        let mut guard = lock(inner);
        guard.namespace_mut(ns)?.store.write(key, value)
    };
    tracing::trace!(
        namespace = %ns,
        key = %key,
        listeners = dispatch.len(),
        "change committed"
    );
    dispatch.deliver();
    Ok(())
}

pub(crate) fn delete_value(inner: &Arc<Mutex<Inner>>, ns: &str, key: &str) -> Result<()> {
    lock(inner).namespace_mut(ns)?.store.delete(key);
    Ok(())
}

pub(crate) fn data_snapshot(inner: &Arc<Mutex<Inner>>, ns: &str) -> Result<Map<String, Value>> {
    Ok(lock(inner).namespace(ns)?.store.snapshot())
}

pub(crate) fn run(inner: &Arc<Mutex<Inner>>, ns: &str, code: &str, params: Value) -> Result<()> {
    let dispatch = {
        let guard = lock(inner);
        Dispatch::new(guard.namespace(ns)?.commands.snapshot(code), params)
    };
    tracing::trace!(
        namespace = %ns,
        code = %code,
        listeners = dispatch.len(),
        "command dispatched"
    );
    dispatch.deliver();
    Ok(())
}

pub(crate) fn on(inner: &Arc<Mutex<Inner>>, ns: &str, key: &str, cb: Callback) -> Result<()> {
    lock(inner).namespace_mut(ns)?.store.subscribe(key, cb);
    Ok(())
}

/// Build a change listener from the current value of `key` and register
/// it, all under one lock acquisition.
///
/// `make` receives the value stored at subscription time, so no write
/// can land between the read and the registration. Returns the
/// registered callback for later removal.
pub(crate) fn on_with_current<F>(
    inner: &Arc<Mutex<Inner>>,
    ns: &str,
    key: &str,
    make: F,
) -> Result<Callback>
where
    F: FnOnce(Option<Value>) -> Callback,
{
    let mut guard = lock(inner);
    let state = guard.namespace_mut(ns)?;
    let cb = make(state.store.get(key));
    state.store.subscribe(key, cb.clone());
    Ok(cb)
}

pub(crate) fn off(inner: &Arc<Mutex<Inner>>, ns: &str, key: &str, cb: &Callback) -> Result<()> {
    lock(inner).namespace_mut(ns)?.store.unsubscribe(key, cb);
    Ok(())
}

pub(crate) fn listen(inner: &Arc<Mutex<Inner>>, ns: &str, code: &str, cb: Callback) -> Result<()> {
    lock(inner).namespace_mut(ns)?.commands.add(code, cb);
    Ok(())
}

pub(crate) fn remove(inner: &Arc<Mutex<Inner>>, ns: &str, code: &str, cb: &Callback) -> Result<()> {
    lock(inner).namespace_mut(ns)?.commands.remove(code, cb);
    Ok(())
}

pub(crate) fn once<F>(inner: &Arc<Mutex<Inner>>, ns: &str, code: &str, f: F) -> Result<()>
where
    F: FnOnce(Next),
{
    let armed = {
        let mut guard = lock(inner);
        guard.namespace_mut(ns)?.latches.try_arm(code)
    };
    if !armed {
        tracing::trace!(namespace = %ns, code = %code, "once latch still running, skipping");
        return Ok(());
    }
    // The callback runs outside the lock and receives the continuation
    // that ends this cycle. It may stash the handle and invoke it later.
    f(Next::new(Arc::downgrade(inner), ns, code));
    Ok(())
}

/// Process-local registry of namespaced reactive state and listeners.
///
/// Each namespace owns a reactive key/value store, a change-listener
/// registry fired on every write, a command-listener registry fired only
/// by explicit [`run`](ContextRegistry::run), and a once-latch table.
/// The reserved [`GLOBAL_NAMESPACE`] is created at construction, so bare
/// codes always resolve.
///
/// `Clone` is cheap and shares state: all clones address the same
/// namespaces.
///
/// # Examples
///
/// ```
/// use ctxbus::{ContextRegistry, callback};
/// use serde_json::json;
/// use std::sync::{Arc, Mutex};
///
/// # fn main() -> ctxbus::Result<()> {
/// let registry = ContextRegistry::new(json!(null))?;
/// let ui = registry.create_namespace("ui", json!({ "theme": "dark" }))?;
///
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let sink = Arc::clone(&seen);
/// ui.on("theme", callback(move |value| sink.lock().unwrap().push(value.clone())))?;
///
/// ui.set("theme", json!("light"))?;
/// assert_eq!(*seen.lock().unwrap(), vec![json!("light")]);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ContextRegistry {
    inner: Arc<Mutex<Inner>>,
}

impl ContextRegistry {
    /// Construct a registry, eagerly creating the `global` namespace
    /// with `global_seed` as its initial data.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the seed is neither a JSON
    /// object nor `null`.
    pub fn new(global_seed: Value) -> Result<Self> {
        let seed = as_seed(global_seed)?;
        let mut namespaces = HashMap::new();
        namespaces.insert(GLOBAL_NAMESPACE.to_owned(), NamespaceState::seeded(&seed));
        tracing::debug!(seed_keys = seed.len(), "context registry created");
        Ok(Self {
            inner: Arc::new(Mutex::new(Inner {
                namespaces,
                destroyed: false,
            })),
        })
    }

    pub(crate) fn inner(&self) -> &Arc<Mutex<Inner>> {
        &self.inner
    }

    /// Create a namespace seeded with a shallow copy of `initial`.
    ///
    /// Returns the namespace facade on success.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if `name` is not a valid identifier
    ///   or the seed is neither an object nor `null`.
    /// - [`Error::DuplicateNamespace`] if `name` already exists; the
    ///   existing namespace is left untouched.
    /// - [`Error::RegistryDestroyed`] after [`destroy`](Self::destroy).
    pub fn create_namespace(&self, name: &str, initial: Value) -> Result<CtxHandle> {
        validate_namespace(name)?;
        let seed = as_seed(initial)?;
        {
            let mut guard = lock(&self.inner);
            guard.ensure_alive()?;
            if guard.namespaces.contains_key(name) {
                return Err(Error::DuplicateNamespace(name.to_owned()));
            }
            guard
                .namespaces
                .insert(name.to_owned(), NamespaceState::seeded(&seed));
        }
        tracing::debug!(namespace = %name, "namespace created");
        Ok(CtxHandle::new(Arc::clone(&self.inner), name))
    }

    /// Get the facade for an existing namespace.
    ///
    /// # Errors
    ///
    /// [`Error::NamespaceNotFound`] if `name` was never created, or
    /// [`Error::RegistryDestroyed`] after teardown.
    pub fn context(&self, name: &str) -> Result<CtxHandle> {
        ensure(&self.inner, name)?;
        Ok(CtxHandle::new(Arc::clone(&self.inner), name))
    }

    /// Snapshot the current data of a namespace.
    ///
    /// Pass [`GLOBAL_NAMESPACE`] for the default namespace. The snapshot
    /// is a clone; mutation goes through [`set`](Self::set) or the
    /// facade, never through the returned map.
    pub fn get_data(&self, name: &str) -> Result<Map<String, Value>> {
        data_snapshot(&self.inner, name)
    }

    /// Discard every namespace, listener registry, and latch table.
    ///
    /// Idempotent. Every subsequent operation on this registry (or any
    /// clone, facade, or guard backed by it) fails with
    /// [`Error::RegistryDestroyed`].
    pub fn destroy(&self) {
        let mut guard = lock(&self.inner);
        if guard.destroyed {
            return;
        }
        guard.destroyed = true;
        guard.namespaces.clear();
        tracing::debug!("context registry destroyed");
    }

    /// Read the value stored under a qualified key, e.g. `"ui:theme"`.
    pub fn get(&self, qualified: &str) -> Result<Option<Value>> {
        let q = QualifiedCode::parse(qualified)?;
        get_value(&self.inner, q.namespace(), q.code())
    }

    /// Write a value under a qualified key, notifying its change
    /// listeners with the post-write value.
    pub fn set(&self, qualified: &str, value: Value) -> Result<()> {
        let q = QualifiedCode::parse(qualified)?;
        set_value(&self.inner, q.namespace(), q.code(), value)
    }

    /// Dispatch a command: invoke every command listener registered for
    /// the qualified code, in registration order, passing `params`.
    ///
    /// Change listeners are never invoked by `run`, even when the code
    /// collides with a data key. A no-op if no listener is registered.
    pub fn run(&self, qualified: &str, params: Value) -> Result<()> {
        let q = QualifiedCode::parse(qualified)?;
        run(&self.inner, q.namespace(), q.code(), params)
    }

    /// Register a change listener for a qualified data key.
    pub fn on(&self, qualified: &str, cb: Callback) -> Result<()> {
        let q = QualifiedCode::parse(qualified)?;
        on(&self.inner, q.namespace(), q.code(), cb)
    }

    /// Remove a change listener registered via [`on`](Self::on).
    ///
    /// Removes the first registration matching `cb` by identity; a
    /// no-op if none matches.
    pub fn off(&self, qualified: &str, cb: &Callback) -> Result<()> {
        let q = QualifiedCode::parse(qualified)?;
        off(&self.inner, q.namespace(), q.code(), cb)
    }

    /// Register a command listener for a qualified code.
    pub fn listen(&self, qualified: &str, cb: Callback) -> Result<()> {
        let q = QualifiedCode::parse(qualified)?;
        listen(&self.inner, q.namespace(), q.code(), cb)
    }

    /// Remove a command listener registered via [`listen`](Self::listen).
    pub fn remove(&self, qualified: &str, cb: &Callback) -> Result<()> {
        let q = QualifiedCode::parse(qualified)?;
        remove(&self.inner, q.namespace(), q.code(), cb)
    }

    /// Run `f` at most once until its continuation re-arms the latch.
    ///
    /// If the latch for the qualified code is already running, this is
    /// a no-op and `f` is dropped uninvoked. Otherwise the latch is
    /// marked running and `f` receives a [`Next`] continuation; invoking
    /// it ends the cycle so a later `once` call fires again.
    pub fn once<F>(&self, qualified: &str, f: F) -> Result<()>
    where
        F: FnOnce(Next),
    {
        let q = QualifiedCode::parse(qualified)?;
        once(&self.inner, q.namespace(), q.code(), f)
    }
}

// Manual `Debug`: the interesting state lives behind the mutex and
// includes type-erased callbacks.
impl std::fmt::Debug for ContextRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextRegistry").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::callback;
    use serde_json::json;

    #[test]
    fn new_creates_global_namespace() {
        let registry = ContextRegistry::new(json!({ "booted": true })).unwrap();
        let data = registry.get_data(GLOBAL_NAMESPACE).unwrap();
        assert_eq!(data.get("booted"), Some(&json!(true)));
    }

    #[test]
    fn null_seed_means_empty_global() {
        let registry = ContextRegistry::new(json!(null)).unwrap();
        assert!(registry.get_data(GLOBAL_NAMESPACE).unwrap().is_empty());
    }

    #[test]
    fn non_object_seed_is_rejected() {
        let err = ContextRegistry::new(json!(42)).expect_err("array/number seeds must fail");
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn create_namespace_rejects_duplicates() {
        let registry = ContextRegistry::new(json!(null)).unwrap();
        registry.create_namespace("ui", json!({ "a": 1 })).unwrap();

        let err = registry
            .create_namespace("ui", json!({ "b": 2 }))
            .expect_err("duplicate must fail");
        assert!(matches!(err, Error::DuplicateNamespace(_)));

        // Existing data is untouched by the failed attempt.
        let data = registry.get_data("ui").unwrap();
        assert_eq!(data.get("a"), Some(&json!(1)));
        assert_eq!(data.get("b"), None);
    }

    #[test]
    fn create_namespace_rejects_invalid_identifiers() {
        let registry = ContextRegistry::new(json!(null)).unwrap();
        let err = registry
            .create_namespace("my ns", json!(null))
            .expect_err("identifier with a space must fail");
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn creating_global_again_is_a_duplicate() {
        let registry = ContextRegistry::new(json!(null)).unwrap();
        let err = registry
            .create_namespace(GLOBAL_NAMESPACE, json!(null))
            .expect_err("global is created at construction");
        assert!(matches!(err, Error::DuplicateNamespace(_)));
    }

    #[test]
    fn context_for_unknown_namespace_fails() {
        let registry = ContextRegistry::new(json!(null)).unwrap();
        let err = registry.context("nope").expect_err("should fail");
        assert!(matches!(err, Error::NamespaceNotFound(_)));
    }

    #[test]
    fn bare_codes_address_global() {
        let registry = ContextRegistry::new(json!(null)).unwrap();
        registry.set("theme", json!("dark")).unwrap();
        assert_eq!(registry.get("global:theme").unwrap(), Some(json!("dark")));
    }

    #[test]
    fn qualified_ops_reach_the_addressed_namespace() {
        let registry = ContextRegistry::new(json!(null)).unwrap();
        registry.create_namespace("ui", json!(null)).unwrap();
        registry.set("ui:theme", json!("dark")).unwrap();

        assert_eq!(registry.get("ui:theme").unwrap(), Some(json!("dark")));
        assert_eq!(registry.get("theme").unwrap(), None, "global is untouched");
    }

    #[test]
    fn set_to_unknown_namespace_fails() {
        let registry = ContextRegistry::new(json!(null)).unwrap();
        let err = registry.set("nope:key", json!(1)).expect_err("should fail");
        assert!(matches!(err, Error::NamespaceNotFound(_)));
    }

    #[test]
    fn destroy_fails_every_subsequent_operation() {
        let registry = ContextRegistry::new(json!(null)).unwrap();
        let handle = registry.context(GLOBAL_NAMESPACE).unwrap();
        registry.destroy();

        let cb = callback(|_| {});
        assert!(matches!(
            registry.get_data(GLOBAL_NAMESPACE),
            Err(Error::RegistryDestroyed)
        ));
        assert!(matches!(
            registry.create_namespace("ui", json!(null)),
            Err(Error::RegistryDestroyed)
        ));
        assert!(matches!(registry.context(GLOBAL_NAMESPACE), Err(Error::RegistryDestroyed)));
        assert!(matches!(registry.get("x"), Err(Error::RegistryDestroyed)));
        assert!(matches!(registry.set("x", json!(1)), Err(Error::RegistryDestroyed)));
        assert!(matches!(registry.run("x", json!(null)), Err(Error::RegistryDestroyed)));
        assert!(matches!(registry.on("x", cb.clone()), Err(Error::RegistryDestroyed)));
        assert!(matches!(registry.off("x", &cb), Err(Error::RegistryDestroyed)));
        assert!(matches!(registry.listen("x", cb.clone()), Err(Error::RegistryDestroyed)));
        assert!(matches!(registry.remove("x", &cb), Err(Error::RegistryDestroyed)));
        assert!(matches!(
            registry.once("x", |_next| {}),
            Err(Error::RegistryDestroyed)
        ));

        // Facades handed out earlier are backed by the same state.
        assert!(matches!(handle.get("x"), Err(Error::RegistryDestroyed)));
    }

    #[test]
    fn destroy_is_idempotent() {
        let registry = ContextRegistry::new(json!(null)).unwrap();
        registry.destroy();
        registry.destroy();
    }

    #[test]
    fn clones_share_state() {
        let registry = ContextRegistry::new(json!(null)).unwrap();
        let clone = registry.clone();
        clone.create_namespace("ui", json!({ "n": 1 })).unwrap();
        assert_eq!(registry.get("ui:n").unwrap(), Some(json!(1)));
    }

    #[test]
    fn run_with_no_listeners_is_a_noop() {
        let registry = ContextRegistry::new(json!(null)).unwrap();
        registry.run("never-listened", json!(null)).unwrap();
    }

    #[test]
    fn on_with_current_reads_and_subscribes_in_one_step() {
        let registry = ContextRegistry::new(json!(null)).unwrap();
        registry.set("k", json!(1)).unwrap();

        let seen_current = Arc::new(Mutex::new(None));
        let seen_writes = Arc::new(Mutex::new(Vec::new()));

        let current_sink = Arc::clone(&seen_current);
        let write_sink = Arc::clone(&seen_writes);
        on_with_current(registry.inner(), GLOBAL_NAMESPACE, "k", |current| {
            *current_sink.lock().unwrap() = current;
            callback(move |value| write_sink.lock().unwrap().push(value.clone()))
        })
        .unwrap();

        assert_eq!(
            *seen_current.lock().unwrap(),
            Some(json!(1)),
            "the factory sees the value stored at subscription time"
        );

        registry.set("k", json!(2)).unwrap();
        assert_eq!(*seen_writes.lock().unwrap(), vec![json!(2)]);
    }

    #[test]
    fn on_with_current_unknown_namespace_fails() {
        let registry = ContextRegistry::new(json!(null)).unwrap();
        let err = match on_with_current(registry.inner(), "ghost", "k", |_| callback(|_| {})) {
            Ok(_) => panic!("should fail before the factory runs"),
            Err(err) => err,
        };
        assert!(matches!(err, Error::NamespaceNotFound(_)));
    }
}
