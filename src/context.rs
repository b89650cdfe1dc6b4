//! Per-namespace facade: a thin capability restriction over the
//! registry, bound to one namespace.

use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::dispatch::Callback;
use crate::error::{Error, Result};
use crate::latch::Next;
use crate::registry::{self, Inner};

/// A read/write view scoped to one namespace.
///
/// Returned by [`ContextRegistry::create_namespace`] and
/// [`ContextRegistry::context`]. Codes passed to facade methods are
/// *bare*: the facade qualifies them with its bound namespace, so
/// holders never deal with the addressing rule. The facade owns no
/// state of its own: every clone is a view onto the same namespace, and
/// mutations through any clone are visible to all.
///
/// [`ContextRegistry::create_namespace`]: crate::ContextRegistry::create_namespace
/// [`ContextRegistry::context`]: crate::ContextRegistry::context
#[derive(Clone)]
pub struct CtxHandle {
    inner: Arc<Mutex<Inner>>,
    namespace: String,
}

impl CtxHandle {
    pub(crate) fn new(inner: Arc<Mutex<Inner>>, namespace: &str) -> Self {
        Self {
            inner,
            namespace: namespace.to_owned(),
        }
    }

    /// The namespace this facade is bound to.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Snapshot the namespace's current data.
    pub fn data(&self) -> Result<Map<String, Value>> {
        registry::data_snapshot(&self.inner, &self.namespace)
    }

    /// Read the value stored under `code`. No side effects.
    pub fn get(&self, code: &str) -> Result<Option<Value>> {
        registry::get_value(&self.inner, &self.namespace, code)
    }

    /// Read the value stored under `code`, deserialized into `T`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if the stored value does not
    /// deserialize into `T`.
    pub fn get_as<T: DeserializeOwned>(&self, code: &str) -> Result<Option<T>> {
        match self.get(code)? {
            None => Ok(None),
            Some(value) => serde_json::from_value(value).map(Some).map_err(|e| {
                Error::InvalidArgument(format!("value under {code:?} does not fit: {e}"))
            }),
        }
    }

    /// Write a value under `code`, notifying its change listeners with
    /// the post-write value.
    pub fn set(&self, code: &str, value: Value) -> Result<()> {
        registry::set_value(&self.inner, &self.namespace, code, value)
    }

    /// Serialize `value` and write it under `code`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if `value` fails to serialize.
    pub fn set_as<T: Serialize>(&self, code: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value).map_err(|e| {
            Error::InvalidArgument(format!("value for {code:?} failed to serialize: {e}"))
        })?;
        self.set(code, value)
    }

    /// Remove `code` from the namespace data.
    ///
    /// Deletion fires no change notification; only writes do.
    pub fn delete(&self, code: &str) -> Result<()> {
        registry::delete_value(&self.inner, &self.namespace, code)
    }

    /// Dispatch a command to this namespace's command listeners.
    pub fn run(&self, code: &str, params: Value) -> Result<()> {
        registry::run(&self.inner, &self.namespace, code, params)
    }

    /// Register a change listener for the data key `code`.
    pub fn on(&self, code: &str, cb: Callback) -> Result<()> {
        registry::on(&self.inner, &self.namespace, code, cb)
    }

    /// Remove a change listener registered via [`on`](Self::on).
    pub fn off(&self, code: &str, cb: &Callback) -> Result<()> {
        registry::off(&self.inner, &self.namespace, code, cb)
    }

    /// Register a command listener for `code`.
    pub fn listen(&self, code: &str, cb: Callback) -> Result<()> {
        registry::listen(&self.inner, &self.namespace, code, cb)
    }

    /// Remove a command listener registered via [`listen`](Self::listen).
    pub fn remove(&self, code: &str, cb: &Callback) -> Result<()> {
        registry::remove(&self.inner, &self.namespace, code, cb)
    }

    /// Run `f` at most once until its continuation re-arms the latch
    /// for `code`. See [`ContextRegistry::once`](crate::ContextRegistry::once).
    pub fn once<F>(&self, code: &str, f: F) -> Result<()>
    where
        F: FnOnce(Next),
    {
        registry::once(&self.inner, &self.namespace, code, f)
    }
}

impl std::fmt::Debug for CtxHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CtxHandle")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::callback;
    use crate::registry::ContextRegistry;
    use serde_json::json;
    use std::sync::Mutex as StdMutex;

    fn registry_with_ui() -> (ContextRegistry, CtxHandle) {
        let registry = ContextRegistry::new(json!(null)).unwrap();
        let ui = registry
            .create_namespace("ui", json!({ "theme": "dark" }))
            .unwrap();
        (registry, ui)
    }

    #[test]
    fn facade_reads_seed_data() {
        let (_registry, ui) = registry_with_ui();
        assert_eq!(ui.get("theme").unwrap(), Some(json!("dark")));
        assert_eq!(ui.data().unwrap().get("theme"), Some(&json!("dark")));
    }

    #[test]
    fn facade_set_is_visible_through_registry() {
        let (registry, ui) = registry_with_ui();
        ui.set("theme", json!("light")).unwrap();
        assert_eq!(registry.get("ui:theme").unwrap(), Some(json!("light")));
    }

    #[test]
    fn facade_clones_share_the_namespace() {
        let (_registry, ui) = registry_with_ui();
        let view = ui.clone();
        ui.set("theme", json!("light")).unwrap();
        assert_eq!(view.get("theme").unwrap(), Some(json!("light")));
    }

    #[test]
    fn facade_listeners_fire_on_registry_writes() {
        let (registry, ui) = registry_with_ui();
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        ui.on(
            "theme",
            callback(move |value| sink.lock().unwrap().push(value.clone())),
        )
        .unwrap();

        registry.set("ui:theme", json!("light")).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![json!("light")]);
    }

    #[test]
    fn delete_is_silent_and_removes_the_key() {
        let (_registry, ui) = registry_with_ui();
        ui.on("theme", callback(|_| panic!("delete must not notify")))
            .unwrap();
        ui.delete("theme").unwrap();
        assert_eq!(ui.get("theme").unwrap(), None);
    }

    #[test]
    fn typed_accessors_roundtrip() {
        #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
        struct Prefs {
            compact: bool,
            columns: u8,
        }

        let (_registry, ui) = registry_with_ui();
        let prefs = Prefs {
            compact: true,
            columns: 3,
        };
        ui.set_as("prefs", &prefs).unwrap();
        assert_eq!(ui.get_as::<Prefs>("prefs").unwrap(), Some(prefs));
    }

    #[test]
    fn get_as_mismatch_is_invalid_argument() {
        let (_registry, ui) = registry_with_ui();
        let err = ui
            .get_as::<u64>("theme")
            .expect_err("a string does not deserialize into u64");
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn get_as_missing_key_is_none() {
        let (_registry, ui) = registry_with_ui();
        assert_eq!(ui.get_as::<u64>("absent").unwrap(), None);
    }

    #[test]
    fn once_runs_then_blocks_until_rearmed() {
        let (_registry, ui) = registry_with_ui();
        let runs = Arc::new(StdMutex::new(0));
        let stashed: Arc<StdMutex<Option<Next>>> = Arc::new(StdMutex::new(None));

        let run_once = |ui: &CtxHandle| {
            let runs = Arc::clone(&runs);
            let stashed = Arc::clone(&stashed);
            ui.once("save", move |next| {
                *runs.lock().unwrap() += 1;
                *stashed.lock().unwrap() = Some(next);
            })
            .unwrap();
        };

        run_once(&ui);
        run_once(&ui);
        assert_eq!(*runs.lock().unwrap(), 1, "second once while running is a no-op");

        let next = stashed.lock().unwrap().take().expect("continuation stashed");
        next.rearm();

        run_once(&ui);
        assert_eq!(*runs.lock().unwrap(), 2, "after rearm the callback fires again");
    }
}
