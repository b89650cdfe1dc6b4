//! Command emitters: a callable + subscribable pair over the command
//! channel.
//!
//! An emitter binds one qualified code so callers can fire it from
//! arbitrary code without touching the addressing rule, and optionally
//! carries a command listener whose lifetime matches the emitter's.

use std::sync::{Mutex, Weak};

use serde_json::Value;

use crate::address::QualifiedCode;
use crate::dispatch::Callback;
use crate::error::{Error, Result};
use crate::registry::{self, ContextRegistry, Inner};

/// A fire-and-forget handle for one command code.
///
/// Created by [`ContextRegistry::emitter`] or
/// [`ContextRegistry::emitter_with`]. If the emitter carries a
/// subscription, dropping it removes the listener; unsubscription after
/// registry teardown is harmless.
#[must_use = "dropping an emitter removes its subscription"]
pub struct Emitter {
    inner: Weak<Mutex<Inner>>,
    namespace: String,
    code: String,
    subscription: Option<Callback>,
}

impl Emitter {
    /// The namespace this emitter dispatches into.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The command code this emitter fires.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Dispatch the command with `params`.
    ///
    /// Invokes every currently registered command listener in
    /// registration order; a no-op when none are registered.
    ///
    /// # Errors
    ///
    /// [`Error::RegistryDestroyed`] after teardown, or
    /// [`Error::NamespaceNotFound`] if the namespace was torn down out
    /// from under the emitter.
    pub fn fire(&self, params: Value) -> Result<()> {
        let Some(inner) = self.inner.upgrade() else {
            return Err(Error::RegistryDestroyed);
        };
        registry::run(&inner, &self.namespace, &self.code, params)
    }
}

impl Drop for Emitter {
    fn drop(&mut self) {
        let Some(cb) = self.subscription.take() else {
            return;
        };
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        let _ = registry::remove(&inner, &self.namespace, &self.code, &cb);
    }
}

impl std::fmt::Debug for Emitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emitter")
            .field("namespace", &self.namespace)
            .field("code", &self.code)
            .field("subscribed", &self.subscription.is_some())
            .finish()
    }
}

impl ContextRegistry {
    /// Create an emitter for a qualified command code.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] for a malformed code,
    /// [`Error::NamespaceNotFound`] / [`Error::RegistryDestroyed`] from
    /// addressing.
    ///
    /// [`Error::InvalidArgument`]: crate::Error::InvalidArgument
    /// [`Error::NamespaceNotFound`]: crate::Error::NamespaceNotFound
    /// [`Error::RegistryDestroyed`]: crate::Error::RegistryDestroyed
    pub fn emitter(&self, qualified: &str) -> Result<Emitter> {
        let q = QualifiedCode::parse(qualified)?;
        registry::ensure(self.inner(), q.namespace())?;
        Ok(Emitter {
            inner: std::sync::Arc::downgrade(self.inner()),
            namespace: q.namespace().to_owned(),
            code: q.code().to_owned(),
            subscription: None,
        })
    }

    /// Create an emitter that also listens on its own code.
    ///
    /// `cb` is registered as a command listener immediately and removed
    /// when the emitter drops. The emitter's own
    /// [`fire`](Emitter::fire) reaches `cb` like any other listener.
    ///
    /// # Errors
    ///
    /// Same as [`emitter`](Self::emitter).
    pub fn emitter_with(&self, qualified: &str, cb: Callback) -> Result<Emitter> {
        let q = QualifiedCode::parse(qualified)?;
        registry::listen(self.inner(), q.namespace(), q.code(), cb.clone())?;
        Ok(Emitter {
            inner: std::sync::Arc::downgrade(self.inner()),
            namespace: q.namespace().to_owned(),
            code: q.code().to_owned(),
            subscription: Some(cb),
        })
    }
}
