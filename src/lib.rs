//! Namespace-partitioned reactive state container with dual-channel
//! event dispatch.
//!
//! A [`ContextRegistry`] owns isolated namespaces, each holding a
//! key/value store and two independent listener channels:
//!
//! - the **change channel** fires automatically whenever a data key is
//!   written ([`on`](ContextRegistry::on) /
//!   [`off`](ContextRegistry::off)), delivering the post-write value;
//! - the **command channel** fires only on explicit dispatch
//!   ([`run`](ContextRegistry::run), subscribed via
//!   [`listen`](ContextRegistry::listen) /
//!   [`remove`](ContextRegistry::remove)).
//!
//! Codes are addressed as `namespace:code`; bare codes resolve to the
//! reserved [`GLOBAL_NAMESPACE`], which exists from construction.
//! Dispatch is synchronous and in-process: every listener runs to
//! completion inside the triggering call, in registration order, with
//! no queuing and no isolation between listeners.
//!
//! On top of the two channels sit a [`once`](ContextRegistry::once)
//! latch ("fire at most once until explicitly re-armed" via [`Next`]),
//! dotted-path [`watch`](ContextRegistry::watch) subscriptions with
//! drop-guard teardown, and command [`Emitter`]s.
//!
//! ```
//! use ctxbus::{ContextRegistry, callback};
//! use serde_json::json;
//! use std::sync::{Arc, Mutex};
//!
//! # fn main() -> ctxbus::Result<()> {
//! let registry = ContextRegistry::new(json!({ "booted": true }))?;
//! let ui = registry.create_namespace("ui", json!({ "theme": "dark" }))?;
//!
//! let changes = Arc::new(Mutex::new(Vec::new()));
//! let sink = Arc::clone(&changes);
//! ui.on("theme", callback(move |value| sink.lock().unwrap().push(value.clone())))?;
//!
//! // Writes notify change listeners with the post-write value...
//! registry.set("ui:theme", json!("light"))?;
//! assert_eq!(*changes.lock().unwrap(), vec![json!("light")]);
//!
//! // ...while commands are a separate, explicit channel.
//! registry.run("ui:theme", json!(null))?; // no command listeners: no-op
//!
//! registry.destroy();
//! assert!(registry.get("ui:theme").is_err());
//! # Ok(())
//! # }
//! ```

mod address;
pub use address::{GLOBAL_NAMESPACE, QualifiedCode};
mod context;
pub use context::CtxHandle;
mod dispatch;
pub use dispatch::{Callback, callback};
mod emitter;
pub use emitter::Emitter;
mod error;
pub use error::{Error, Result};
mod latch;
pub use latch::Next;
mod path;
pub use path::{QualifiedPath, project};
mod registry;
pub use registry::ContextRegistry;
mod store;
mod watch;
pub use watch::WatchGuard;
