//! Once-latch: a per-(namespace, code) "run once until re-armed"
//! primitive.
//!
//! Each pair moves through three states: unset, running, and
//! waiting-next. Arming an unset or waiting-next pair runs the callback
//! and leaves the pair running; further arm attempts are no-ops until
//! the callback's continuation ([`Next::rearm`]) moves it to
//! waiting-next. There is no other way out of the running state.

use std::collections::HashMap;
use std::sync::{Mutex, Weak};

use crate::registry::{Inner, lock};

/// Latch state for one code. Absent from the table means unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LatchState {
    /// A callback cycle is in flight; arm attempts are no-ops.
    Running,
    /// The continuation was invoked; the next arm attempt starts a new
    /// cycle. Equivalent to unset for arming purposes.
    WaitingNext,
}

/// Per-namespace table of latch states, keyed by code.
#[derive(Default)]
pub(crate) struct LatchTable {
    states: HashMap<String, LatchState>,
}

impl LatchTable {
    /// Try to start a cycle for `code`.
    ///
    /// Returns `false` while a previous cycle is still running;
    /// otherwise marks the pair running and returns `true`.
    pub(crate) fn try_arm(&mut self, code: &str) -> bool {
        if self.states.get(code) == Some(&LatchState::Running) {
            return false;
        }
        self.states.insert(code.to_owned(), LatchState::Running);
        true
    }

    /// End the current cycle for `code`, allowing the next arm attempt
    /// to fire again.
    pub(crate) fn release(&mut self, code: &str) {
        self.states.insert(code.to_owned(), LatchState::WaitingNext);
    }
}

/// Continuation handed to a `once` callback.
///
/// Invoking [`rearm`](Next::rearm) ends the running cycle for the
/// (namespace, code) pair that armed the latch. The handle may be moved
/// into other threads or stored and invoked long after the `once` call
/// returned; until it is invoked, repeated `once` calls for the same
/// pair do nothing.
///
/// The handle holds a weak reference to its registry. Re-arming after
/// the registry was destroyed or dropped is a silent no-op, since a
/// dead latch can never fire again anyway.
pub struct Next {
    registry: Weak<Mutex<Inner>>,
    namespace: String,
    code: String,
}

impl Next {
    pub(crate) fn new(registry: Weak<Mutex<Inner>>, namespace: &str, code: &str) -> Self {
        Self {
            registry,
            namespace: namespace.to_owned(),
            code: code.to_owned(),
        }
    }

    /// End the running cycle, so the next `once` call for this pair
    /// invokes its callback again.
    pub fn rearm(self) {
        let Some(inner) = self.registry.upgrade() else {
            tracing::debug!(
                namespace = %self.namespace,
                code = %self.code,
                "latch continuation invoked after registry was dropped"
            );
            return;
        };
        let mut guard = lock(&inner);
        if guard.destroyed {
            return;
        }
        if let Some(state) = guard.namespaces.get_mut(&self.namespace) {
            state.latches.release(&self.code);
        }
    }
}

impl std::fmt::Debug for Next {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Next")
            .field("namespace", &self.namespace)
            .field("code", &self.code)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_code_arms() {
        let mut table = LatchTable::default();
        assert!(table.try_arm("save"));
    }

    #[test]
    fn running_code_refuses_to_arm() {
        let mut table = LatchTable::default();
        assert!(table.try_arm("save"));
        assert!(!table.try_arm("save"), "second arm while running must refuse");
    }

    #[test]
    fn release_allows_a_new_cycle() {
        let mut table = LatchTable::default();
        assert!(table.try_arm("save"));
        table.release("save");
        assert!(table.try_arm("save"), "waiting-next behaves as unset");
    }

    #[test]
    fn codes_are_independent() {
        let mut table = LatchTable::default();
        assert!(table.try_arm("save"));
        assert!(table.try_arm("load"), "a running latch must not block other codes");
    }

    #[test]
    fn rearm_after_registry_dropped_is_a_noop() {
        let next = Next::new(Weak::new(), "ui", "save");
        next.rearm();
    }
}
