//! Callback registry: correlation of async-call continuations by id.
//!
//! Identifiers are allocated in even/odd pairs for one logical async call
//! (conventionally the failure/success continuations). Invoking either
//! member retires the whole pair before the call runs, unless one of the
//! members is protected; recurring callbacks stay registered across
//! invocations. A retired or never-registered id is a silent no-op.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::error::{Error, Result};

/// Callback identifier. Bit 0 distinguishes a pair's two roles.
pub type CallbackId = u64;

/// A registered continuation. May synchronously enqueue further outgoing
/// calls through a captured [`QueueHandle`](crate::queue::QueueHandle).
pub type Callback = Box<dyn FnMut(&[Value]) -> Result<()>>;

/// Pairing partner of `id`: the same id with bit 0 flipped.
#[must_use]
pub const fn pair_of(id: CallbackId) -> CallbackId {
    id ^ 1
}

/// Registry of pending callbacks plus the protected (non-retiring) id set.
///
/// Entries are inserted by the collaborator that issues the async call and
/// removed exactly once, right before their first invocation. The registry
/// never allocates ids; the queue's call counter is the correlation source.
#[derive(Default)]
pub struct CallbackRegistry {
    callbacks: HashMap<CallbackId, Callback>,
    protected: HashSet<CallbackId>,
}

impl CallbackRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a callback under `id`.
    pub fn register(&mut self, id: CallbackId, callback: Callback) {
        tracing::trace!(
            target: "bridge.callbacks",
            event = "callbacks.register",
            id,
            pending = self.callbacks.len() + 1,
            "callback registered"
        );
        self.callbacks.insert(id, callback);
    }

    /// Mark `id` as protected: its pair survives invocation.
    pub fn protect(&mut self, id: CallbackId) {
        self.protected.insert(id);
    }

    /// Remove protection from `id`.
    pub fn unprotect(&mut self, id: CallbackId) {
        self.protected.remove(&id);
    }

    #[must_use]
    pub fn contains(&self, id: CallbackId) -> bool {
        self.callbacks.contains_key(&id)
    }

    #[must_use]
    pub fn is_protected(&self, id: CallbackId) -> bool {
        self.protected.contains(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Invoke the callback registered for `id`.
    ///
    /// Missing ids return silently: retirement happens before invocation,
    /// so a second invoke after the pair retires is indistinguishable from
    /// an id that was never registered. A leading `Null` argument is
    /// dropped when more arguments follow (the error-first placeholder; a
    /// lone `Null` is a real argument and stays). A failing callback
    /// surfaces to the caller as a callback fault.
    pub fn invoke(&mut self, id: CallbackId, mut args: Vec<Value>) -> Result<()> {
        if !self.callbacks.contains_key(&id) {
            tracing::trace!(
                target: "bridge.callbacks",
                event = "callbacks.miss",
                id,
                "invoke on unregistered callback id"
            );
            return Ok(());
        }

        let retired = if self.is_protected(id & !1) || self.is_protected(id | 1) {
            None
        } else {
            let taken = self.callbacks.remove(&id);
            self.callbacks.remove(&pair_of(id));
            taken
        };

        if args.len() > 1 && args[0].is_null() {
            args.remove(0);
        }

        tracing::trace!(
            target: "bridge.callbacks",
            event = "callbacks.invoke",
            id,
            retired = retired.is_some(),
            args = args.len(),
            "invoking callback"
        );

        let outcome = match retired {
            Some(mut callback) => callback(&args),
            // Protected: the callback stays registered and runs in place.
            None => match self.callbacks.get_mut(&id) {
                Some(callback) => callback(&args),
                None => Ok(()),
            },
        };
        outcome.map_err(|fault| Error::callback(id, fault.to_string()))
    }
}
