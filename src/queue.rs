//! Outgoing call queue: the buffer of calls destined for native code.
//!
//! The queue is owned by the bridge facade; collaborators append through a
//! shared [`QueueHandle`]. A drain captures the three aligned sequences and
//! resets them in one step, carrying the call counter forward into the
//! fresh buffer. Because the bridge runs one logical thread of control, no
//! enqueue can interleave between the capture and the reset.

use std::cell::RefCell;
use std::rc::Rc;

use serde::ser::{Serialize, SerializeTuple, Serializer};
use serde_json::Value;

/// Shared enqueue capability handed to callbacks, module methods, and timer
/// bodies. Single-threaded cooperative sharing.
pub type QueueHandle = Rc<RefCell<OutgoingQueue>>;

/// One drained batch of outgoing calls, in enqueue order.
///
/// Call *i* is `(modules[i], methods[i], args[i])`. Serializes as the wire
/// 4-tuple `[moduleNames, methodNames, argsList, callId]`; the empty-signal
/// is `Option::<QueueSnapshot>::None`, which serializes to `null`.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueSnapshot {
    pub modules: Vec<String>,
    pub methods: Vec<String>,
    pub args: Vec<Vec<Value>>,
    pub call_id: u64,
}

impl QueueSnapshot {
    /// Number of calls in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl Serialize for QueueSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(4)?;
        tuple.serialize_element(&self.modules)?;
        tuple.serialize_element(&self.methods)?;
        tuple.serialize_element(&self.args)?;
        tuple.serialize_element(&self.call_id)?;
        tuple.end()
    }
}

/// Buffer of calls destined for native code plus the process-wide call
/// counter used to correlate future callback pairs.
///
/// The counter is monotonically non-decreasing for the lifetime of the
/// bridge and survives drains; only the three sequences reset.
#[derive(Debug, Default)]
pub struct OutgoingQueue {
    modules: Vec<String>,
    methods: Vec<String>,
    args: Vec<Vec<Value>>,
    call_id: u64,
}

impl OutgoingQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one aligned entry and allocate its call id.
    ///
    /// The returned id is the correlation base for any callback pair the
    /// issuing collaborator registers for this call. Never fails.
    pub fn enqueue(
        &mut self,
        module: impl Into<String>,
        method: impl Into<String>,
        args: Vec<Value>,
    ) -> u64 {
        let module = module.into();
        let method = method.into();
        let call_id = self.call_id;
        self.call_id = self.call_id.saturating_add(1);
        tracing::debug!(
            target: "bridge.queue",
            event = "queue.enqueue",
            module = %module,
            method = %method,
            call_id,
            depth = self.modules.len() + 1,
            "call buffered for native"
        );
        self.modules.push(module);
        self.methods.push(method);
        self.args.push(args);
        call_id
    }

    /// Capture and reset the buffered sequences.
    ///
    /// Returns `None` when nothing was buffered, so callers can tell
    /// "nothing to send" apart from an empty batch without a round trip.
    /// The call counter carries forward unchanged.
    pub fn drain(&mut self) -> Option<QueueSnapshot> {
        debug_assert_eq!(self.modules.len(), self.methods.len());
        debug_assert_eq!(self.modules.len(), self.args.len());
        if self.modules.is_empty() {
            return None;
        }
        let snapshot = QueueSnapshot {
            modules: std::mem::take(&mut self.modules),
            methods: std::mem::take(&mut self.methods),
            args: std::mem::take(&mut self.args),
            call_id: self.call_id,
        };
        tracing::debug!(
            target: "bridge.queue",
            event = "queue.drain",
            calls = snapshot.len(),
            call_id = snapshot.call_id,
            "queue drained"
        );
        Some(snapshot)
    }

    /// Number of buffered calls.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// The id the next enqueue will allocate.
    #[must_use]
    pub fn next_call_id(&self) -> u64 {
        self.call_id
    }
}
