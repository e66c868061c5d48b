//! Timer collaborator contract and a table-backed implementation.
//!
//! The timer subsystem maintains its own pending-timer identifiers,
//! independent of the callback registry. The bridge drives it at two
//! points: due immediates run before every queue drain, and timer ids
//! resolve to their bodies when native batches `callTimers`.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::Result;

/// Shared handle to the timer collaborator.
pub type TimerHandle = Rc<RefCell<dyn TimerHub>>;

/// A timer body. Shared so the hub keeps its registration while the
/// dispatcher runs the body outside the hub borrow.
pub type TimerCallback = Rc<RefCell<dyn FnMut() -> Result<()>>>;

/// Contract the bridge consumes from the timer subsystem.
pub trait TimerHub {
    /// Run and clear any zero-delay pending timers. Must not fail.
    fn run_due_immediates(&mut self);

    /// Map a timer identifier to its registered body.
    fn resolve(&mut self, timer_id: u64) -> Option<TimerCallback>;
}

/// Table-backed timer hub: id allocator, id-to-body map, FIFO immediates.
///
/// Immediate bodies run while the hub is exclusively borrowed; they
/// interact with the bridge only through the queue handle.
pub struct TimerTable {
    bodies: HashMap<u64, TimerCallback>,
    immediates: Vec<u64>,
    next_id: u64,
}

impl TimerTable {
    #[must_use]
    pub fn new() -> Self {
        Self {
            bodies: HashMap::new(),
            immediates: Vec::new(),
            next_id: 1,
        }
    }

    /// Register a timer body and allocate its id.
    pub fn register(&mut self, body: TimerCallback) -> u64 {
        let timer_id = self.next_id;
        self.next_id = self.next_id.saturating_add(1);
        tracing::trace!(
            target: "bridge.timers",
            event = "timers.register",
            timer_id,
            "timer body registered"
        );
        self.bodies.insert(timer_id, body);
        timer_id
    }

    /// Register a zero-delay body, due at the next immediates run.
    pub fn register_immediate(&mut self, body: TimerCallback) -> u64 {
        let timer_id = self.register(body);
        self.immediates.push(timer_id);
        timer_id
    }

    /// Drop a registration. Pending immediates for the id no longer fire.
    pub fn clear(&mut self, timer_id: u64) {
        self.bodies.remove(&timer_id);
        self.immediates.retain(|pending| *pending != timer_id);
    }

    /// Number of registered bodies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }
}

impl Default for TimerTable {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerHub for TimerTable {
    fn run_due_immediates(&mut self) {
        let due = std::mem::take(&mut self.immediates);
        for timer_id in due {
            let Some(body) = self.bodies.remove(&timer_id) else {
                continue;
            };
            // The contract cannot fail, so faults stop at the log.
            let mut body_ref = body.borrow_mut();
            let outcome = (&mut *body_ref)();
            drop(body_ref);
            if let Err(fault) = outcome {
                tracing::error!(
                    target: "bridge.timers",
                    event = "timers.immediate_fault",
                    timer_id,
                    error = %fault,
                    "immediate timer body failed"
                );
            }
        }
    }

    fn resolve(&mut self, timer_id: u64) -> Option<TimerCallback> {
        self.bodies.get(&timer_id).map(Rc::clone)
    }
}
