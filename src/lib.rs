//! Batched queue and callback-correlation core for a native/script bridge.
//!
//! Native code drives one [`BatchedBridge`] through three entry points:
//! - [`BatchedBridge::call_function_return_flushed_queue`]: execute a
//!   named module member in the script environment (or a batched timer
//!   run), then pick up the outgoing calls it produced;
//! - [`BatchedBridge::invoke_callback_and_return_flushed_queue`]: resolve
//!   a previously issued async callback by identifier, then pick up;
//! - [`BatchedBridge::flushed_queue`]: pick up pending outgoing calls
//!   without invoking anything.
//!
//! Side-effect calls the script environment wants to send back accumulate
//! in an [`OutgoingQueue`] and return as one batched payload (the wire
//! 4-tuple, or `None` for "nothing to send"), while async continuations
//! are tracked by even/odd paired identifiers in a [`CallbackRegistry`]
//! until native code resolves them.
//!
//! The script environment's module registry, the timer subsystem, and the
//! exception sink are injected collaborators ([`ModuleRegistry`],
//! [`TimerHub`], [`ExceptionSink`]); this crate owns only the in-process
//! protocol state and dispatch logic. Execution is one logical thread of
//! control per bridge instance: collaborators share state through
//! `Rc<RefCell<..>>` handles, and no operation suspends.

#![forbid(unsafe_code)]
#![allow(
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::module_name_repetitions
)]

pub mod bridge;
pub mod callbacks;
pub mod dispatch;
pub mod error;
pub mod queue;
pub mod timers;

pub use bridge::BatchedBridge;
pub use callbacks::{pair_of, Callback, CallbackId, CallbackRegistry};
pub use dispatch::{
    ExceptionSink, LogSink, MethodTable, ModuleDispatcher, ModuleHandle, ModuleMethod, ModuleRef,
    ModuleRegistry, ModuleTable, ScriptModule, SinkHandle, CALL_TIMERS_METHOD, DIMENSIONS_MODULE,
    EVENT_DISPATCHER_MODULE, TIMER_MODULE,
};
pub use error::{Error, Result};
pub use queue::{OutgoingQueue, QueueHandle, QueueSnapshot};
pub use timers::{TimerCallback, TimerHandle, TimerHub, TimerTable};
