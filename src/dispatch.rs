//! Module dispatcher: resolves a `(module, method)` pair to an action.
//!
//! Three cases, checked in order:
//! - a fixed set of built-in named targets, resolved best-effort through
//!   the script environment's module registry; an absent module or member
//!   is a silent no-op, never an error;
//! - the timer-execution collaborator's batched `callTimers` operation,
//!   where each timer body runs inside a fault-isolating boundary so one
//!   failure cannot abort the batch;
//! - everything else, accepted as a forward-compatible no-op so future
//!   module or method names need no core changes to be tolerated.
//!
//! A dispatch that did not fault ends by running due immediate timers,
//! before the facade drains the outgoing queue.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde_json::Value;

use crate::error::{Error, Result};
use crate::timers::TimerHandle;

/// Event-dispatch built-in target.
pub const EVENT_DISPATCHER_MODULE: &str = "EventDispatcher";
/// Layout-metrics built-in target.
pub const DIMENSIONS_MODULE: &str = "Dimensions";
/// Wire name of the timer-execution collaborator.
pub const TIMER_MODULE: &str = "JSTimersExecution";
/// Batched timer operation on [`TIMER_MODULE`].
pub const CALL_TIMERS_METHOD: &str = "callTimers";

/// A named, invocable member of a script module. Receives the decoded
/// event params; may enqueue through a captured
/// [`QueueHandle`](crate::queue::QueueHandle).
pub type ModuleMethod = Rc<RefCell<dyn FnMut(&Value) -> Result<()>>>;

/// Shared handle to one script module.
pub type ModuleRef = Rc<RefCell<dyn ScriptModule>>;

/// Shared handle to the module registry.
pub type ModuleHandle = Rc<RefCell<dyn ModuleRegistry>>;

/// Shared handle to the exception sink.
pub type SinkHandle = Rc<RefCell<dyn ExceptionSink>>;

/// The script environment's module lookup. Consumed, not owned, by the
/// core.
pub trait ModuleRegistry {
    /// Resolve a module by name; absent modules are a recoverable miss.
    fn lookup(&self, name: &str) -> Option<ModuleRef>;
}

/// A module exposing named, invocable members.
pub trait ScriptModule {
    /// Resolve a member by name; absent members are a recoverable miss.
    fn method(&mut self, name: &str) -> Option<ModuleMethod>;
}

/// Receiver for faults raised inside an isolated per-timer invocation.
pub trait ExceptionSink {
    /// Report a fault. Must not fail.
    fn report(&mut self, fault: &Error);
}

/// Exception sink that reports through the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ExceptionSink for LogSink {
    fn report(&mut self, fault: &Error) {
        tracing::error!(
            target: "bridge.dispatch",
            event = "dispatch.fault_reported",
            error = %fault,
            "isolated fault reported"
        );
    }
}

/// Table-backed module registry: wire name to module handle.
#[derive(Default)]
pub struct ModuleTable {
    modules: HashMap<String, ModuleRef>,
}

impl ModuleTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module under its wire name.
    pub fn insert(&mut self, name: impl Into<String>, module: ModuleRef) {
        self.modules.insert(name.into(), module);
    }

    pub fn remove(&mut self, name: &str) {
        self.modules.remove(name);
    }
}

impl ModuleRegistry for ModuleTable {
    fn lookup(&self, name: &str) -> Option<ModuleRef> {
        self.modules.get(name).map(Rc::clone)
    }
}

/// Table-backed script module: named members over shared bodies.
#[derive(Default)]
pub struct MethodTable {
    methods: HashMap<String, ModuleMethod>,
}

impl MethodTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a member under its wire name.
    pub fn insert(&mut self, name: impl Into<String>, method: ModuleMethod) {
        self.methods.insert(name.into(), method);
    }
}

impl ScriptModule for MethodTable {
    fn method(&mut self, name: &str) -> Option<ModuleMethod> {
        self.methods.get(name).map(Rc::clone)
    }
}

/// Routes `(module, method, args)` requests from native code to
/// script-side targets.
pub struct ModuleDispatcher {
    modules: ModuleHandle,
    timers: TimerHandle,
    exceptions: SinkHandle,
}

impl ModuleDispatcher {
    pub fn new(modules: ModuleHandle, timers: TimerHandle, exceptions: SinkHandle) -> Self {
        Self {
            modules,
            timers,
            exceptions,
        }
    }

    /// Resolve and execute one dispatch request, then run due immediates.
    ///
    /// Module-method faults and malformed payloads propagate (skipping the
    /// immediates run, which the next cycle picks up); per-timer faults go
    /// to the exception sink and the batch continues.
    pub fn dispatch(&mut self, module: &str, method: &str, args: &[Value]) -> Result<()> {
        match module {
            EVENT_DISPATCHER_MODULE | DIMENSIONS_MODULE => {
                self.dispatch_named(module, method, args)?;
            }
            TIMER_MODULE if method == CALL_TIMERS_METHOD => {
                self.call_timers(args)?;
            }
            _ => {
                tracing::debug!(
                    target: "bridge.dispatch",
                    event = "dispatch.unhandled",
                    module = %module,
                    method = %method,
                    "no dispatch target; ignoring"
                );
            }
        }
        self.timers.borrow_mut().run_due_immediates();
        Ok(())
    }

    fn dispatch_named(&mut self, module: &str, method: &str, args: &[Value]) -> Result<()> {
        let Some(target) = self.modules.borrow().lookup(module) else {
            tracing::debug!(
                target: "bridge.dispatch",
                event = "dispatch.module_miss",
                module = %module,
                "module not registered; ignoring"
            );
            return Ok(());
        };
        let Some(member) = target.borrow_mut().method(method) else {
            tracing::debug!(
                target: "bridge.dispatch",
                event = "dispatch.method_miss",
                module = %module,
                method = %method,
                "member not invocable; ignoring"
            );
            return Ok(());
        };

        // Named-module calls carry an event payload as the second argument;
        // the member receives its `params` field.
        let event = args
            .get(1)
            .ok_or_else(|| Error::payload(format!("{module}.{method}: missing event payload")))?;
        let params = event.get("params").cloned().unwrap_or(Value::Null);

        tracing::debug!(
            target: "bridge.dispatch",
            event = "dispatch.module_call",
            module = %module,
            method = %method,
            "invoking module member"
        );
        let mut member_ref = member.borrow_mut();
        let result = (&mut *member_ref)(&params)
            .map_err(|fault| Error::module(module, method, fault.to_string()));
        drop(member_ref);
        result
    }

    fn call_timers(&mut self, args: &[Value]) -> Result<()> {
        let batch = args
            .first()
            .ok_or_else(|| Error::payload("callTimers: missing timer id batch"))?;
        let timer_ids: Vec<u64> = serde_json::from_value(batch.clone())?;

        tracing::debug!(
            target: "bridge.dispatch",
            event = "dispatch.call_timers",
            batch = timer_ids.len(),
            "executing timer batch"
        );
        for timer_id in timer_ids {
            let body = self.timers.borrow_mut().resolve(timer_id);
            let Some(body) = body else {
                continue;
            };
            // One timer's failure must not abort the batch.
            let mut body_ref = body.borrow_mut();
            let outcome = (&mut *body_ref)();
            drop(body_ref);
            if let Err(fault) = outcome {
                let fault = Error::timer(timer_id, fault.to_string());
                tracing::warn!(
                    target: "bridge.dispatch",
                    event = "dispatch.timer_fault",
                    timer_id,
                    error = %fault,
                    "timer body failed; continuing batch"
                );
                self.exceptions.borrow_mut().report(&fault);
            }
        }
        Ok(())
    }
}
