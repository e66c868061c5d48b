//! Bridge facade: the three entry points native code drives.
//!
//! Control flow per cycle: an entry point triggers the dispatcher (when
//! native invokes a function) or the callback registry (when native
//! resolves a callback); any resulting outgoing calls accumulate in the
//! queue; due immediate timers run; the queue is swapped out and its prior
//! contents returned, or `None` when there is nothing to send.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::Value;

use crate::callbacks::{CallbackId, CallbackRegistry};
use crate::dispatch::{ModuleDispatcher, ModuleHandle, SinkHandle};
use crate::error::Result;
use crate::queue::{OutgoingQueue, QueueHandle, QueueSnapshot};
use crate::timers::TimerHandle;

/// Protocol state and dispatch logic for one bridge instance.
///
/// Owns the callback registry and the outgoing queue; the module registry,
/// timer hub, and exception sink are injected collaborators. One logical
/// thread of control per instance, so no locking; the enqueue-then-drain
/// order within one facade call is strict program order.
pub struct BatchedBridge {
    callbacks: CallbackRegistry,
    queue: QueueHandle,
    dispatcher: ModuleDispatcher,
    timers: TimerHandle,
}

impl BatchedBridge {
    pub fn new(modules: ModuleHandle, timers: TimerHandle, exceptions: SinkHandle) -> Self {
        Self {
            callbacks: CallbackRegistry::new(),
            queue: Rc::new(RefCell::new(OutgoingQueue::new())),
            dispatcher: ModuleDispatcher::new(modules, Rc::clone(&timers), exceptions),
            timers,
        }
    }

    /// Enqueue capability for collaborators (callbacks, module members,
    /// timer bodies). Appends land in the drain that ends the same cycle.
    #[must_use]
    pub fn queue_handle(&self) -> QueueHandle {
        Rc::clone(&self.queue)
    }

    /// Registration surface for the collaborator issuing async calls.
    pub fn callbacks_mut(&mut self) -> &mut CallbackRegistry {
        &mut self.callbacks
    }

    #[must_use]
    pub fn callbacks(&self) -> &CallbackRegistry {
        &self.callbacks
    }

    /// Run due immediate timers, then drain the outgoing queue.
    ///
    /// `None` means nothing to send.
    pub fn flushed_queue(&mut self) -> Option<QueueSnapshot> {
        self.timers.borrow_mut().run_due_immediates();
        self.queue.borrow_mut().drain()
    }

    /// Resolve a previously issued async callback, then flush.
    pub fn invoke_callback_and_return_flushed_queue(
        &mut self,
        id: CallbackId,
        args: Vec<Value>,
    ) -> Result<Option<QueueSnapshot>> {
        self.callbacks.invoke(id, args)?;
        self.timers.borrow_mut().run_due_immediates();
        Ok(self.flushed_queue())
    }

    /// Execute a named module member (or a timer batch), then flush.
    ///
    /// A dispatch fault propagates without draining; calls buffered before
    /// the fault stay queued for the next cycle.
    pub fn call_function_return_flushed_queue(
        &mut self,
        module: &str,
        method: &str,
        args: &[Value],
    ) -> Result<Option<QueueSnapshot>> {
        self.dispatcher.dispatch(module, method, args)?;
        Ok(self.flushed_queue())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{
        ExceptionSink, MethodTable, ModuleTable, EVENT_DISPATCHER_MODULE, TIMER_MODULE,
    };
    use crate::error::Error;
    use crate::timers::{TimerCallback, TimerTable};
    use serde_json::json;

    #[derive(Default)]
    struct RecordingSink {
        faults: Vec<String>,
    }

    impl ExceptionSink for RecordingSink {
        fn report(&mut self, fault: &Error) {
            self.faults.push(fault.to_string());
        }
    }

    struct Fixture {
        bridge: BatchedBridge,
        modules: Rc<RefCell<ModuleTable>>,
        timers: Rc<RefCell<TimerTable>>,
        sink: Rc<RefCell<RecordingSink>>,
    }

    fn fixture() -> Fixture {
        let modules = Rc::new(RefCell::new(ModuleTable::new()));
        let timers = Rc::new(RefCell::new(TimerTable::new()));
        let sink = Rc::new(RefCell::new(RecordingSink::default()));
        let modules_handle: ModuleHandle = Rc::clone(&modules) as ModuleHandle;
        let timers_handle: TimerHandle = Rc::clone(&timers) as TimerHandle;
        let sink_handle: SinkHandle = Rc::clone(&sink) as SinkHandle;
        let bridge = BatchedBridge::new(modules_handle, timers_handle, sink_handle);
        Fixture {
            bridge,
            modules,
            timers,
            sink,
        }
    }

    /// Module member that echoes its params back through the queue.
    fn echo_module(queue: &QueueHandle) -> Rc<RefCell<MethodTable>> {
        let queue = Rc::clone(queue);
        let mut module = MethodTable::new();
        module.insert(
            "receiveEvent",
            Rc::new(RefCell::new(move |params: &Value| {
                queue
                    .borrow_mut()
                    .enqueue("NativeEvents", "emit", vec![params.clone()]);
                Ok(())
            })),
        );
        Rc::new(RefCell::new(module))
    }

    #[test]
    fn call_function_flushes_calls_enqueued_during_dispatch() {
        let mut fx = fixture();
        let module = echo_module(&fx.bridge.queue_handle());
        fx.modules
            .borrow_mut()
            .insert(EVENT_DISPATCHER_MODULE, module);

        let snapshot = fx
            .bridge
            .call_function_return_flushed_queue(
                EVENT_DISPATCHER_MODULE,
                "receiveEvent",
                &[json!("touch"), json!({"params": {"x": 7}})],
            )
            .expect("cycle")
            .expect("snapshot");

        assert_eq!(snapshot.modules, ["NativeEvents"]);
        assert_eq!(snapshot.methods, ["emit"]);
        assert_eq!(snapshot.args, vec![vec![json!({"x": 7})]]);
    }

    #[test]
    fn invoke_callback_flushes_calls_enqueued_by_the_callback() {
        let mut fx = fixture();
        let queue = fx.bridge.queue_handle();
        fx.bridge.callbacks_mut().register(
            4,
            Box::new(move |args| {
                queue
                    .borrow_mut()
                    .enqueue("NativeEvents", "resolved", args.to_vec());
                Ok(())
            }),
        );

        let snapshot = fx
            .bridge
            .invoke_callback_and_return_flushed_queue(4, vec![Value::Null, json!("value")])
            .expect("cycle")
            .expect("snapshot");

        // The error-first placeholder was stripped before invocation.
        assert_eq!(snapshot.args, vec![vec![json!("value")]]);
        assert!(!fx.bridge.callbacks().contains(4));
        assert!(!fx.bridge.callbacks().contains(5));
    }

    #[test]
    fn idle_cycles_return_the_empty_signal() {
        let mut fx = fixture();
        assert!(fx.bridge.flushed_queue().is_none());
        let flushed = fx
            .bridge
            .invoke_callback_and_return_flushed_queue(42, Vec::new())
            .expect("missing callback is a no-op");
        assert!(flushed.is_none());
        let flushed = fx
            .bridge
            .call_function_return_flushed_queue("NoSuchModule", "noSuchMethod", &[])
            .expect("unknown target is a no-op");
        assert!(flushed.is_none());
    }

    #[test]
    fn immediates_run_before_every_drain() {
        let mut fx = fixture();
        let queue = fx.bridge.queue_handle();
        let body: TimerCallback = Rc::new(RefCell::new(move || {
            queue
                .borrow_mut()
                .enqueue("NativeEvents", "immediate", Vec::new());
            Ok(())
        }));
        fx.timers.borrow_mut().register_immediate(body);

        let snapshot = fx.bridge.flushed_queue().expect("snapshot");
        assert_eq!(snapshot.methods, ["immediate"]);
        // The immediate cleared; the next cycle is idle.
        assert!(fx.bridge.flushed_queue().is_none());
    }

    #[test]
    fn timer_batch_faults_are_reported_and_cycle_completes() {
        let mut fx = fixture();
        let queue = fx.bridge.queue_handle();

        let failing: TimerCallback = Rc::new(RefCell::new(|| Err(Error::payload("tick failed"))));
        let succeeding: TimerCallback = Rc::new(RefCell::new(move || {
            queue.borrow_mut().enqueue("NativeEvents", "tick", Vec::new());
            Ok(())
        }));
        let first = fx.timers.borrow_mut().register(failing);
        let second = fx.timers.borrow_mut().register(succeeding);

        let snapshot = fx
            .bridge
            .call_function_return_flushed_queue(
                TIMER_MODULE,
                "callTimers",
                &[json!([first, second])],
            )
            .expect("batch completes")
            .expect("snapshot");

        assert_eq!(snapshot.methods, ["tick"]);
        assert_eq!(fx.sink.borrow().faults.len(), 1);
    }

    #[test]
    fn dispatch_fault_leaves_buffered_calls_for_the_next_cycle() {
        let mut fx = fixture();
        let queue = fx.bridge.queue_handle();
        let mut module = MethodTable::new();
        module.insert(
            "receiveEvent",
            Rc::new(RefCell::new(move |_params: &Value| {
                queue
                    .borrow_mut()
                    .enqueue("NativeEvents", "partial", Vec::new());
                Err(Error::payload("boom"))
            })),
        );
        fx.modules
            .borrow_mut()
            .insert(EVENT_DISPATCHER_MODULE, Rc::new(RefCell::new(module)));

        let err = fx
            .bridge
            .call_function_return_flushed_queue(
                EVENT_DISPATCHER_MODULE,
                "receiveEvent",
                &[json!("touch"), json!({"params": null})],
            )
            .expect_err("fault propagates");
        assert!(matches!(err, Error::Module { .. }));

        // The failed cycle did not drain; the next one picks the call up.
        let snapshot = fx.bridge.flushed_queue().expect("snapshot");
        assert_eq!(snapshot.methods, ["partial"]);
    }

    #[test]
    fn call_counter_is_continuous_across_cycles() {
        let mut fx = fixture();
        let module = echo_module(&fx.bridge.queue_handle());
        fx.modules
            .borrow_mut()
            .insert(EVENT_DISPATCHER_MODULE, module);
        let args = [json!("touch"), json!({"params": 1})];

        let first = fx
            .bridge
            .call_function_return_flushed_queue(EVENT_DISPATCHER_MODULE, "receiveEvent", &args)
            .expect("cycle")
            .expect("snapshot");
        let second = fx
            .bridge
            .call_function_return_flushed_queue(EVENT_DISPATCHER_MODULE, "receiveEvent", &args)
            .expect("cycle")
            .expect("snapshot");

        assert_eq!(first.call_id, 1);
        assert_eq!(second.call_id, 2);
    }
}
