//! Core correlator implementation.
//!
//! # Binding States
//!
//! ```text
//!            bind_bridge / discovery / lazy bind
//!   Unbound ─────────────────────────────────────► Bound
//!      ▲                                             │
//!      └──────────────── unbind_bridge ──────────────┘
//! ```
//!
//! While unbound, every outbound call waits behind the readiness gate and
//! discovery polls the configured binding points. Binding flushes the gate.
//! Binding while already bound is rejected; the first bridge wins.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, trace, warn};

use crate::codec::Payload;
use crate::error::{Error, Result};
use crate::events::{EventEmitter, ListenerId};
use crate::gate::ReadyGate;
use crate::identifiers::{IdGenerator, JobId};
use crate::protocol::Envelope;
use crate::transport::{BridgeLocator, SharedBridge};

use super::builder::CorrelatorBuilder;
use super::jobs::{Decoding, Job, JobKind, JobTable};
use super::options::CorrelatorOptions;
use super::reply::Reply;

// ============================================================================
// Constants
// ============================================================================

/// Emitted after a bridge is bound.
pub const BRIDGE_BOUND_EVENT: &str = "bridge.bound";

/// Emitted after the bound bridge is unbound.
pub const BRIDGE_UNBOUND_EVENT: &str = "bridge.unbound";

/// Emitted after [`Correlator::destroy`].
pub const DESTROYED_EVENT: &str = "correlator.destroyed";

// ============================================================================
// Types
// ============================================================================

/// Teardown callback registered with [`Correlator::on_close`].
pub type CloseCallback = Box<dyn FnOnce() + Send>;

/// Shared state behind every [`Correlator`] clone.
///
/// `binding` serializes changes to `bridge` together with the gate's ready
/// flag: bound always means ready once a binding change completes.
pub(crate) struct Inner {
    pub(crate) options: CorrelatorOptions,
    pub(crate) gate: ReadyGate,
    pub(crate) binding: Mutex<()>,
    pub(crate) bridge: RwLock<Option<SharedBridge>>,
    pub(crate) jobs: Mutex<JobTable>,
    pub(crate) close_callbacks: Mutex<Vec<CloseCallback>>,
    pub(crate) locator: Option<Arc<dyn BridgeLocator>>,
    pub(crate) discovery: Mutex<Option<JoinHandle<()>>>,
    pub(crate) lazy_binds: Mutex<Vec<JoinHandle<()>>>,
    pub(crate) events: EventEmitter,
}

// ============================================================================
// Correlator
// ============================================================================

/// Turns a one-way string bridge into calls, replies and subscriptions.
///
/// Cheap to clone; clones share the same bridge, jobs and gate.
///
/// # Example
///
/// ```ignore
/// let link = Correlator::new();
/// link.bind_bridge(Arc::new(bridge))?;
///
/// link.run("AppService@test", Value::Null);
/// let project = link.call_json("ProjectService@get", json!({ "id": 1 })).await?;
///
/// // From the host, when the result is ready:
/// link.dequeue("li1700000000000123", r#"{"volume":10}"#);
/// ```
#[derive(Clone)]
pub struct Correlator {
    pub(crate) inner: Arc<Inner>,
}

impl fmt::Debug for Correlator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Correlator")
            .field("bound", &self.is_bound())
            .field("ready", &self.is_ready())
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Correlator - Constructors
// ============================================================================

impl Correlator {
    /// Creates a correlator with default options and no discovery.
    #[must_use]
    pub fn new() -> Self {
        let ids = IdGenerator::new(CorrelatorOptions::default().id_prefix);
        Self::from_parts(CorrelatorOptions::default(), None, ids)
    }

    /// Returns a builder for a configured correlator.
    #[inline]
    #[must_use]
    pub fn builder() -> CorrelatorBuilder {
        CorrelatorBuilder::new()
    }

    pub(crate) fn from_parts(
        options: CorrelatorOptions,
        locator: Option<Arc<dyn BridgeLocator>>,
        ids: IdGenerator,
    ) -> Self {
        let gate = ReadyGate::with_order(options.drain_order);

        Self {
            inner: Arc::new(Inner {
                options,
                gate,
                binding: Mutex::new(()),
                bridge: RwLock::new(None),
                jobs: Mutex::new(JobTable::new(ids)),
                close_callbacks: Mutex::new(Vec::new()),
                locator,
                discovery: Mutex::new(None),
                lazy_binds: Mutex::new(Vec::new()),
                events: EventEmitter::new(),
            }),
        }
    }
}

// ============================================================================
// Correlator - Accessors
// ============================================================================

impl Correlator {
    /// Returns the bound bridge.
    #[inline]
    #[must_use]
    pub fn bridge(&self) -> Option<SharedBridge> {
        self.inner.bridge.read().clone()
    }

    /// Returns `true` if a bridge is bound.
    #[inline]
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.inner.bridge.read().is_some()
    }

    /// Returns `true` if calls are dispatched immediately.
    #[inline]
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.inner.gate.is_ready()
    }

    /// Returns the number of jobs sent and awaiting results.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.jobs.lock().len()
    }

    /// Returns `true` if `id` is a job sent and awaiting results.
    #[inline]
    #[must_use]
    pub fn is_pending(&self, id: &str) -> bool {
        self.inner.jobs.lock().contains(id)
    }

    /// Returns the kind of the pending job `id`.
    #[inline]
    #[must_use]
    pub fn pending_kind(&self, id: &str) -> Option<JobKind> {
        self.inner.jobs.lock().kind(id)
    }

    /// Returns the number of calls waiting for a bridge.
    #[inline]
    #[must_use]
    pub fn queued_count(&self) -> usize {
        self.inner.gate.pending_callbacks()
    }

    /// Returns the options this correlator was built with.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &CorrelatorOptions {
        &self.inner.options
    }

    /// Returns the event emitter.
    #[inline]
    #[must_use]
    pub fn events(&self) -> &EventEmitter {
        &self.inner.events
    }
}

// ============================================================================
// Correlator - Binding
// ============================================================================

impl Correlator {
    /// Binds `bridge` and flushes every call waiting for it.
    ///
    /// Cancels a running discovery.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BridgeAlreadyBound`] if a bridge is bound. The
    /// existing binding is kept.
    pub fn bind_bridge(&self, bridge: SharedBridge) -> Result<()> {
        let drained = {
            let _binding = self.inner.binding.lock();
            {
                let mut slot = self.inner.bridge.write();
                if slot.is_some() {
                    error!("Bridge already bound, unbind first to bind another bridge");
                    return Err(Error::BridgeAlreadyBound);
                }
                *slot = Some(bridge);
            }
            self.inner.gate.open()
        };

        self.cancel_discovery();
        debug!(queued = drained.len(), "Bridge bound");

        for callback in drained {
            callback();
        }
        self.inner.events.emit(BRIDGE_BOUND_EVENT, &Value::Null);
        Ok(())
    }

    /// Unbinds the bridge.
    ///
    /// Pending jobs stay registered and can still be answered. New calls
    /// wait until another bridge is bound.
    pub fn unbind_bridge(&self) {
        let previous = {
            let _binding = self.inner.binding.lock();
            let previous = self.inner.bridge.write().take();
            self.inner.gate.set_ready(false);
            previous
        };

        if previous.is_some() {
            debug!(pending = self.pending_count(), "Bridge unbound");
            self.inner.events.emit(BRIDGE_UNBOUND_EVENT, &Value::Null);
        }
    }

    /// Reads the bridge slot and the ready flag under the binding lock.
    #[cfg(test)]
    fn binding_state(&self) -> (bool, bool) {
        let _binding = self.inner.binding.lock();
        (self.is_bound(), self.is_ready())
    }

    /// Binds `bridge` after the configured lazy bind delay (500ms by default).
    ///
    /// A bridge bound earlier by any other path wins; the deferred bind is
    /// then rejected like any second bind.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoRuntime`] outside a tokio runtime.
    pub fn lazy_bind_bridge(&self, bridge: SharedBridge) -> Result<()> {
        self.lazy_bind_bridge_after(bridge, self.inner.options.lazy_bind_delay)
    }

    /// Binds `bridge` after `delay`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoRuntime`] outside a tokio runtime.
    pub fn lazy_bind_bridge_after(&self, bridge: SharedBridge, delay: Duration) -> Result<()> {
        let runtime = Handle::try_current().map_err(|_| Error::no_runtime("lazy bind"))?;
        let weak = Arc::downgrade(&self.inner);

        let task = runtime.spawn(async move {
            sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                // A conflict is logged by bind_bridge.
                let _ = Correlator { inner }.bind_bridge(bridge);
            }
        });

        let mut lazy_binds = self.inner.lazy_binds.lock();
        lazy_binds.retain(|task| !task.is_finished());
        lazy_binds.push(task);

        let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        trace!(delay_ms, "Lazy bind scheduled");
        Ok(())
    }

    /// Runs `callback` once a bridge is bound, immediately if one is.
    ///
    /// Starts discovery while unbound.
    pub fn on_ready(&self, callback: impl FnOnce() + Send + 'static) {
        self.inner.gate.on_ready(callback);
        self.wait_for_bridge();
    }
}

// ============================================================================
// Correlator - Discovery
// ============================================================================

impl Correlator {
    /// Scans the discovery targets now and keeps polling until bound.
    fn wait_for_bridge(&self) {
        if self.is_bound() || self.inner.options.discovery_targets.is_empty() {
            return;
        }
        let Some(locator) = self.inner.locator.clone() else {
            return;
        };
        if self.discovery_running() {
            return;
        }

        debug!("Waiting for active bridge");
        if self.discover(locator.as_ref()) {
            return;
        }

        let Ok(runtime) = Handle::try_current() else {
            warn!("No async runtime, bridge discovery will not poll");
            return;
        };

        let weak = Arc::downgrade(&self.inner);
        let interval = self.inner.options.discovery_interval;
        let task = runtime.spawn(async move {
            loop {
                sleep(interval).await;
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                let link = Correlator { inner };
                if link.is_bound() || link.discover(locator.as_ref()) {
                    return;
                }
            }
        });

        let mut discovery = self.inner.discovery.lock();
        if discovery.as_ref().is_some_and(|running| !running.is_finished()) {
            // Lost a race with another caller; keep the first poller.
            task.abort();
            return;
        }
        *discovery = Some(task);
    }

    /// Binds the first target the locator resolves. Returns `true` if one did.
    fn discover(&self, locator: &dyn BridgeLocator) -> bool {
        for name in &self.inner.options.discovery_targets {
            if let Some(bridge) = locator.locate(name) {
                info!(name = %name, "Found bridge");
                let _ = self.bind_bridge(bridge);
                return true;
            }
        }
        false
    }

    fn discovery_running(&self) -> bool {
        self.inner
            .discovery
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    fn cancel_discovery(&self) {
        if let Some(task) = self.inner.discovery.lock().take() {
            task.abort();
        }
    }
}

// ============================================================================
// Correlator - Outbound Calls
// ============================================================================

impl Correlator {
    /// Calls a native method and returns its result as text.
    ///
    /// Text results arrive unchanged; structured results are re-serialized
    /// to JSON text. `Value::Null` params are omitted from the envelope.
    pub fn call(&self, method: impl Into<String>, params: Value) -> Reply<String> {
        let (tx, rx) = oneshot::channel();
        let id = self.dispatch(method.into(), params, Job::OnceRaw(tx));
        Reply::new(id, rx, Arc::downgrade(&self.inner))
    }

    /// Calls a native method and returns its result decoded as JSON.
    ///
    /// Resolves with `None` if the native side answers with malformed JSON.
    pub fn call_json(&self, method: impl Into<String>, params: Value) -> Reply<Option<Value>> {
        let (tx, rx) = oneshot::channel();
        let id = self.dispatch(method.into(), params, Job::OnceJson(tx));
        Reply::new(id, rx, Arc::downgrade(&self.inner))
    }

    /// Calls a native method without expecting a result.
    ///
    /// The envelope carries no `id`; nothing tells whether the host saw it.
    pub fn run(&self, method: impl Into<String>, params: Value) {
        let method = method.into();
        let weak = Arc::downgrade(&self.inner);

        self.on_ready(move || {
            if let Some(inner) = weak.upgrade() {
                post(&inner, &Envelope::fire(method, params));
            }
        });
    }

    /// Subscribes to a stream of native results delivered as text.
    ///
    /// `handler` runs for every delivery until [`Correlator::die`] is called
    /// with the returned id. Pass `Value::Null` when there are no params.
    pub fn live(
        &self,
        method: impl Into<String>,
        params: Value,
        handler: impl Fn(Option<Value>) + Send + Sync + 'static,
    ) -> JobId {
        self.subscribe(method.into(), params, Decoding::Raw, handler)
    }

    /// Subscribes to a stream of native results decoded as JSON.
    pub fn live_json(
        &self,
        method: impl Into<String>,
        params: Value,
        handler: impl Fn(Option<Value>) + Send + Sync + 'static,
    ) -> JobId {
        self.subscribe(method.into(), params, Decoding::Json, handler)
    }

    /// Drops the job `id`.
    ///
    /// Ends a subscription, or abandons a call. A call still waiting for a
    /// bridge is never sent. The native side is not notified.
    pub fn die(&self, id: &str) {
        let removed = self.inner.jobs.lock().remove(id);
        if removed.is_some() {
            trace!(job_id = id, "Job removed");
        }
    }

    fn subscribe(
        &self,
        method: String,
        params: Value,
        decoding: Decoding,
        handler: impl Fn(Option<Value>) + Send + Sync + 'static,
    ) -> JobId {
        let job = Job::Streaming {
            decoding,
            handler: Arc::new(handler),
        };
        self.dispatch(method, params, job)
    }

    /// Reserves an id now and sends the call once the gate opens.
    fn dispatch(&self, method: String, params: Value, job: Job) -> JobId {
        let id = self.inner.jobs.lock().reserve();
        let job_id = id.clone();
        let weak = Arc::downgrade(&self.inner);

        self.on_ready(move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if !inner.jobs.lock().activate(&job_id, job) {
                debug!(job_id = %job_id, "Call cancelled before it was sent");
                return;
            }
            post(&inner, &Envelope::call(job_id, method, params));
        });

        id
    }
}

/// Serializes `envelope` and hands it to the bound bridge.
///
/// A correlated envelope that cannot be delivered abandons its job.
fn post(inner: &Inner, envelope: &Envelope) {
    let message = match envelope.to_json() {
        Ok(message) => message,
        Err(e) => {
            error!(error = %e, method = %envelope.method, "Failed to serialize call");
            abandon(inner, envelope);
            return;
        }
    };

    let bridge = inner.bridge.read().clone();
    match bridge {
        Some(bridge) => {
            trace!(method = %envelope.method, id = ?envelope.id, "Posting message");
            bridge.post_message(&message);
        }
        None => {
            warn!(method = %envelope.method, "No bridge bound, message dropped");
            abandon(inner, envelope);
        }
    }
}

fn abandon(inner: &Inner, envelope: &Envelope) {
    if let Some(id) = &envelope.id {
        inner.jobs.lock().remove(id.as_str());
    }
}

// ============================================================================
// Correlator - Inbound Results
// ============================================================================

impl Correlator {
    /// Delivers a native result for job `id`.
    ///
    /// Called by the host. Empty and unknown ids are ignored, which covers
    /// duplicate and late deliveries. One-shot jobs are removed by their
    /// first delivery; subscriptions stay until [`Correlator::die`].
    pub fn dequeue(&self, id: &str, result: impl Into<Payload>) {
        if id.is_empty() {
            return;
        }

        let route = self.inner.jobs.lock().route(id);
        let Some(route) = route else {
            trace!(job_id = id, "Result for unknown job ignored");
            return;
        };

        trace!(job_id = id, "Delivering result");
        route.deliver(result.into());
    }
}

// ============================================================================
// Correlator - Events
// ============================================================================

impl Correlator {
    /// Registers a listener for a named event.
    pub fn on(
        &self,
        event: impl Into<String>,
        listener: impl Fn(&Value) + Send + Sync + 'static,
    ) -> ListenerId {
        self.inner.events.on(event, listener)
    }

    /// Registers a listener removed after its first invocation.
    pub fn once(
        &self,
        event: impl Into<String>,
        listener: impl Fn(&Value) + Send + Sync + 'static,
    ) -> ListenerId {
        self.inner.events.once(event, listener)
    }

    /// Removes a listener.
    pub fn off(&self, event: &str, id: ListenerId) -> bool {
        self.inner.events.off(event, id)
    }

    /// Fires a named event, typically on behalf of the host.
    pub fn emit(&self, event: &str, args: &Value) -> bool {
        self.inner.events.emit(event, args)
    }
}

// ============================================================================
// Correlator - Lifecycle
// ============================================================================

impl Correlator {
    /// Registers a callback for [`Correlator::close`].
    pub fn on_close(&self, callback: impl FnOnce() + Send + 'static) {
        self.inner.close_callbacks.lock().push(Box::new(callback));
    }

    /// Runs and clears the close callbacks, last registered first.
    pub fn close(&self) {
        loop {
            let next = self.inner.close_callbacks.lock().pop();
            match next {
                Some(callback) => callback(),
                None => break,
            }
        }
    }

    /// Tears the correlator down.
    ///
    /// Drops queued calls, cancels discovery and lazy binds, unbinds the
    /// bridge and clears every job. Replies of dropped jobs resolve with
    /// [`Error::Abandoned`]. Event listeners are kept.
    pub fn destroy(&self) {
        self.cancel_discovery();
        for task in self.inner.lazy_binds.lock().drain(..) {
            task.abort();
        }

        let queued = {
            let _binding = self.inner.binding.lock();
            self.inner.bridge.write().take();
            self.inner.gate.clear()
        };
        drop(queued);

        let abandoned = self.inner.jobs.lock().clear();
        debug!(abandoned = abandoned.len(), "Correlator destroyed");
        drop(abandoned);

        self.inner.events.emit(DESTROYED_EVENT, &Value::Null);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Barrier;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::thread;

    use futures_util::FutureExt;
    use serde_json::json;
    use tokio_test::assert_pending;

    use crate::gate::DrainOrder;
    use crate::transport::{BridgeRegistry, FnBridge};

    type Log = Arc<Mutex<Vec<String>>>;

    fn recorder() -> (SharedBridge, Log) {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let log_clone = Arc::clone(&log);
        let bridge = FnBridge::new(move |message: &str| {
            log_clone.lock().push(message.to_string());
        });
        (Arc::new(bridge), log)
    }

    fn envelopes(log: &Log) -> Vec<Envelope> {
        log.lock()
            .iter()
            .map(|message| Envelope::from_json(message).expect("valid envelope"))
            .collect()
    }

    fn bound() -> (Correlator, Log) {
        let link = Correlator::new();
        let (bridge, log) = recorder();
        link.bind_bridge(bridge).expect("first bind");
        (link, log)
    }

    fn frozen_clock() -> u64 {
        42
    }

    /// Registry that counts lookups.
    #[derive(Default)]
    struct CountingLocator {
        registry: BridgeRegistry,
        lookups: AtomicUsize,
    }

    impl BridgeLocator for CountingLocator {
        fn locate(&self, name: &str) -> Option<SharedBridge> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.registry.locate(name)
        }
    }

    // ------------------------------------------------------------------------
    // Calls
    // ------------------------------------------------------------------------

    #[test]
    fn test_call_json_before_bind() {
        let link = Correlator::new();
        let reply = link.call_json("Svc@get", json!({ "id": 1 }));
        assert_eq!(link.queued_count(), 1);
        assert_eq!(link.pending_count(), 0);

        let (bridge, log) = recorder();
        link.bind_bridge(bridge).expect("bind");

        let sent = envelopes(&log);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].id.as_ref(), Some(reply.id()));
        assert_eq!(sent[0].method, "Svc@get");
        assert_eq!(sent[0].params, json!({ "id": 1 }));

        link.dequeue(reply.id().as_str(), "{\"name\":\"x\"}");

        let result = reply.now_or_never().expect("resolved").expect("answered");
        assert_eq!(result, Some(json!({ "name": "x" })));
    }

    #[test]
    fn test_wire_format() {
        let (link, log) = bound();
        let reply = link.call("Svc@get", json!({ "id": 1 }));

        let expected = format!(
            r#"{{"id":"{}","method":"Svc@get","params":{{"id":1}}}}"#,
            reply.id()
        );
        assert_eq!(*log.lock(), vec![expected]);
    }

    #[test]
    fn test_second_dequeue_is_noop() {
        let (link, _log) = bound();
        let reply = link.call_json("Svc@get", Value::Null);
        let id = reply.id().clone();

        assert!(link.is_pending(id.as_str()));
        link.dequeue(id.as_str(), "[1]");
        assert!(!link.is_pending(id.as_str()));
        link.dequeue(id.as_str(), "[2]");

        let result = reply.now_or_never().expect("resolved").expect("answered");
        assert_eq!(result, Some(json!([1])));
    }

    #[test]
    fn test_call_raw_policy() {
        let (link, _log) = bound();

        let structured = link.call("Svc@get", Value::Null);
        link.dequeue(structured.id().as_str(), json!({ "a": 1 }));
        let text = structured.now_or_never().expect("resolved").expect("answered");
        assert_eq!(text, "{\"a\":1}");

        let plain = link.call("Svc@get", Value::Null);
        link.dequeue(plain.id().as_str(), "plain text");
        let text = plain.now_or_never().expect("resolved").expect("answered");
        assert_eq!(text, "plain text");
    }

    #[test]
    fn test_call_json_malformed_result() {
        let (link, _log) = bound();
        let reply = link.call_json("Svc@get", Value::Null);

        link.dequeue(reply.id().as_str(), "not json");

        let result = reply.now_or_never().expect("resolved").expect("answered");
        assert_eq!(result, None);
    }

    #[test]
    fn test_call_json_structured_result() {
        let (link, _log) = bound();
        let reply = link.call_json("Svc@get", Value::Null);

        link.dequeue(reply.id().as_str(), json!({ "volume": 10 }));

        let result = reply.now_or_never().expect("resolved").expect("answered");
        assert_eq!(result, Some(json!({ "volume": 10 })));
    }

    #[test]
    fn test_run_registers_no_job() {
        let (link, log) = bound();

        for _ in 0..10 {
            link.run("AppService@test", Value::Null);
        }

        assert_eq!(link.pending_count(), 0);
        let sent = envelopes(&log);
        assert_eq!(sent.len(), 10);
        assert!(sent.iter().all(|envelope| envelope.id.is_none()));
        assert_eq!(log.lock()[0], r#"{"method":"AppService@test"}"#);
    }

    #[test]
    fn test_unknown_and_empty_ids_ignored() {
        let (link, _log) = bound();
        let reply = link.call("Svc@get", Value::Null);

        link.dequeue("", "x");
        link.dequeue("li-nope", "x");

        assert_eq!(link.pending_count(), 1);
        let mut task = tokio_test::task::spawn(reply);
        assert_pending!(task.poll());
    }

    // ------------------------------------------------------------------------
    // Ordering
    // ------------------------------------------------------------------------

    #[test]
    fn test_buffered_calls_flush_lifo() {
        let link = Correlator::new();
        for n in 1..=3 {
            link.run(format!("Svc@m{n}"), Value::Null);
        }

        let (bridge, log) = recorder();
        link.bind_bridge(bridge).expect("bind");

        let methods: Vec<String> = envelopes(&log).into_iter().map(|e| e.method).collect();
        assert_eq!(methods, vec!["Svc@m3", "Svc@m2", "Svc@m1"]);
    }

    #[test]
    fn test_buffered_calls_flush_fifo() {
        let link = Correlator::builder()
            .drain_order(DrainOrder::Fifo)
            .build()
            .expect("build");
        for n in 1..=3 {
            link.run(format!("Svc@m{n}"), Value::Null);
        }

        let (bridge, log) = recorder();
        link.bind_bridge(bridge).expect("bind");

        let methods: Vec<String> = envelopes(&log).into_iter().map(|e| e.method).collect();
        assert_eq!(methods, vec!["Svc@m1", "Svc@m2", "Svc@m3"]);
    }

    #[test]
    fn test_calls_after_bind_are_synchronous() {
        let (link, log) = bound();
        link.run("Svc@a", Value::Null);
        assert_eq!(log.lock().len(), 1);
        link.run("Svc@b", Value::Null);
        assert_eq!(log.lock().len(), 2);
    }

    // ------------------------------------------------------------------------
    // Streaming
    // ------------------------------------------------------------------------

    #[test]
    fn test_live_until_die() {
        let (link, log) = bound();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);

        let id = link.live("Sensor@stream", Value::Null, move |value| {
            seen_clone.lock().push(value);
        });
        assert_eq!(envelopes(&log)[0].id.as_ref(), Some(&id));
        assert_eq!(link.pending_kind(id.as_str()), Some(JobKind::Streaming));

        link.dequeue(id.as_str(), "1");
        link.dequeue(id.as_str(), "2");
        assert!(link.is_pending(id.as_str()));

        link.die(id.as_str());
        link.dequeue(id.as_str(), "3");

        assert_eq!(*seen.lock(), vec![Some(json!("1")), Some(json!("2"))]);
        assert!(!link.is_pending(id.as_str()));
    }

    #[test]
    fn test_live_json_decodes() {
        let (link, _log) = bound();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);

        let id = link.live_json("Sensor@stream", json!({ "hz": 10 }), move |value| {
            seen_clone.lock().push(value);
        });

        link.dequeue(id.as_str(), "1");
        link.dequeue(id.as_str(), json!({ "x": 2 }));
        link.dequeue(id.as_str(), "garbage");

        assert_eq!(
            *seen.lock(),
            vec![Some(json!(1)), Some(json!({ "x": 2 })), None]
        );
    }

    #[test]
    fn test_die_before_bind_cancels_send() {
        let link = Correlator::new();
        let id = link.live("Sensor@stream", Value::Null, |_| {});
        link.die(id.as_str());

        let (bridge, log) = recorder();
        link.bind_bridge(bridge).expect("bind");

        assert!(log.lock().is_empty());
        assert_eq!(link.pending_count(), 0);
    }

    #[test]
    fn test_handler_may_unsubscribe_itself() {
        let (link, _log) = bound();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        let handle = link.clone();
        let own_id: Arc<Mutex<Option<JobId>>> = Arc::new(Mutex::new(None));
        let own_id_clone = Arc::clone(&own_id);

        let id = link.live("Sensor@stream", Value::Null, move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            if let Some(id) = own_id_clone.lock().as_ref() {
                handle.die(id.as_str());
            }
        });
        *own_id.lock() = Some(id.clone());

        link.dequeue(id.as_str(), "1");
        link.dequeue(id.as_str(), "2");

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_die_is_idempotent() {
        let (link, _log) = bound();
        link.die("li-missing");
        link.die("li-missing");
        assert_eq!(link.pending_count(), 0);
    }

    #[test]
    fn test_die_abandons_call() {
        let (link, _log) = bound();
        let reply = link.call("Svc@get", Value::Null);
        link.die(reply.id().as_str());

        let err = reply.now_or_never().expect("resolved").unwrap_err();
        assert!(matches!(err, Error::Abandoned { .. }));
    }

    // ------------------------------------------------------------------------
    // Ids
    // ------------------------------------------------------------------------

    #[test]
    fn test_ids_unique_under_frozen_clock() {
        let link = Correlator::builder()
            .id_clock(frozen_clock)
            .build()
            .expect("build");
        let (bridge, _log) = recorder();
        link.bind_bridge(bridge).expect("bind");

        let mut ids = Vec::new();
        for _ in 0..300 {
            ids.push(link.live("Sensor@stream", Value::Null, |_| {}));
        }

        let unique: rustc_hash::FxHashSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), 300);
        assert!(ids.iter().all(|id| id.as_str().starts_with("li42")));
        assert_eq!(link.pending_count(), 300);
    }

    // ------------------------------------------------------------------------
    // Binding
    // ------------------------------------------------------------------------

    #[test]
    fn test_double_bind_keeps_first() {
        let link = Correlator::new();
        let (first, first_log) = recorder();
        let (second, second_log) = recorder();

        link.bind_bridge(first).expect("first bind");
        let err = link.bind_bridge(second).unwrap_err();
        assert!(matches!(err, Error::BridgeAlreadyBound));

        link.run("Svc@ping", Value::Null);
        assert_eq!(first_log.lock().len(), 1);
        assert!(second_log.lock().is_empty());
    }

    #[test]
    fn test_unbind_keeps_jobs() {
        let (link, _log) = bound();
        let reply = link.call_json("Svc@get", Value::Null);
        let id = reply.id().clone();

        link.unbind_bridge();
        assert!(!link.is_bound());
        assert!(!link.is_ready());
        assert!(link.is_pending(id.as_str()));

        let mut task = tokio_test::task::spawn(reply);
        assert_pending!(task.poll());

        link.dequeue(id.as_str(), "true");
        assert!(task.is_woken());
        let result = task.poll();
        assert!(matches!(result, std::task::Poll::Ready(Ok(Some(Value::Bool(true))))));
    }

    #[test]
    fn test_concurrent_bind_unbind_stays_consistent() {
        let link = Correlator::new();
        let barrier = Arc::new(Barrier::new(5));
        let done = Arc::new(AtomicBool::new(false));

        let observer = {
            let link = link.clone();
            let barrier = Arc::clone(&barrier);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                barrier.wait();
                while !done.load(Ordering::SeqCst) {
                    let (bound, ready) = link.binding_state();
                    assert_eq!(bound, ready, "bridge slot and gate disagree");
                }
            })
        };

        let workers: Vec<_> = (0..4)
            .map(|n| {
                let link = link.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    for _ in 0..500 {
                        if n % 2 == 0 {
                            let (bridge, _log) = recorder();
                            let _ = link.bind_bridge(bridge);
                        } else {
                            link.unbind_bridge();
                        }
                    }
                })
            })
            .collect();

        for worker in workers {
            worker.join().expect("worker panicked");
        }
        done.store(true, Ordering::SeqCst);
        observer.join().expect("observer saw a torn binding");

        assert_eq!(link.is_bound(), link.is_ready());

        link.unbind_bridge();
        let (bridge, log) = recorder();
        link.bind_bridge(bridge).expect("bind after race");
        link.run("Svc@ping", Value::Null);
        assert_eq!(log.lock().len(), 1);
    }

    #[test]
    fn test_rebind_after_unbind() {
        let (link, _log) = bound();
        link.unbind_bridge();

        link.run("Svc@queued", Value::Null);
        assert_eq!(link.queued_count(), 1);

        let (bridge, log) = recorder();
        link.bind_bridge(bridge).expect("rebind");
        assert_eq!(envelopes(&log)[0].method, "Svc@queued");
    }

    #[test]
    fn test_lifecycle_events() {
        let link = Correlator::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for event in [BRIDGE_BOUND_EVENT, BRIDGE_UNBOUND_EVENT, DESTROYED_EVENT] {
            let seen = Arc::clone(&seen);
            link.on(event, move |_| seen.lock().push(event));
        }

        let (bridge, _log) = recorder();
        link.bind_bridge(bridge).expect("bind");
        link.unbind_bridge();
        link.unbind_bridge();
        link.destroy();

        assert_eq!(
            *seen.lock(),
            vec![BRIDGE_BOUND_EVENT, BRIDGE_UNBOUND_EVENT, DESTROYED_EVENT]
        );
    }

    #[test]
    fn test_host_events_passthrough() {
        let link = Correlator::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);

        let id = link.on("app.pause", move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        assert!(link.emit("app.pause", &Value::Null));
        assert!(link.off("app.pause", id));
        assert!(!link.emit("app.pause", &Value::Null));

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    // ------------------------------------------------------------------------
    // Discovery
    // ------------------------------------------------------------------------

    #[test]
    fn test_discovery_picks_first_target_in_order() {
        let registry = Arc::new(BridgeRegistry::new());
        let (ios, ios_log) = recorder();
        let (android, android_log) = recorder();
        registry.publish("iOSBridge", ios);
        registry.publish("androidBridge", android);

        let link = Correlator::builder()
            .locator(registry)
            .build()
            .expect("build");
        link.run("Svc@ping", Value::Null);

        assert!(link.is_bound());
        assert_eq!(android_log.lock().len(), 1);
        assert!(ios_log.lock().is_empty());
    }

    #[test]
    fn test_discovery_without_runtime_does_not_poll() {
        let registry = Arc::new(BridgeRegistry::new());
        let link = Correlator::builder()
            .locator(registry)
            .build()
            .expect("build");

        link.run("Svc@ping", Value::Null);

        assert!(!link.is_bound());
        assert_eq!(link.queued_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_discovery_polls_until_published() {
        let registry = Arc::new(BridgeRegistry::new());
        let link = Correlator::builder()
            .locator(registry.clone())
            .build()
            .expect("build");

        link.run("App@start", Value::Null);
        assert!(!link.is_bound());

        let (bridge, log) = recorder();
        registry.publish("desktopBridge", bridge);

        sleep(Duration::from_millis(60)).await;

        assert!(link.is_bound());
        assert_eq!(envelopes(&log)[0].method, "App@start");
        assert!(!link.discovery_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_bind_cancels_discovery() {
        let registry = Arc::new(BridgeRegistry::new());
        let link = Correlator::builder()
            .locator(registry.clone())
            .build()
            .expect("build");

        link.run("App@start", Value::Null);
        assert!(link.discovery_running());

        let (manual, manual_log) = recorder();
        link.bind_bridge(manual).expect("bind");
        assert!(!link.discovery_running());

        let (discovered, discovered_log) = recorder();
        registry.publish("androidBridge", discovered);
        sleep(Duration::from_millis(200)).await;

        assert_eq!(manual_log.lock().len(), 1);
        assert!(discovered_log.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_poller_for_many_unbound_calls() {
        let locator = Arc::new(CountingLocator::default());
        let link = Correlator::builder()
            .locator(locator.clone())
            .discovery_targets(["desktopBridge"])
            .build()
            .expect("build");

        for n in 0..3 {
            link.run(format!("Svc@m{n}"), Value::Null);
        }
        assert_eq!(locator.lookups.load(Ordering::SeqCst), 1);

        sleep(Duration::from_millis(120)).await;

        // One synchronous scan, then a single poller ticking at 50ms and 100ms.
        assert_eq!(locator.lookups.load(Ordering::SeqCst), 3);
        assert!(link.discovery_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_destroy_stops_discovery() {
        let locator = Arc::new(CountingLocator::default());
        let link = Correlator::builder()
            .locator(locator.clone())
            .build()
            .expect("build");

        link.run("App@start", Value::Null);
        assert!(link.discovery_running());

        link.destroy();
        assert!(!link.discovery_running());
        let lookups = locator.lookups.load(Ordering::SeqCst);

        let (bridge, log) = recorder();
        locator.registry.publish("androidBridge", bridge);
        sleep(Duration::from_millis(200)).await;

        assert!(!link.is_bound());
        assert!(log.lock().is_empty());
        assert_eq!(locator.lookups.load(Ordering::SeqCst), lookups);
    }

    // ------------------------------------------------------------------------
    // Lazy Binding
    // ------------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn test_destroy_cancels_lazy_bind() {
        let link = Correlator::new();
        let (bridge, log) = recorder();

        link.lazy_bind_bridge(bridge).expect("runtime available");
        link.destroy();

        sleep(Duration::from_millis(600)).await;
        assert!(!link.is_bound());
        assert!(!link.is_ready());

        link.run("Svc@ping", Value::Null);
        assert!(log.lock().is_empty());
        assert_eq!(link.queued_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lazy_bind_after_delay() {
        let link = Correlator::new();
        let (bridge, log) = recorder();

        link.lazy_bind_bridge(bridge).expect("runtime available");
        link.run("Svc@ping", Value::Null);

        sleep(Duration::from_millis(499)).await;
        assert!(!link.is_bound());

        sleep(Duration::from_millis(2)).await;
        assert!(link.is_bound());
        assert_eq!(log.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lazy_bind_loses_to_earlier_bind() {
        let link = Correlator::new();
        let (lazy, lazy_log) = recorder();
        let (native, native_log) = recorder();

        link.lazy_bind_bridge_after(lazy, Duration::from_millis(100))
            .expect("runtime available");
        link.bind_bridge(native).expect("bind");

        sleep(Duration::from_millis(150)).await;
        link.run("Svc@ping", Value::Null);

        assert_eq!(native_log.lock().len(), 1);
        assert!(lazy_log.lock().is_empty());
    }

    #[test]
    fn test_lazy_bind_without_runtime() {
        let link = Correlator::new();
        let (bridge, _log) = recorder();

        let err = link.lazy_bind_bridge(bridge).unwrap_err();
        assert!(matches!(err, Error::NoRuntime { .. }));
    }

    // ------------------------------------------------------------------------
    // Timeouts and Teardown
    // ------------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn test_reply_timeout_removes_job() {
        let (link, _log) = bound();
        let reply = link.call("Slow@op", Value::Null);
        let id = reply.id().clone();

        let err = reply
            .timeout(Duration::from_millis(100))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Timeout { timeout_ms: 100, .. }));
        assert!(!link.is_pending(id.as_str()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reply_timeout_answered_in_time() {
        let (link, _log) = bound();
        let reply = link.call("Fast@op", Value::Null);
        link.dequeue(reply.id().as_str(), "done");

        let text = reply
            .timeout(Duration::from_millis(100))
            .await
            .expect("answered");
        assert_eq!(text, "done");
    }

    #[test]
    fn test_destroy_abandons_everything() {
        let link = Correlator::new();
        let queued = link.call("Svc@queued", Value::Null);

        let (bridge, _log) = recorder();
        link.bind_bridge(bridge).expect("bind");
        let sent = link.call_json("Svc@sent", Value::Null);
        link.unbind_bridge();
        let waiting = link.call("Svc@waiting", Value::Null);

        link.destroy();

        assert!(!link.is_bound());
        assert!(!link.is_ready());
        assert_eq!(link.pending_count(), 0);
        assert_eq!(link.queued_count(), 0);

        assert!(matches!(queued.now_or_never(), Some(Err(Error::Abandoned { .. }))));
        assert!(matches!(sent.now_or_never(), Some(Err(Error::Abandoned { .. }))));
        assert!(matches!(waiting.now_or_never(), Some(Err(Error::Abandoned { .. }))));
    }

    #[test]
    fn test_close_runs_lifo() {
        let link = Correlator::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for n in 1..=3 {
            let order = Arc::clone(&order);
            link.on_close(move || order.lock().push(n));
        }
        link.close();
        link.close();

        assert_eq!(*order.lock(), vec![3, 2, 1]);
    }
}
