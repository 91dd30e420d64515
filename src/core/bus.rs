//! # Bus instance: namespace-bound publish/subscribe handle.
//!
//! A [`Bus`] is created from a [`Node`] and bound to one namespace. It owns a
//! [`Dispatcher`] (and through it a listener registry) and, optionally, the
//! process relay if its [`mount`](Bus::mount) installed it.
//!
//! ## Lifecycle
//! ```text
//! Node::bus(ns) ──► Bus (detached, unmounted)
//!                     │
//!                     ├─ subscribe*() ──► first call attaches Dispatcher to inbound()
//!                     ├─ once()       ──► subscribe; removes itself on first delivery
//!                     ├─ mount()      ──► coordinator only; installs relay if none
//!                     ├─ publish()    ──► coordinator: emit_local / worker: send_to_coordinator
//!                     │
//!                     └─ dispose()    ──► clear listeners, detach, unmount if owner (idempotent)
//! ```
//!
//! ## Rules
//! - **Fire-and-forget**: `publish` never fails from the caller's point of view.
//! - **Attach once**: the dispatcher task is spawned at most once per instance.
//! - **Independence**: two instances with the same namespace keep separate
//!   listeners; both see every matching envelope.
//! - **Detached after dispose**: later calls are accepted and deliver nothing.
//!
//! ## Example
//! ```
//! use clusterbus::{Config, MemoryCluster, Node, handler};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), clusterbus::BusError> {
//! let cluster = MemoryCluster::new(&Config::default());
//! let node = Node::new(cluster.coordinator(), Config::default());
//!
//! let bus = node.bus(Some("chat"));
//! bus.mount()?;
//! bus.subscribe("message", handler(|data| println!("got {data}")));
//! bus.publish("message", "hello");
//! bus.dispose();
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::dispatcher::Dispatcher;
use super::node::Node;
use crate::envelope::{Envelope, EventKey};
use crate::error::BusError;
use crate::listeners::{Handler, Listener, ListenerId, WildcardHandler};
use crate::transport::{Role, Transport};

/// Global counter for bus instance ids.
static BUS_SEQ: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a bus instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BusId(u64);

/// Namespace-bound event bus.
///
/// Cheap to clone; clones share listeners and lifecycle state.
#[derive(Clone)]
pub struct Bus {
    inner: Arc<BusInner>,
}

struct BusInner {
    id: BusId,
    node: Node,
    dispatcher: Arc<Dispatcher>,
    /// Cancellation token of the attached dispatcher task.
    attachment: Mutex<Option<CancellationToken>>,
    /// Written only while `attachment` is locked.
    disposed: AtomicBool,
}

impl Drop for BusInner {
    fn drop(&mut self) {
        if let Some(token) = self.attachment.get_mut().take() {
            token.cancel();
        }
    }
}

impl Bus {
    pub(crate) fn new(node: Node, namespace: Option<String>) -> Self {
        Self {
            inner: Arc::new(BusInner {
                id: BusId(BUS_SEQ.fetch_add(1, Ordering::Relaxed)),
                node,
                dispatcher: Arc::new(Dispatcher::new(namespace)),
                attachment: Mutex::new(None),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    /// Identity of this instance.
    pub fn id(&self) -> BusId {
        self.inner.id
    }

    /// Namespace tag applied to published envelopes and required of inbound ones.
    pub fn namespace(&self) -> Option<&str> {
        self.inner.dispatcher.namespace()
    }

    /// Node this instance was created from.
    pub fn node(&self) -> &Node {
        &self.inner.node
    }

    /// Publishes `event_type` with `data` to every process (fire-and-forget).
    ///
    /// In the coordinator the frame goes to the relay's local hook; in a worker
    /// it goes to the coordinator. Payloads that fail to serialize, empty event
    /// types and publishes after [`dispose`](Self::dispose) are dropped with a log record.
    pub fn publish<T: Serialize>(&self, event_type: &str, data: T) {
        if self.is_disposed() {
            trace!(namespace = ?self.namespace(), event_type, "publish after dispose ignored");
            return;
        }
        if event_type.is_empty() {
            warn!(namespace = ?self.namespace(), "publish without event type dropped");
            return;
        }

        let frame = serde_json::to_value(data)
            .map_err(|e| e.to_string())
            .map(|data| Envelope::new(event_type, data, self.namespace().map(str::to_string)))
            .and_then(|env| env.to_frame().map_err(|e| e.as_message()));
        let frame = match frame {
            Ok(frame) => frame,
            Err(error) => {
                warn!(namespace = ?self.namespace(), event_type, error = %error, "publish encode failed");
                return;
            }
        };

        let transport = self.inner.node.transport();
        match transport.role() {
            Role::Coordinator => transport.emit_local(frame),
            Role::Worker => transport.send_to_coordinator(frame),
        }
        trace!(namespace = ?self.namespace(), event_type, "published");
    }

    /// Registers `handler` for `event_type`.
    ///
    /// The first subscription attaches this instance to the process inbound
    /// channel. Outside a Tokio runtime nothing is registered and the returned
    /// id is inert.
    pub fn subscribe(&self, event_type: impl Into<String>, handler: Handler) -> ListenerId {
        self.subscribe_key(EventKey::Specific(event_type.into()), Listener::Typed(handler))
    }

    /// Registers `handler` for every event type in this namespace.
    pub fn subscribe_any(&self, handler: WildcardHandler) -> ListenerId {
        self.subscribe_key(EventKey::Wildcard, Listener::Wildcard(handler))
    }

    /// Registers `handler` for the next `event_type` delivery only.
    ///
    /// The registration removes itself before `handler` runs, so it fires at
    /// most once even when dispatch passes overlap. Cancel it with
    /// [`remove`](Self::remove) and the returned id.
    pub fn once(&self, event_type: impl Into<String>, handler: Handler) -> ListenerId {
        let dispatcher = Arc::downgrade(&self.inner.dispatcher);
        let fired = Arc::new(AtomicBool::new(false));
        let slot: Arc<OnceLock<ListenerId>> = Arc::default();

        let wrapped: Handler = {
            let fired = Arc::clone(&fired);
            let slot = Arc::clone(&slot);
            Arc::new(move |data: &Value| {
                if fired.swap(true, Ordering::AcqRel) {
                    return;
                }
                if let (Some(d), Some(id)) = (dispatcher.upgrade(), slot.get()) {
                    d.registry().remove(*id);
                }
                handler(data);
            })
        };

        let id = self.subscribe_key(EventKey::Specific(event_type.into()), Listener::Typed(wrapped));
        let _ = slot.set(id);
        // Fired before the id was known: drop the spent entry now.
        if fired.load(Ordering::Acquire) {
            self.remove(id);
        }
        id
    }

    /// Registers `listener` under an explicit key.
    pub fn subscribe_key(&self, key: EventKey, listener: Listener) -> ListenerId {
        let mut attachment = self.inner.attachment.lock();
        if self.inner.disposed.load(Ordering::Acquire) {
            trace!(namespace = ?self.namespace(), key = %key, "subscribe after dispose ignored");
            return ListenerId::next();
        }
        if attachment.is_none() && Handle::try_current().is_err() {
            warn!(namespace = ?self.namespace(), key = %key, "subscribe outside a tokio runtime ignored");
            return ListenerId::next();
        }

        let id = self.inner.dispatcher.registry().subscribe(key, listener);
        if attachment.is_none() {
            let transport = self.inner.node.transport();
            *attachment = Some(self.inner.dispatcher.attach(transport.as_ref()));
            debug!(namespace = ?self.namespace(), bus = ?self.inner.id, "dispatcher attached");
        }
        id
    }

    /// Removes every registration of `handler` for `event_type`.
    pub fn unsubscribe(&self, event_type: &str, handler: &Handler) -> usize {
        self.unsubscribe_key(
            &EventKey::specific(event_type),
            &Listener::Typed(Arc::clone(handler)),
        )
    }

    /// Removes every wildcard registration of `handler`.
    pub fn unsubscribe_any(&self, handler: &WildcardHandler) -> usize {
        self.unsubscribe_key(&EventKey::Wildcard, &Listener::Wildcard(Arc::clone(handler)))
    }

    /// Removes every registration of `listener` under `key`.
    pub fn unsubscribe_key(&self, key: &EventKey, listener: &Listener) -> usize {
        self.inner.dispatcher.registry().unsubscribe(key, listener)
    }

    /// Removes the registration identified by `id`.
    pub fn remove(&self, id: ListenerId) -> bool {
        self.inner.dispatcher.registry().remove(id)
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.dispatcher.registry().len()
    }

    /// Starts the process relay (coordinator only). Idempotent.
    ///
    /// Fails with [`BusError::InvalidRole`] in a worker and with
    /// [`BusError::NoRuntime`] outside a Tokio runtime, leaving the relay unmounted.
    pub fn mount(&self) -> Result<(), BusError> {
        if self.inner.node.mount_as(Some(self.inner.id))? {
            debug!(namespace = ?self.namespace(), bus = ?self.inner.id, "mounted");
        }
        Ok(())
    }

    /// Returns `true` if this instance installed the running relay.
    pub fn is_mounted(&self) -> bool {
        self.inner.node.relay_owner() == Some(self.inner.id)
    }

    /// Returns `true` after [`dispose`](Self::dispose).
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    /// Clears listeners, detaches from the inbound channel and unmounts the
    /// relay if this instance mounted it. Idempotent.
    pub fn dispose(&self) {
        let token = {
            let mut attachment = self.inner.attachment.lock();
            if self.inner.disposed.swap(true, Ordering::AcqRel) {
                return;
            }
            attachment.take()
        };

        self.inner.dispatcher.registry().clear();
        if let Some(token) = token {
            token.cancel();
        }
        self.inner.node.unmount_owned_by(self.inner.id);
        debug!(namespace = ?self.namespace(), bus = ?self.inner.id, "disposed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, RelayPolicy};
    use crate::listeners::{handler, wildcard};
    use crate::transport::{MemoryCluster, MemoryTransport, Transport};
    use bytes::Bytes;
    use serde_json::{Value, json};
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn node_for(t: Arc<MemoryTransport>, cfg: &Config) -> Node {
        Node::new(t, cfg.clone())
    }

    fn collect(bus: &Bus, event_type: &str) -> mpsc::UnboundedReceiver<Value> {
        let (tx, rx) = mpsc::unbounded_channel();
        bus.subscribe(
            event_type,
            handler(move |v| {
                let _ = tx.send(v.clone());
            }),
        );
        rx
    }

    fn collect_any(bus: &Bus) -> mpsc::UnboundedReceiver<(String, Value)> {
        let (tx, rx) = mpsc::unbounded_channel();
        bus.subscribe_any(wildcard(move |t, v| {
            let _ = tx.send((t.to_string(), v.clone()));
        }));
        rx
    }

    async fn next<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("channel closed")
    }

    /// Waits for in-flight duplicates, then asserts nothing else arrived.
    async fn assert_drained<T: std::fmt::Debug>(rx: &mut mpsc::UnboundedReceiver<T>) {
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err(), "unexpected extra delivery");
    }

    /// Coordinator node plus `n` worker nodes.
    fn cluster(n: usize, cfg: &Config) -> (MemoryCluster, Node, Vec<Node>) {
        let c = MemoryCluster::new(cfg);
        let coord = node_for(c.coordinator(), cfg);
        let workers = (0..n).map(|_| node_for(c.spawn_worker(), cfg)).collect();
        (c, coord, workers)
    }

    #[tokio::test]
    async fn test_namespace_isolation() {
        let (_c, coord, _) = cluster(0, &Config::default());
        let a = coord.bus(Some("x"));
        let b = coord.bus(Some("y"));
        a.mount().unwrap();

        let mut ra = collect(&a, "ping");
        let mut rb = collect(&b, "ping");

        a.publish("ping", 1);
        assert_eq!(next(&mut ra).await, json!(1));

        b.publish("ping", "sentinel");
        assert_eq!(next(&mut rb).await, json!("sentinel"));
        assert!(ra.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_wildcard_receives_namespace_events_in_order() {
        let (_c, coord, _) = cluster(0, &Config::default());
        let x = coord.bus(Some("x"));
        let y = coord.bus(Some("y"));
        x.mount().unwrap();
        let mut rx = collect_any(&x);

        x.publish("ping", 1);
        y.publish("ping", 9);
        x.publish("pong", 2);
        x.publish("end", Value::Null);

        assert_eq!(next(&mut rx).await, ("ping".into(), json!(1)));
        assert_eq!(next(&mut rx).await, ("pong".into(), json!(2)));
        assert_eq!(next(&mut rx).await, ("end".into(), Value::Null));
    }

    #[tokio::test]
    async fn test_fan_out_reaches_all_workers_and_coordinator_once() {
        let (_c, coord, workers) = cluster(3, &Config::default());
        let cb = coord.bus(Some("x"));
        cb.mount().unwrap();
        let mut rc = collect(&cb, "e");

        let wbs: Vec<Bus> = workers.iter().map(|n| n.bus(Some("x"))).collect();
        let mut rws: Vec<_> = wbs.iter().map(|b| collect(b, "e")).collect();

        wbs[0].publish("e", "v");
        for rw in rws.iter_mut() {
            assert_eq!(next(rw).await, json!("v"));
        }
        assert_eq!(next(&mut rc).await, json!("v"));

        cb.publish("e", "end");
        assert_eq!(next(&mut rc).await, json!("end"));
        assert_drained(&mut rc).await;
        for rw in rws.iter_mut() {
            assert_eq!(next(rw).await, json!("end"));
            assert_drained(rw).await;
        }
    }

    #[tokio::test]
    async fn test_exclude_origin_policy_skips_sender() {
        let cfg = Config {
            relay: RelayPolicy::ExcludeOrigin,
            ..Config::default()
        };
        let (_c, coord, workers) = cluster(2, &cfg);
        let cb = coord.bus(None);
        cb.mount().unwrap();

        let origin = workers[0].bus(None);
        let other = workers[1].bus(None);
        let mut ro = collect(&origin, "e");
        let mut rt = collect(&other, "e");

        origin.publish("e", 1);
        assert_eq!(next(&mut rt).await, json!(1));

        cb.publish("e", "end");
        assert_eq!(next(&mut ro).await, json!("end"));
        assert_eq!(next(&mut rt).await, json!("end"));
    }

    #[tokio::test]
    async fn test_mount_twice_keeps_one_relay() {
        let (_c, coord, workers) = cluster(1, &Config::default());
        let cb = coord.bus(Some("x"));
        cb.mount().unwrap();
        cb.mount().unwrap();
        coord.mount().unwrap();
        assert!(cb.is_mounted());

        let wb = workers[0].bus(Some("x"));
        let mut rc = collect(&cb, "e");
        let mut rw = collect(&wb, "e");

        wb.publish("e", 1);
        wb.publish("e", 2);
        assert_eq!(next(&mut rc).await, json!(1));
        assert_eq!(next(&mut rc).await, json!(2));
        assert_eq!(next(&mut rw).await, json!(1));
        assert_eq!(next(&mut rw).await, json!(2));

        // A second relay would deliver every frame twice.
        assert_drained(&mut rc).await;
        assert_drained(&mut rw).await;
    }

    #[tokio::test]
    async fn test_second_instance_mount_is_noop() {
        let (_c, coord, _) = cluster(0, &Config::default());
        let a = coord.bus(Some("x"));
        let b = coord.bus(Some("x"));
        a.mount().unwrap();
        b.mount().unwrap();

        assert!(a.is_mounted());
        assert!(!b.is_mounted());

        b.dispose();
        assert!(coord.is_mounted());
        a.dispose();
        assert!(!coord.is_mounted());
    }

    #[tokio::test]
    async fn test_dispose_is_idempotent_and_safe_unmounted() {
        let (_c, coord, _) = cluster(0, &Config::default());
        let bus = coord.bus(Some("x"));
        bus.dispose();
        bus.dispose();
        assert!(bus.is_disposed());
        assert!(!coord.is_mounted());

        coord.unmount();
        coord.unmount();
    }

    #[tokio::test]
    async fn test_mount_in_worker_is_refused() {
        let (_c, _coord, workers) = cluster(1, &Config::default());
        let wb = workers[0].bus(Some("x"));

        let err = wb.mount().unwrap_err();
        assert_eq!(err, BusError::InvalidRole { role: Role::Worker });
        assert!(!wb.is_mounted());
        assert!(!workers[0].is_mounted());
    }

    #[tokio::test]
    async fn test_unsubscribe_during_dispatch() {
        let (_c, coord, _) = cluster(0, &Config::default());
        let bus = coord.bus(Some("x"));
        bus.mount().unwrap();
        let mut witness = collect_any(&bus);

        let calls: Arc<parking_lot::Mutex<Vec<Value>>> = Default::default();
        let me: Arc<parking_lot::Mutex<Option<Handler>>> = Default::default();
        let h = {
            let bus = bus.clone();
            let calls = calls.clone();
            let me = me.clone();
            handler(move |v| {
                if let Some(h) = me.lock().take() {
                    bus.unsubscribe("e", &h);
                }
                calls.lock().push(v.clone());
            })
        };
        *me.lock() = Some(h.clone());
        bus.subscribe("e", h);

        bus.publish("e", 1);
        bus.publish("e", 2);
        bus.publish("end", Value::Null);
        for _ in 0..3 {
            next(&mut witness).await;
        }

        assert_eq!(*calls.lock(), vec![json!(1)]);
    }

    #[tokio::test]
    async fn test_same_namespace_instances_are_independent() {
        let (_c, coord, _) = cluster(0, &Config::default());
        let a = coord.bus(Some("x"));
        let b = coord.bus(Some("x"));
        a.mount().unwrap();
        let mut ra = collect(&a, "e");
        let mut rb = collect(&b, "e");

        a.publish("e", 1);
        assert_eq!(next(&mut ra).await, json!(1));
        assert_eq!(next(&mut rb).await, json!(1));
        assert_eq!(a.listener_count(), 1);
        assert_eq!(b.listener_count(), 1);
    }

    #[tokio::test]
    async fn test_dispose_detaches_and_unmounts() {
        let (_c, coord, _) = cluster(0, &Config::default());
        let a = coord.bus(Some("x"));
        a.mount().unwrap();
        let _ra = collect(&a, "e");

        a.dispose();
        assert!(!coord.is_mounted());
        assert_eq!(a.listener_count(), 0);

        let _ = collect(&a, "e");
        assert_eq!(a.listener_count(), 0);
        a.publish("e", 1);

        let b = coord.bus(Some("x"));
        b.mount().unwrap();
        assert!(b.is_mounted());
    }

    #[tokio::test]
    async fn test_coordinator_publish_before_mount_is_lost() {
        let (_c, coord, _) = cluster(0, &Config::default());
        let bus = coord.bus(Some("x"));
        let mut rx = collect(&bus, "e");

        bus.publish("e", "lost");
        bus.mount().unwrap();
        bus.publish("e", "kept");

        assert_eq!(next(&mut rx).await, json!("kept"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dead_worker_is_skipped() {
        let cfg = Config::default();
        let c = MemoryCluster::new(&cfg);
        let coord = node_for(c.coordinator(), &cfg);
        let doomed = c.spawn_worker();
        let survivor = node_for(c.spawn_worker(), &cfg);

        let cb = coord.bus(None);
        cb.mount().unwrap();
        let sb = survivor.bus(None);
        let mut rs = collect(&sb, "e");
        let mut rc = collect(&cb, "e");

        assert!(doomed.id().is_some_and(|id| c.kill_worker(id)));
        sb.publish("e", 7);

        assert_eq!(next(&mut rs).await, json!(7));
        assert_eq!(next(&mut rc).await, json!(7));
    }

    #[tokio::test]
    async fn test_relay_drops_malformed_worker_frames() {
        let cfg = Config::default();
        let c = MemoryCluster::new(&cfg);
        let coord = node_for(c.coordinator(), &cfg);
        let raw = c.spawn_worker();
        let worker = node_for(Arc::clone(&raw), &cfg);

        let cb = coord.bus(None);
        cb.mount().unwrap();
        let mut rc = collect_any(&cb);
        let mut inbound = raw.inbound();

        raw.send_to_coordinator(Bytes::from_static(b"{\"data\":1}"));
        worker.bus(None).publish("ok", 1);

        assert_eq!(next(&mut rc).await, ("ok".into(), json!(1)));
        let first = tokio::time::timeout(Duration::from_secs(2), inbound.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(Envelope::from_frame(&first).unwrap().event_type(), "ok");
    }

    #[tokio::test]
    async fn test_remove_by_listener_id() {
        let (_c, coord, _) = cluster(0, &Config::default());
        let bus = coord.bus(None);
        let h = handler(|_| {});
        let id = bus.subscribe("e", h.clone());
        bus.subscribe("e", h.clone());

        assert!(bus.remove(id));
        assert_eq!(bus.listener_count(), 1);
        assert_eq!(bus.unsubscribe("e", &h), 1);
        assert_eq!(bus.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_event_type_is_not_published() {
        let (_c, coord, _) = cluster(0, &Config::default());
        let bus = coord.bus(None);
        bus.mount().unwrap();
        let mut rx = collect_any(&bus);

        bus.publish("", 1);
        bus.publish("e", 2);
        assert_eq!(next(&mut rx).await, ("e".into(), json!(2)));
    }

    #[tokio::test]
    async fn test_once_fires_for_first_delivery_only() {
        let (_c, coord, _) = cluster(0, &Config::default());
        let bus = coord.bus(Some("x"));
        bus.mount().unwrap();
        let mut witness = collect_any(&bus);

        let calls: Arc<parking_lot::Mutex<Vec<Value>>> = Default::default();
        let c = calls.clone();
        bus.once("my-event", handler(move |v| c.lock().push(v.clone())));
        assert_eq!(bus.listener_count(), 2);

        bus.publish("my-event", 1);
        bus.publish("my-event", 2);
        bus.publish("end", Value::Null);
        for _ in 0..3 {
            next(&mut witness).await;
        }

        assert_eq!(*calls.lock(), vec![json!(1)]);
        assert_eq!(bus.listener_count(), 1);
    }

    #[tokio::test]
    async fn test_once_can_be_cancelled_by_id() {
        let (_c, coord, _) = cluster(0, &Config::default());
        let bus = coord.bus(None);
        bus.mount().unwrap();
        let mut witness = collect(&bus, "e");

        let fired = Arc::new(AtomicBool::new(false));
        let f = fired.clone();
        let id = bus.once("e", handler(move |_| f.store(true, Ordering::SeqCst)));
        assert!(bus.remove(id));

        bus.publish("e", 1);
        assert_eq!(next(&mut witness).await, json!(1));
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[test]
    fn test_subscribe_outside_runtime_is_inert() {
        let cfg = Config::default();
        let c = MemoryCluster::new(&cfg);
        let bus = node_for(c.coordinator(), &cfg).bus(None);

        bus.subscribe("e", handler(|_| {}));
        assert_eq!(bus.listener_count(), 0);
        assert_eq!(bus.mount(), Err(BusError::NoRuntime));
        assert!(!bus.is_mounted());
    }
}
