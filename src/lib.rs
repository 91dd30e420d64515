//! # clusterbus
//!
//! **clusterbus** is a namespace-scoped publish/subscribe event bus that spans
//! one coordinating process and a pool of worker processes.
//!
//! Any process publishes a typed event with a JSON payload; every process
//! (the coordinator included) observes it. A namespace tag keeps unrelated
//! buses that share the same transport apart.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!   │   worker 1   │   │   worker 2   │   │   worker N   │
//!   │ Bus::publish │   │              │   │              │
//!   └──────┬───────┘   └──────▲───────┘   └──────▲───────┘
//!          │ send_to_coordinator               │ inbound()
//!          ▼                  │                  │
//! ┌────────────────────────────────────────────────────────────────┐
//! │  Coordinator                                                   │
//! │   worker_frames() ─┐                                           │
//! │                    ├─► Relay ── send_to_worker(every live id) ─┼──► workers
//! │   local_frames()  ─┘     │                                     │
//! │   (own publishes)        └─── deliver_local ──► inbound()      │
//! │                                                   │            │
//! │                                       Dispatcher(s) of local buses
//! └────────────────────────────────────────────────────────────────┘
//!
//! In every process:
//!   inbound() ──► Dispatcher ──► namespace match? ──► wildcard listeners ──► typed listeners
//! ```
//!
//! ### Lifecycle
//! ```text
//! Node::new(transport, cfg) ──► node.bus(namespace) ──► Bus
//!
//! coordinator:  bus.mount()          ─► relay installed once per process
//! any process:  bus.subscribe(..)    ─► dispatcher attached once per bus
//!               bus.once(..)         ─► one-shot subscription
//!               bus.publish(..)      ─► fire-and-forget
//!               bus.dispose()        ─► listeners cleared, detached, relay unmounted if owner
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                         |
//! |-------------------|--------------------------------------------------------------|--------------------------------------------|
//! | **Bus**           | Namespace-bound publish/subscribe with mount/dispose.        | [`Bus`], [`Node`]                          |
//! | **Listeners**     | Typed and wildcard callbacks with snapshot dispatch.         | [`ListenerRegistry`], [`Handler`]          |
//! | **Envelopes**     | JSON wire frames and namespace matching.                     | [`Envelope`], [`EventKey`]                 |
//! | **Transport**     | Seam to the inter-process layer; in-memory cluster for tests.| [`Transport`], [`MemoryCluster`]           |
//! | **Errors**        | Typed errors for lifecycle and codec failures.               | [`BusError`], [`EnvelopeError`]            |
//! | **Configuration** | Channel capacity and relay origin policy.                    | [`Config`], [`RelayPolicy`]                |
//!
//! ## Optional features
//! - `logging`: exports [`LogListener`], a wildcard listener that traces every event.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use clusterbus::{Config, MemoryCluster, Node, handler};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = Config::default();
//!     let cluster = MemoryCluster::new(&cfg);
//!
//!     // Coordinator side: mount the relay.
//!     let coordinator = Node::new(cluster.coordinator(), cfg.clone());
//!     let bus = coordinator.bus(Some("jobs"));
//!     bus.mount()?;
//!
//!     // Worker side: subscribe.
//!     let worker = Node::new(cluster.spawn_worker(), cfg);
//!     let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//!     let worker_bus = worker.bus(Some("jobs"));
//!     worker_bus.subscribe("done", handler(move |v| {
//!         let _ = tx.send(v.clone());
//!     }));
//!
//!     bus.publish("done", 42);
//!     let got = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await?;
//!     assert_eq!(got, Some(serde_json::json!(42)));
//!     Ok(())
//! }
//! ```

mod config;
mod core;
mod envelope;
mod error;
mod listeners;
mod transport;

pub mod global;

// ---- Public re-exports ----

pub use crate::config::{Config, RelayPolicy};
pub use crate::core::{Bus, BusId, Dispatcher, Node};
pub use crate::envelope::{Envelope, EventKey};
pub use crate::error::{BusError, EnvelopeError};
pub use crate::listeners::{
    Handler, Listener, ListenerId, ListenerRegistry, WildcardHandler, handler, wildcard,
};
pub use crate::transport::{
    MemoryCluster, MemoryTransport, Role, Transport, TransportRef, WorkerFrame, WorkerId,
};

// Optional: expose a tracing listener (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use crate::listeners::LogListener;
