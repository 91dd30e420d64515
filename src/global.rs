//! # Process-wide default bus.
//!
//! Convenience layer for programs that want one implicit bus per process.
//! Libraries should create their own [`Node`] and [`Bus`] instead.
//!
//! ```text
//! install(transport, cfg) ──► NODE (set once)
//!                                 │
//! mount() / publish() / subscribe*() ──► default_bus() ──► Bus(namespace = absent)
//!                                        (created on first use)
//! ```
//!
//! The default bus lives until process exit; it has no teardown.
//!
//! ## Example
//! ```
//! use clusterbus::{Config, MemoryCluster, global, handler};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), clusterbus::BusError> {
//! let cluster = MemoryCluster::new(&Config::default());
//! global::install(cluster.coordinator(), Config::default())?;
//!
//! global::mount()?;
//! global::subscribe("tick", handler(|n| println!("tick {n}")))?;
//! global::publish("tick", 1)?;
//! # Ok(())
//! # }
//! ```

use std::sync::OnceLock;

use serde::Serialize;

use crate::config::Config;
use crate::core::{Bus, Node};
use crate::error::BusError;
use crate::listeners::{Handler, ListenerId, WildcardHandler};
use crate::transport::TransportRef;

static NODE: OnceLock<Node> = OnceLock::new();
static DEFAULT_BUS: OnceLock<Bus> = OnceLock::new();

/// Installs the process node. Fails with [`BusError::AlreadyInstalled`] on a second call.
pub fn install(transport: TransportRef, cfg: Config) -> Result<(), BusError> {
    NODE.set(Node::new(transport, cfg))
        .map_err(|_| BusError::AlreadyInstalled)
}

/// The installed process node.
pub fn node() -> Result<&'static Node, BusError> {
    NODE.get().ok_or(BusError::NotInstalled)
}

/// The default bus (absent namespace), created on first use.
pub fn default_bus() -> Result<&'static Bus, BusError> {
    let node = node()?;
    Ok(DEFAULT_BUS.get_or_init(|| node.bus(None)))
}

/// Mounts the relay through the default bus.
pub fn mount() -> Result<(), BusError> {
    default_bus()?.mount()
}

/// Publishes on the default bus.
pub fn publish<T: Serialize>(event_type: &str, data: T) -> Result<(), BusError> {
    default_bus()?.publish(event_type, data);
    Ok(())
}

/// Subscribes `handler` to `event_type` on the default bus.
pub fn subscribe(event_type: impl Into<String>, handler: Handler) -> Result<ListenerId, BusError> {
    Ok(default_bus()?.subscribe(event_type, handler))
}

/// Subscribes `handler` to every event on the default bus.
pub fn subscribe_any(handler: WildcardHandler) -> Result<ListenerId, BusError> {
    Ok(default_bus()?.subscribe_any(handler))
}

/// Removes `handler` from `event_type` on the default bus.
pub fn unsubscribe(event_type: &str, handler: &Handler) -> Result<usize, BusError> {
    Ok(default_bus()?.unsubscribe(event_type, handler))
}

/// Removes the wildcard `handler` from the default bus.
pub fn unsubscribe_any(handler: &WildcardHandler) -> Result<usize, BusError> {
    Ok(default_bus()?.unsubscribe_any(handler))
}
