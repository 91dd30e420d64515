//! # In-process transport for tests and demos.
//!
//! [`MemoryCluster`] simulates one coordinator and any number of workers inside
//! a single process. Every simulated process gets its own [`MemoryTransport`];
//! frames move through [`tokio::sync::broadcast`] channels, so each receiver
//! gets its own copy (value semantics, like a real process boundary).
//!
//! ## Rules
//! - **Liveness**: a killed worker no longer appears in `live_workers`; frames
//!   sent to it are skipped and frames it sends are dropped.
//! - **FIFO**: frames from one sender to one receiver arrive in send order.
//! - **Lag**: receivers slower than `Config::channel_capacity` skip old frames.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::trace;

use super::{Role, Transport, WorkerFrame, WorkerId};
use crate::config::Config;

/// State shared by every transport of one cluster.
struct Shared {
    capacity: usize,
    next_worker: AtomicU64,
    /// Inbound channel of each live worker.
    workers: RwLock<BTreeMap<WorkerId, broadcast::Sender<Bytes>>>,
    /// Worker → coordinator channel.
    to_coordinator: broadcast::Sender<WorkerFrame>,
}

/// Simulated process pool: one coordinator plus dynamically spawned workers.
///
/// # Example
/// ```
/// use clusterbus::{Config, MemoryCluster, Role, Transport};
///
/// let cluster = MemoryCluster::new(&Config::default());
/// let w = cluster.spawn_worker();
///
/// assert_eq!(cluster.coordinator().role(), Role::Coordinator);
/// assert_eq!(w.role(), Role::Worker);
/// assert_eq!(cluster.coordinator().live_workers(), vec![w.id().unwrap()]);
/// ```
pub struct MemoryCluster {
    shared: Arc<Shared>,
    coordinator: Arc<MemoryTransport>,
}

impl MemoryCluster {
    /// Creates a cluster with no workers.
    pub fn new(cfg: &Config) -> Self {
        let capacity = cfg.channel_capacity_clamped();
        let (to_coordinator, _) = broadcast::channel(capacity);
        let shared = Arc::new(Shared {
            capacity,
            next_worker: AtomicU64::new(1),
            workers: RwLock::new(BTreeMap::new()),
            to_coordinator,
        });

        let coordinator = Arc::new(MemoryTransport {
            role: MemoryRole::Coordinator {
                local: broadcast::channel(capacity).0,
            },
            inbound: broadcast::channel(capacity).0,
            shared: Arc::clone(&shared),
        });

        Self {
            shared,
            coordinator,
        }
    }

    /// Transport of the coordinating process.
    pub fn coordinator(&self) -> Arc<MemoryTransport> {
        Arc::clone(&self.coordinator)
    }

    /// Adds a live worker and returns its transport.
    pub fn spawn_worker(&self) -> Arc<MemoryTransport> {
        let id = WorkerId(self.shared.next_worker.fetch_add(1, Ordering::Relaxed));
        let (inbound, _) = broadcast::channel(self.shared.capacity);
        self.shared.workers.write().insert(id, inbound.clone());
        trace!(worker = %id, "worker spawned");

        Arc::new(MemoryTransport {
            role: MemoryRole::Worker { id },
            inbound,
            shared: Arc::clone(&self.shared),
        })
    }

    /// Marks a worker dead. Returns `false` if it was not live.
    pub fn kill_worker(&self, id: WorkerId) -> bool {
        let removed = self.shared.workers.write().remove(&id).is_some();
        if removed {
            trace!(worker = %id, "worker killed");
        }
        removed
    }
}

enum MemoryRole {
    Coordinator { local: broadcast::Sender<Bytes> },
    Worker { id: WorkerId },
}

/// One simulated process's view of a [`MemoryCluster`].
pub struct MemoryTransport {
    role: MemoryRole,
    inbound: broadcast::Sender<Bytes>,
    shared: Arc<Shared>,
}

impl MemoryTransport {
    /// Worker id, or `None` for the coordinator.
    pub fn id(&self) -> Option<WorkerId> {
        match self.role {
            MemoryRole::Worker { id } => Some(id),
            MemoryRole::Coordinator { .. } => None,
        }
    }

    fn is_live_worker(&self, id: WorkerId) -> bool {
        self.shared.workers.read().contains_key(&id)
    }
}

impl Transport for MemoryTransport {
    fn role(&self) -> Role {
        match self.role {
            MemoryRole::Coordinator { .. } => Role::Coordinator,
            MemoryRole::Worker { .. } => Role::Worker,
        }
    }

    fn send_to_coordinator(&self, frame: Bytes) {
        let MemoryRole::Worker { id } = self.role else {
            return;
        };
        if !self.is_live_worker(id) {
            trace!(worker = %id, "dead worker send dropped");
            return;
        }
        let _ = self
            .shared
            .to_coordinator
            .send(WorkerFrame { origin: id, frame });
    }

    fn send_to_worker(&self, worker: WorkerId, frame: Bytes) {
        if !matches!(self.role, MemoryRole::Coordinator { .. }) {
            return;
        }
        let tx = self.shared.workers.read().get(&worker).cloned();
        match tx {
            Some(tx) => {
                let _ = tx.send(frame);
            }
            None => trace!(worker = %worker, "worker gone, frame skipped"),
        }
    }

    fn live_workers(&self) -> Vec<WorkerId> {
        match self.role {
            MemoryRole::Coordinator { .. } => self.shared.workers.read().keys().copied().collect(),
            MemoryRole::Worker { .. } => Vec::new(),
        }
    }

    fn worker_frames(&self) -> broadcast::Receiver<WorkerFrame> {
        match self.role {
            MemoryRole::Coordinator { .. } => self.shared.to_coordinator.subscribe(),
            // Sender dropped immediately: the receiver reports `Closed`.
            MemoryRole::Worker { .. } => broadcast::channel(1).1,
        }
    }

    fn emit_local(&self, frame: Bytes) {
        if let MemoryRole::Coordinator { local } = &self.role {
            let _ = local.send(frame);
        }
    }

    fn local_frames(&self) -> broadcast::Receiver<Bytes> {
        match &self.role {
            MemoryRole::Coordinator { local } => local.subscribe(),
            MemoryRole::Worker { .. } => broadcast::channel(1).1,
        }
    }

    fn deliver_local(&self, frame: Bytes) {
        if matches!(self.role, MemoryRole::Coordinator { .. }) {
            let _ = self.inbound.send(frame);
        }
    }

    fn inbound(&self) -> broadcast::Receiver<Bytes> {
        self.inbound.subscribe()
    }
}
