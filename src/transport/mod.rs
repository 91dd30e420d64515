//! # Transport seam: the process-local view of the IPC layer.
//!
//! The bus never spawns processes or owns sockets. It consumes a [`Transport`]
//! implemented by whatever carries frames between the coordinator and its
//! workers, and only assumes FIFO delivery per sender–receiver pair.
//!
//! ## Architecture
//! ```text
//!   worker k                    coordinator                      worker j
//!   ────────                    ───────────                      ────────
//!   send_to_coordinator ──► worker_frames ─┐
//!                                          ├─► Relay ──► send_to_worker ──► inbound
//!   (coordinator publish) ─► emit_local ───┘     │
//!                            local_frames        └──► deliver_local ──► inbound (coordinator)
//! ```
//!
//! ## Hooks
//! Message hooks are [`tokio::sync::broadcast`] receivers. Each call returns an
//! independent receiver that observes frames sent after it was created;
//! dropping the receiver unregisters the hook.
//!
//! ## Role-gated calls
//! Coordinator-only methods called in a worker (and vice versa) are silent
//! no-ops or return receivers that never yield; the bus checks [`Transport::role`]
//! before using them.

mod memory;

use std::fmt;

use bytes::Bytes;
use tokio::sync::broadcast;

pub use memory::{MemoryCluster, MemoryTransport};

/// Role of the current process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// The single process that relays frames between workers.
    Coordinator,
    /// One of the pooled processes.
    Worker,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Coordinator => f.write_str("coordinator"),
            Role::Worker => f.write_str("worker"),
        }
    }
}

/// Identifier of a worker process, as assigned by the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(pub u64);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

/// A frame received by the coordinator, tagged with the worker that sent it.
#[derive(Debug, Clone)]
pub struct WorkerFrame {
    /// Sender.
    pub origin: WorkerId,
    /// Encoded envelope.
    pub frame: Bytes,
}

/// Shared handle to a transport.
pub type TransportRef = std::sync::Arc<dyn Transport>;

/// Contract the bus needs from the inter-process transport.
///
/// All sends are fire-and-forget: delivery failures (dead worker, unreachable
/// coordinator) are swallowed by the implementation.
pub trait Transport: Send + Sync + 'static {
    /// Role of the current process.
    fn role(&self) -> Role;

    /// Worker only: sends a frame to the coordinator.
    fn send_to_coordinator(&self, frame: Bytes);

    /// Coordinator only: sends a frame to one worker.
    ///
    /// Silently does nothing if `worker` no longer refers to a live worker.
    fn send_to_worker(&self, worker: WorkerId, frame: Bytes);

    /// Coordinator only: the workers to fan out to, at the time of the call.
    fn live_workers(&self) -> Vec<WorkerId>;

    /// Coordinator only: hook fired once per frame sent by any worker.
    fn worker_frames(&self) -> broadcast::Receiver<WorkerFrame>;

    /// Coordinator only: local publish path (enqueues onto [`local_frames`](Self::local_frames)).
    fn emit_local(&self, frame: Bytes);

    /// Coordinator only: hook fired once per frame passed to [`emit_local`](Self::emit_local).
    fn local_frames(&self) -> broadcast::Receiver<Bytes>;

    /// Coordinator only: loopback of a relayed frame into this process's
    /// [`inbound`](Self::inbound) channel.
    fn deliver_local(&self, frame: Bytes);

    /// Any process: hook fired once per frame relayed by the coordinator.
    fn inbound(&self) -> broadcast::Receiver<Bytes>;
}
