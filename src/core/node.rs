//! # Node: per-process context shared by every bus instance.
//!
//! A [`Node`] wraps the process's [`Transport`](crate::Transport), the runtime
//! [`Config`], and the single relay slot of the process. Bus instances are
//! created from a node; any number of them may share it.
//!
//! ## Relay slot
//! ```text
//! Bus A.mount() ─┐
//! Bus B.mount() ─┼──► Node::mount_as() ──► slot empty?  ── yes ──► Relay::spawn()
//! Node.mount()  ─┘                            │
//!                                             └── no ──► no-op (one relay per process)
//! ```
//!
//! ## Rules
//! - Mounting is gated on the process role, not on a bus instance.
//! - At most one relay is active per node; repeated mounts are no-ops.
//! - A relay whose task has exited no longer counts as mounted; the next
//!   mount replaces it.
//! - Unmounting is idempotent and safe before any mount.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tracing::{debug, warn};

use super::bus::{Bus, BusId};
use super::relay::Relay;
use crate::config::Config;
use crate::error::BusError;
use crate::transport::{Role, Transport, TransportRef};

/// Process context: transport, configuration and relay slot.
///
/// Cheap to clone (internally an `Arc`).
#[derive(Clone)]
pub struct Node {
    inner: Arc<NodeInner>,
}

struct NodeInner {
    transport: TransportRef,
    cfg: Config,
    relay: Mutex<Option<Relay>>,
}

impl Node {
    /// Creates a node over `transport`.
    pub fn new(transport: TransportRef, cfg: Config) -> Self {
        Self {
            inner: Arc::new(NodeInner {
                transport,
                cfg,
                relay: Mutex::new(None),
            }),
        }
    }

    /// Role of this process.
    pub fn role(&self) -> Role {
        self.inner.transport.role()
    }

    /// Underlying transport.
    pub fn transport(&self) -> &TransportRef {
        &self.inner.transport
    }

    /// Runtime configuration.
    pub fn config(&self) -> &Config {
        &self.inner.cfg
    }

    /// Creates a new, independent bus instance bound to `namespace`.
    pub fn bus(&self, namespace: Option<&str>) -> Bus {
        Bus::new(self.clone(), namespace.map(str::to_string))
    }

    /// Starts the coordinator relay.
    ///
    /// Fails with [`BusError::InvalidRole`] in a worker and with
    /// [`BusError::NoRuntime`] outside a Tokio runtime. A no-op if the relay
    /// is already running.
    pub fn mount(&self) -> Result<(), BusError> {
        self.mount_as(None).map(|_| ())
    }

    /// Stops the relay, whoever mounted it. Idempotent.
    pub fn unmount(&self) {
        if let Some(relay) = self.inner.relay.lock().take() {
            relay.stop();
            debug!("relay unmounted");
        }
    }

    /// Returns `true` while a relay is running in this process.
    pub fn is_mounted(&self) -> bool {
        self.inner.relay.lock().as_ref().is_some_and(Relay::is_running)
    }

    /// Returns `Ok(true)` if this call installed the relay.
    pub(crate) fn mount_as(&self, owner: Option<BusId>) -> Result<bool, BusError> {
        let role = self.role();
        if role != Role::Coordinator {
            return Err(BusError::InvalidRole { role });
        }

        if Handle::try_current().is_err() {
            warn!(owner = ?owner, "mount outside a tokio runtime refused");
            return Err(BusError::NoRuntime);
        }

        let mut slot = self.inner.relay.lock();
        match slot.as_ref() {
            Some(relay) if relay.is_running() => {
                debug!(owner = ?owner, "relay already mounted");
                return Ok(false);
            }
            Some(relay) => {
                debug!(previous = ?relay.owner(), "replacing exited relay");
            }
            None => {}
        }
        *slot = Some(Relay::spawn(
            Arc::clone(&self.inner.transport),
            self.inner.cfg.relay,
            owner,
        ));
        debug!(owner = ?owner, policy = ?self.inner.cfg.relay, "relay mounted");
        Ok(true)
    }

    pub(crate) fn relay_owner(&self) -> Option<BusId> {
        self.inner
            .relay
            .lock()
            .as_ref()
            .filter(|r| r.is_running())
            .and_then(Relay::owner)
    }

    /// Stops the relay only if `owner` installed it.
    pub(crate) fn unmount_owned_by(&self, owner: BusId) {
        let mut slot = self.inner.relay.lock();
        if slot.as_ref().and_then(Relay::owner) != Some(owner) {
            return;
        }
        if let Some(relay) = slot.take() {
            relay.stop();
            debug!(owner = ?owner, "relay unmounted by owner");
        }
    }
}
