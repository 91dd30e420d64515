//! # Coordinator relay: fan-out of every frame to all workers.
//!
//! The relay runs only in the coordinating process. It listens on two hooks and
//! forwards every valid frame to each live worker and back into the
//! coordinator's own inbound channel.
//!
//! ## Architecture
//! ```text
//! worker_frames() ──┐                         ┌──► send_to_worker(w1)
//!  (from workers)   ├──► relay task ── frame ─┼──► send_to_worker(wN)
//! local_frames()  ──┘   (select! loop)        └──► deliver_local()  ──► coordinator dispatchers
//!  (coordinator publish)
//! ```
//!
//! ## Rules
//! - **No echo loop**: relay outputs (worker inbound, coordinator inbound) never
//!   feed relay inputs.
//! - **Exactly once locally**: each frame is delivered to the coordinator's
//!   inbound channel once, whether a worker or the coordinator authored it.
//! - **Origin policy**: [`RelayPolicy::Broadcast`] includes the sending worker,
//!   [`RelayPolicy::ExcludeOrigin`] skips it.
//! - **Dead workers**: a worker that dies between enumeration and send is
//!   skipped by the transport; the publisher never sees an error.
//! - **Malformed frames** are dropped with a warning, never forwarded.
//! - **Cancellation** is checked before each frame (`biased`), so no frame is
//!   forwarded after [`Relay::stop`] returns.
//! - **Hook closure**: a closed hook is disabled and the other keeps relaying;
//!   the task exits once both are closed, and [`Relay::is_running`] turns false.

use bytes::Bytes;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::bus::BusId;
use crate::config::RelayPolicy;
use crate::envelope::Envelope;
use crate::transport::{Transport, TransportRef, WorkerId};

/// Handle to a relay task (cancellation token + join handle).
pub(crate) struct Relay {
    token: CancellationToken,
    join: JoinHandle<()>,
    /// Bus instance whose `mount()` installed this relay (`None` = mounted on the node).
    owner: Option<BusId>,
}

impl Relay {
    /// Registers both hooks and spawns the relay task.
    ///
    /// Hooks are registered before this returns, so frames sent afterwards are
    /// never missed.
    pub(crate) fn spawn(transport: TransportRef, policy: RelayPolicy, owner: Option<BusId>) -> Self {
        let mut from_workers = transport.worker_frames();
        let mut from_local = transport.local_frames();
        let token = CancellationToken::new();
        let rt = token.clone();

        let join = tokio::spawn(async move {
            let mut workers_open = true;
            let mut local_open = true;
            while workers_open || local_open {
                tokio::select! {
                    biased;
                    _ = rt.cancelled() => {
                        debug!("relay stopped");
                        return;
                    }
                    msg = from_workers.recv(), if workers_open => match msg {
                        Ok(wf) => forward(transport.as_ref(), policy, Some(wf.origin), wf.frame),
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, hook = "workers", "relay lagged, frames dropped");
                        }
                        Err(RecvError::Closed) => {
                            warn!(hook = "workers", "relay hook closed");
                            workers_open = false;
                        }
                    },
                    msg = from_local.recv(), if local_open => match msg {
                        Ok(frame) => forward(transport.as_ref(), policy, None, frame),
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, hook = "local", "relay lagged, frames dropped");
                        }
                        Err(RecvError::Closed) => {
                            warn!(hook = "local", "relay hook closed");
                            local_open = false;
                        }
                    },
                }
            }
            warn!("relay exited: all hooks closed");
        });

        Self { token, join, owner }
    }

    /// Returns `false` once the task has exited, whether stopped or because
    /// both hooks closed.
    pub(crate) fn is_running(&self) -> bool {
        !self.token.is_cancelled() && !self.join.is_finished()
    }

    pub(crate) fn owner(&self) -> Option<BusId> {
        self.owner
    }

    /// Unregisters both hooks. Idempotent.
    pub(crate) fn stop(&self) {
        self.token.cancel();
    }
}

impl Drop for Relay {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Sends an identical copy of `frame` to every live worker and to the
/// coordinator's own inbound channel.
fn forward(transport: &dyn Transport, policy: RelayPolicy, origin: Option<WorkerId>, frame: Bytes) {
    let env = match Envelope::from_frame(&frame) {
        Ok(env) => env,
        Err(e) => {
            warn!(origin = ?origin, error = e.as_label(), "dropping undecodable frame");
            return;
        }
    };

    let mut sent = 0usize;
    for worker in transport.live_workers() {
        if policy == RelayPolicy::ExcludeOrigin && Some(worker) == origin {
            continue;
        }
        transport.send_to_worker(worker, frame.clone());
        sent += 1;
    }
    transport.deliver_local(frame);

    trace!(
        event_type = env.event_type(),
        namespace = ?env.namespace(),
        origin = ?origin,
        workers = sent,
        "frame relayed"
    );
}
