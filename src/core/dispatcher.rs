//! # Dispatcher: namespace gate in front of a listener registry.
//!
//! Every bus instance owns one [`Dispatcher`]. Once attached, a task feeds it
//! each frame arriving on the process inbound channel.
//!
//! ```text
//! inbound() ──► attach task ──► on_frame ──► decode ──► namespace? ──► wildcard, then specific
//! ```

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::envelope::{Envelope, EventKey};
use crate::listeners::ListenerRegistry;
use crate::transport::Transport;

/// Filters envelopes by namespace and invokes matching listeners.
pub struct Dispatcher {
    namespace: Option<String>,
    registry: ListenerRegistry,
}

impl Dispatcher {
    /// Creates a dispatcher for `namespace` with an empty registry.
    pub fn new(namespace: Option<String>) -> Self {
        Self {
            namespace,
            registry: ListenerRegistry::new(),
        }
    }

    /// Namespace this dispatcher accepts.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Listener registry fed by this dispatcher.
    pub fn registry(&self) -> &ListenerRegistry {
        &self.registry
    }

    /// Delivers one envelope: wildcard listeners first, then listeners for its
    /// type. Returns how many listeners ran (0 on namespace mismatch).
    pub fn on_envelope(&self, env: &Envelope) -> usize {
        if !env.matches_namespace(self.namespace()) {
            return 0;
        }
        let event_type = env.event_type();
        let data = env.data();

        let wild = self.registry.dispatch(&EventKey::Wildcard, event_type, data);
        let typed = self
            .registry
            .dispatch(&EventKey::specific(event_type), event_type, data);
        wild + typed
    }

    /// Decodes and delivers one inbound frame; undecodable frames are ignored.
    pub fn on_frame(&self, frame: &[u8]) -> usize {
        match Envelope::from_frame(frame) {
            Ok(env) => self.on_envelope(&env),
            Err(e) => {
                debug!(namespace = ?self.namespace, error = e.as_label(), "ignoring malformed frame");
                0
            }
        }
    }

    /// Subscribes to the process inbound channel and spawns the delivery task.
    ///
    /// The receiver is created before this returns. Cancel the returned token
    /// to detach.
    pub(crate) fn attach(self: &Arc<Self>, transport: &dyn Transport) -> CancellationToken {
        let mut rx = transport.inbound();
        let token = CancellationToken::new();
        let rt = token.clone();
        let me = Arc::clone(self);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = rt.cancelled() => break,
                    msg = rx.recv() => match msg {
                        Ok(frame) => {
                            me.on_frame(&frame);
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(namespace = ?me.namespace, skipped, "dispatcher lagged, frames dropped");
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            }
            trace!(namespace = ?me.namespace, "dispatcher detached");
        });

        token
    }
}
