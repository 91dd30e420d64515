//! Runtime core: bus instances, dispatch and the coordinator relay.
//!
//! The public API from this module is [`Node`], [`Bus`] and [`Dispatcher`].
//!
//! Internal modules:
//! - [`node`]: per-process context; owns the single relay slot;
//! - [`bus`]: namespace-bound publish/subscribe handle with mount/dispose;
//! - [`dispatcher`]: namespace gate and inbound delivery task;
//! - [`relay`]: coordinator fan-out of every frame to all workers.
//!
//! ## Wiring
//! ```text
//! worker Bus::publish ──► send_to_coordinator ─┐
//!                                              ├─► Relay ──► every worker inbound ──► Dispatcher(s)
//! coordinator Bus::publish ──► emit_local ─────┘      └────► coordinator inbound ──► Dispatcher(s)
//! ```

mod bus;
mod dispatcher;
mod node;
mod relay;

pub use bus::{Bus, BusId};
pub use dispatcher::Dispatcher;
pub use node::Node;
