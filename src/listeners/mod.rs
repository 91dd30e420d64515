//! # Listeners and the per-bus listener registry.
//!
//! This module provides the callback types a bus invokes and the
//! [`ListenerRegistry`] that stores them under [`EventKey`](crate::EventKey)s.
//!
//! ## Architecture
//! ```text
//! Dispatcher::on_frame(frame)
//!     │
//!     ├──► registry.dispatch(Wildcard,        type, data) ──► wildcard listeners
//!     └──► registry.dispatch(Specific(type),  type, data) ──► typed listeners
//! ```
//!
//! ## Listener types
//! - **Typed** ([`Handler`]) - receives the payload of one event type
//! - **Wildcard** ([`WildcardHandler`]) - receives `(type, payload)` for every event
//!
//! Identity is the `Arc` allocation: keep a clone of the handler to unsubscribe
//! it later, or keep the [`ListenerId`] returned by subscribe.

mod listener;
mod registry;

#[cfg(feature = "logging")]
mod log;

pub use listener::{Handler, Listener, ListenerId, WildcardHandler, handler, wildcard};
pub use registry::ListenerRegistry;

#[cfg(feature = "logging")]
pub use log::LogListener;
