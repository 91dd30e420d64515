//! Envelopes: the wire-level message unit and event keys.
//!
//! This module groups the envelope **data model**, its **frame codec**, and the
//! keys used to address listeners.
//!
//! ## Contents
//! - [`Envelope`] event type, payload and namespace tag
//! - [`EventKey`] specific event type or wildcard
//!
//! ## Quick reference
//! - **Producers**: `Bus::publish` encodes an envelope and hands its frame to
//!   the transport.
//! - **Consumers**: the relay validates frames before fan-out; dispatchers
//!   decode frames and apply [`Envelope::matches_namespace`].

mod codec;
mod key;

pub use codec::Envelope;
pub use key::EventKey;
