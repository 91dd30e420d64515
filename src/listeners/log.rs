//! # LogListener — wildcard listener that traces every event
//!
//! A minimal listener that records each event it observes as a `tracing`
//! info record. Use it for debugging or demos.
//!
//! ## Example output (with a fmt subscriber)
//! ```text
//! INFO clusterbus::listeners::log: event namespace=Some("chat") event_type="message" data="hello"
//! INFO clusterbus::listeners::log: event namespace=None event_type="tick" data=1
//! ```

use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use super::listener::WildcardHandler;

/// Event tracer listener.
#[derive(Debug, Clone, Default)]
pub struct LogListener {
    namespace: Option<String>,
}

impl LogListener {
    /// Construct a new [`LogListener`] labelled with `namespace`.
    #[must_use]
    pub fn new(namespace: Option<&str>) -> Self {
        Self {
            namespace: namespace.map(str::to_string),
        }
    }

    /// Handler to pass to `Bus::subscribe_any`.
    pub fn handler(self) -> WildcardHandler {
        Arc::new(move |event_type: &str, data: &Value| {
            info!(namespace = ?self.namespace, event_type, data = %data, "event");
        })
    }
}
