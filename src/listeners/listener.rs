use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;

/// Global counter for listener handles.
static LISTENER_SEQ: AtomicU64 = AtomicU64::new(1);

/// Callback for one event type; receives the payload.
pub type Handler = Arc<dyn Fn(&Value) + Send + Sync>;

/// Callback for every event type; receives `(event_type, payload)`.
pub type WildcardHandler = Arc<dyn Fn(&str, &Value) + Send + Sync>;

/// Wraps a closure into a [`Handler`].
pub fn handler<F>(f: F) -> Handler
where
    F: Fn(&Value) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Wraps a closure into a [`WildcardHandler`].
pub fn wildcard<F>(f: F) -> WildcardHandler
where
    F: Fn(&str, &Value) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Opaque handle returned by subscribe, usable with `remove`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    pub(crate) fn next() -> Self {
        Self(LISTENER_SEQ.fetch_add(1, Ordering::Relaxed))
    }
}

/// A registered callback.
#[derive(Clone)]
pub enum Listener {
    /// Receives the payload only.
    Typed(Handler),
    /// Receives the event type and the payload.
    Wildcard(WildcardHandler),
}

impl Listener {
    /// Invokes the callback.
    pub(crate) fn call(&self, event_type: &str, data: &Value) {
        match self {
            Listener::Typed(h) => h(data),
            Listener::Wildcard(h) => h(event_type, data),
        }
    }

    /// Reference equality: same variant and same allocation.
    pub fn same(&self, other: &Listener) -> bool {
        match (self, other) {
            (Listener::Typed(a), Listener::Typed(b)) => Arc::ptr_eq(a, b),
            (Listener::Wildcard(a), Listener::Wildcard(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<Handler> for Listener {
    fn from(h: Handler) -> Self {
        Listener::Typed(h)
    }
}

impl From<WildcardHandler> for Listener {
    fn from(h: WildcardHandler) -> Self {
        Listener::Wildcard(h)
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Listener::Typed(_) => f.write_str("Listener::Typed"),
            Listener::Wildcard(_) => f.write_str("Listener::Wildcard"),
        }
    }
}
