use std::fmt;

/// Address of a listener sequence in a [`ListenerRegistry`](crate::ListenerRegistry).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKey {
    /// Listeners for one event type.
    Specific(String),
    /// Listeners for every event type in the bus namespace.
    Wildcard,
}

impl EventKey {
    /// Key for a specific event type.
    pub fn specific(event_type: impl Into<String>) -> Self {
        EventKey::Specific(event_type.into())
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKey::Specific(t) => f.write_str(t),
            EventKey::Wildcard => f.write_str("*"),
        }
    }
}
