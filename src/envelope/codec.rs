//! # Envelope data model and frame codec.
//!
//! An [`Envelope`] is what crosses the process boundary. It is serialized as a
//! JSON object and carried by the transport as an opaque [`Bytes`] frame:
//!
//! ```text
//! {"type": "ping", "data": 1, "namespace": "x"}
//! {"type": "ping", "data": null, "namespace": null}     // absent namespace
//! ```
//!
//! ## Rules
//! - `type` is required and non-empty on decode; frames without it are rejected.
//! - `data` is opaque; a missing `data` field decodes as `null`.
//! - `namespace` absent (or `null`) is its own value and only equals itself.
//! - Envelopes are immutable once constructed.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EnvelopeError;

/// Wire message: event type, payload and namespace tag.
///
/// # Example
/// ```
/// use clusterbus::Envelope;
/// use serde_json::json;
///
/// let env = Envelope::new("ping", json!(1), Some("x".into()));
/// let frame = env.to_frame().unwrap();
/// let back = Envelope::from_frame(&frame).unwrap();
///
/// assert_eq!(back, env);
/// assert!(back.matches_namespace(Some("x")));
/// assert!(!back.matches_namespace(None));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    event_type: String,
    data: Value,
    namespace: Option<String>,
}

/// Decoding view: every field optional so a missing `type` is told apart from
/// a frame that is not an object at all.
#[derive(Deserialize)]
struct WireEnvelope {
    #[serde(rename = "type", default)]
    event_type: Option<String>,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    namespace: Option<String>,
}

impl Envelope {
    /// Builds an envelope. A `null` payload is passed through unchanged.
    pub fn new(event_type: impl Into<String>, data: Value, namespace: Option<String>) -> Self {
        Self {
            event_type: event_type.into(),
            data,
            namespace,
        }
    }

    /// Event type.
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Opaque payload.
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Namespace tag (`None` = absent).
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Returns `true` iff the envelope's namespace equals `bus_namespace`.
    ///
    /// Absent equals absent; any other absent/present combination is unequal.
    #[inline]
    pub fn matches_namespace(&self, bus_namespace: Option<&str>) -> bool {
        self.namespace.as_deref() == bus_namespace
    }

    /// Serializes the envelope into a transport frame.
    pub fn to_frame(&self) -> Result<Bytes, EnvelopeError> {
        serde_json::to_vec(self)
            .map(Bytes::from)
            .map_err(|e| EnvelopeError::Encode {
                error: e.to_string(),
            })
    }

    /// Decodes a transport frame.
    ///
    /// Fails with [`EnvelopeError::Malformed`] if the frame is not a JSON object
    /// of the expected shape, and [`EnvelopeError::MissingType`] if `type` is
    /// missing, `null` or empty.
    pub fn from_frame(frame: &[u8]) -> Result<Self, EnvelopeError> {
        let wire: WireEnvelope =
            serde_json::from_slice(frame).map_err(|e| EnvelopeError::Malformed {
                error: e.to_string(),
            })?;

        match wire.event_type {
            Some(event_type) if !event_type.is_empty() => Ok(Self {
                event_type,
                data: wire.data,
                namespace: wire.namespace,
            }),
            _ => Err(EnvelopeError::MissingType),
        }
    }
}
