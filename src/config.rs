//! # Global bus configuration.
//!
//! Provides [`Config`] centralized settings for a [`Node`](crate::Node) and the
//! in-memory transport.
//!
//! Config is used in two ways:
//! 1. **Node creation**: `Node::new(transport, config)` (relay policy)
//! 2. **Test clusters**: `MemoryCluster::new(&config)` (channel capacity)
//!
//! ## Sentinel values
//! - `channel_capacity = 0` → clamped to 1

/// Which workers receive a frame relayed from a worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RelayPolicy {
    /// Every live worker, including the one that sent the frame.
    #[default]
    Broadcast,
    /// Every live worker except the one that sent the frame.
    ExcludeOrigin,
}

/// Configuration for the bus runtime.
///
/// ## Field semantics
/// - `channel_capacity`: ring buffer size of each in-memory broadcast channel (min 1)
/// - `relay`: fan-out policy for worker-originated frames
#[derive(Clone, Debug)]
pub struct Config {
    /// Capacity of each broadcast channel created by the in-memory transport.
    ///
    /// Slow receivers that lag behind more than `channel_capacity` frames skip
    /// the oldest ones (logged as a warning). Minimum value is 1.
    pub channel_capacity: usize,

    /// Fan-out policy applied by the coordinator relay.
    pub relay: RelayPolicy,
}

impl Config {
    /// Returns a channel capacity clamped to a minimum of 1.
    #[inline]
    pub fn channel_capacity_clamped(&self) -> usize {
        self.channel_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `channel_capacity = 1024`
    /// - `relay = RelayPolicy::Broadcast`
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
            relay: RelayPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_capacity_is_clamped() {
        let cfg = Config {
            channel_capacity: 0,
            ..Config::default()
        };
        assert_eq!(cfg.channel_capacity_clamped(), 1);
    }

    #[test]
    fn test_default_relay_includes_origin() {
        assert_eq!(Config::default().relay, RelayPolicy::Broadcast);
    }
}
