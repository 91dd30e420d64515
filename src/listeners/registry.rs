//! # Listener registry with snapshot-per-pass dispatch.
//!
//! [`ListenerRegistry`] maps an [`EventKey`] to an ordered sequence of listeners.
//!
//! ## Rules
//! - **Insertion order**: listeners under one key run in the order they were added
//! - **No dedup**: the same handler added twice runs twice
//! - **Snapshot**: a dispatch pass iterates the sequence as it was when the pass
//!   began; listeners added during the pass first run on the next pass
//! - **Removal is immediate**: a removed listener never runs again, including
//!   later in a pass that is already in progress
//! - **Panic isolation**: a panicking listener is logged and the pass continues
//!
//! ## Example
//! ```
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use clusterbus::{EventKey, Listener, ListenerRegistry, handler};
//! use serde_json::json;
//!
//! let hits = Arc::new(AtomicUsize::new(0));
//! let h = {
//!     let hits = hits.clone();
//!     handler(move |_| { hits.fetch_add(1, Ordering::SeqCst); })
//! };
//!
//! let reg = ListenerRegistry::new();
//! reg.subscribe(EventKey::specific("ping"), Listener::Typed(h.clone()));
//! reg.dispatch(&EventKey::specific("ping"), "ping", &json!(1));
//! reg.unsubscribe(&EventKey::specific("ping"), &Listener::Typed(h));
//! reg.dispatch(&EventKey::specific("ping"), "ping", &json!(2));
//!
//! assert_eq!(hits.load(Ordering::SeqCst), 1);
//! ```

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde_json::Value;
use tracing::warn;

use super::listener::{Listener, ListenerId};
use crate::envelope::EventKey;

/// One registration.
struct Entry {
    id: ListenerId,
    listener: Listener,
    /// Cleared on removal; checked before every invocation.
    live: AtomicBool,
}

impl Entry {
    fn retire(&self) {
        self.live.store(false, Ordering::Release);
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }
}

/// Per-bus mapping from event key to an ordered listener sequence.
///
/// The lock is never held while a listener runs, so listeners may subscribe or
/// unsubscribe from inside their own invocation.
#[derive(Default)]
pub struct ListenerRegistry {
    entries: Mutex<HashMap<EventKey, Vec<Arc<Entry>>>>,
}

impl ListenerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `listener` to the sequence for `key` and returns its handle.
    pub fn subscribe(&self, key: EventKey, listener: Listener) -> ListenerId {
        let id = ListenerId::next();
        let entry = Arc::new(Entry {
            id,
            listener,
            live: AtomicBool::new(true),
        });
        self.entries.lock().entry(key).or_default().push(entry);
        id
    }

    /// Removes every entry under `key` that is reference-equal to `listener`.
    ///
    /// Returns the number of removed entries; removing an unknown listener is a no-op.
    pub fn unsubscribe(&self, key: &EventKey, listener: &Listener) -> usize {
        self.remove_where(Some(key), |e| e.listener.same(listener))
    }

    /// Removes the single entry created by the subscribe call that returned `id`.
    pub fn remove(&self, id: ListenerId) -> bool {
        self.remove_where(None, |e| e.id == id) > 0
    }

    /// Invokes, in insertion order, the listeners registered under `key` when
    /// the call began. Returns how many listeners ran.
    pub fn dispatch(&self, key: &EventKey, event_type: &str, data: &Value) -> usize {
        let snapshot: Vec<Arc<Entry>> = match self.entries.lock().get(key) {
            Some(seq) => seq.clone(),
            None => return 0,
        };

        let mut ran = 0;
        for entry in snapshot {
            if !entry.is_live() {
                continue;
            }
            ran += 1;
            let call = AssertUnwindSafe(|| entry.listener.call(event_type, data));
            if let Err(panic_err) = catch_unwind(call) {
                let info = if let Some(msg) = panic_err.downcast_ref::<&'static str>() {
                    (*msg).to_string()
                } else if let Some(msg) = panic_err.downcast_ref::<String>() {
                    msg.clone()
                } else {
                    "unknown panic".to_string()
                };
                warn!(key = %key, event_type, info = %info, "listener panicked");
            }
        }
        ran
    }

    /// Removes and retires every entry.
    pub fn clear(&self) {
        let drained: Vec<Arc<Entry>> = {
            let mut entries = self.entries.lock();
            entries.drain().flat_map(|(_, seq)| seq).collect()
        };
        for entry in drained {
            entry.retire();
        }
    }

    /// Number of listeners registered under `key`.
    pub fn count(&self, key: &EventKey) -> usize {
        self.entries.lock().get(key).map_or(0, Vec::len)
    }

    /// Total number of registered listeners.
    pub fn len(&self) -> usize {
        self.entries.lock().values().map(Vec::len).sum()
    }

    /// Returns `true` if no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn remove_where<F>(&self, key: Option<&EventKey>, pred: F) -> usize
    where
        F: Fn(&Entry) -> bool,
    {
        let mut removed = Vec::new();
        {
            let mut entries = self.entries.lock();
            entries.retain(|k, seq| {
                if key.is_some_and(|want| want != k) {
                    return true;
                }
                seq.retain(|e| {
                    if pred(e) {
                        removed.push(Arc::clone(e));
                        false
                    } else {
                        true
                    }
                });
                !seq.is_empty()
            });
        }
        for entry in &removed {
            entry.retire();
        }
        removed.len()
    }
}
