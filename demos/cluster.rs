//! # Demo: cluster
//!
//! Simulates a coordinator and three workers in one process and shows how an
//! event published by one worker reaches every process.
//!
//! ## Flow
//! ```text
//! worker-1 Bus::publish("job.done")
//!     └─► coordinator Relay
//!           ├─► worker-1, worker-2, worker-3 dispatchers
//!           └─► coordinator dispatcher (+ LogListener with `--features logging`)
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example cluster
//! ```

use std::time::Duration;

use clusterbus::{Bus, Config, MemoryCluster, Node, handler, wildcard};
use serde_json::json;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = Config::default();
    let cluster = MemoryCluster::new(&cfg);

    let coordinator = Node::new(cluster.coordinator(), cfg.clone());
    let hub = coordinator.bus(Some("jobs"));
    hub.mount()?;
    hub.subscribe_any(wildcard(|event_type, data| {
        println!("[coordinator] {event_type} {data}");
    }));

    #[cfg(feature = "logging")]
    hub.subscribe_any(clusterbus::LogListener::new(Some("jobs")).handler());

    let workers: Vec<Bus> = (0..3)
        .map(|_| {
            let transport = cluster.spawn_worker();
            let name = transport
                .id()
                .map(|id| id.to_string())
                .unwrap_or_default();
            let bus = Node::new(transport, cfg.clone()).bus(Some("jobs"));
            bus.subscribe(
                "job.done",
                handler(move |data| println!("[{name}] job.done {data}")),
            );
            bus
        })
        .collect();

    // Same transport, different namespace: never sees "jobs" traffic.
    let other = coordinator.bus(Some("metrics"));
    other.subscribe_any(wildcard(|event_type, _| {
        println!("[metrics] unexpected {event_type}");
    }));

    workers[0].publish("job.done", json!({ "id": 7, "ok": true }));
    hub.publish("job.done", json!({ "id": 8, "ok": false }));

    tokio::time::sleep(Duration::from_millis(100)).await;

    for bus in &workers {
        bus.dispose();
    }
    other.dispose();
    hub.dispose();
    Ok(())
}
