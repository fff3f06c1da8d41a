use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use adventure_core::{harvest_node, ActionPipeline};
use serde_json::json;
use world_runtime::{ActionEnvelope, ActionKind};
use world_schema::{ResourceNodeState, ResourceType, TileCoord};

fn harvest(id: String, node: &str, ts: u64) -> ActionEnvelope {
    ActionEnvelope::new(id, "alia", ActionKind::Harvest, ts)
        .with_param("resource_node_id", json!(node))
}

#[test]
fn hundred_harvests_on_one_node_serialize_and_drain() {
    let pipeline = ActionPipeline::new();
    for i in 0..100u64 {
        pipeline.submit(harvest(format!("a{i:03}"), "node_123", i));
    }

    // A finite node: 100 units, no regen. Ten workers contend on it.
    let node = Mutex::new(ResourceNodeState {
        id: "node_123".into(),
        kind: ResourceType::Herbs,
        position: TileCoord::new(0, 0),
        r_max: 100.0,
        regen_rate: 0.0,
        current: 100.0,
    });
    let in_flight = AtomicUsize::new(0);
    let overlaps = AtomicUsize::new(0);
    let harvested = Mutex::new(0.0f64);

    let report = pipeline.dispatch_pending(10, |_action| {
        if in_flight.fetch_add(1, Ordering::SeqCst) != 0 {
            overlaps.fetch_add(1, Ordering::SeqCst);
        }
        let taken = harvest_node(&mut node.lock().expect("node lock"), 2.0);
        *harvested.lock().expect("harvest total") += taken;
        in_flight.fetch_sub(1, Ordering::SeqCst);
    });

    assert_eq!(report.completed.len(), 100, "the queue must drain fully");
    assert_eq!(pipeline.pending_len(), 0);
    assert_eq!(
        overlaps.load(Ordering::SeqCst),
        0,
        "same-resource actions must be serialized"
    );

    let total = *harvested.lock().expect("harvest total");
    assert_eq!(total, 100.0, "successes are bounded by the node's stock");
    assert_eq!(node.lock().expect("node lock").current, 0.0);
    assert!(pipeline.latency().p95().is_some());
}

#[test]
fn two_nodes_split_the_worker_pool() {
    let pipeline = ActionPipeline::new();
    for i in 0..50u64 {
        pipeline.submit(harvest(format!("a{i:03}"), "node_a", i));
        pipeline.submit(harvest(format!("b{i:03}"), "node_b", i));
    }
    let handled = AtomicUsize::new(0);
    let report = pipeline.dispatch_pending(10, |_| {
        handled.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(report.completed.len(), 100);
    assert_eq!(handled.load(Ordering::SeqCst), 100);
}

#[test]
fn latency_telemetry_tracks_the_burst() {
    let pipeline = ActionPipeline::new();
    for i in 0..100u64 {
        pipeline.submit(harvest(format!("a{i:03}"), format!("node_{}", i % 10).as_str(), i));
    }
    pipeline.dispatch_pending(10, |_| {
        std::thread::sleep(std::time::Duration::from_micros(100));
    });
    let average = pipeline.latency().average().expect("average latency");
    let p95 = pipeline.latency().p95().expect("p95 latency");
    assert!(p95 >= average);
    assert!(
        p95 <= std::time::Duration::from_millis(50),
        "p95 {p95:?} exceeds 50 ms on a 100-action burst"
    );
}
