use adventure_core::{domains, linear_graph, propagate, SaturationLedger, StreamFactory};
use world_runtime::DecayCurve;
use world_schema::SpreadKind;

#[test]
fn certain_event_on_a_chain_is_bounded_by_max_hops() {
    let graph = linear_graph(10);
    let ledger = SaturationLedger::default();
    let mut rng = StreamFactory::new(12_345).stream(domains::PROPAGATION_EVENT, 0);
    let outcome = propagate(
        0,
        1.0,
        2,
        SpreadKind::Event,
        &graph,
        &ledger,
        DecayCurve::Exponential,
        &mut rng,
    );
    assert!(
        outcome.admitted.len() <= 3,
        "chain propagation admitted {} regions past the 2-hop bound",
        outcome.admitted.len()
    );
    assert!(outcome.max_depth() <= 2);
}

#[test]
fn containment_holds_on_a_grid_graph() {
    // 4-neighbor grid of 5x5 regions; nodes within 2 hops of the center: 13.
    let mut graph = std::collections::BTreeMap::new();
    for y in 0..5u64 {
        for x in 0..5u64 {
            let id = y * 5 + x;
            let mut neighbors = Vec::new();
            if x > 0 {
                neighbors.push(id - 1);
            }
            if x < 4 {
                neighbors.push(id + 1);
            }
            if y > 0 {
                neighbors.push(id - 5);
            }
            if y < 4 {
                neighbors.push(id + 5);
            }
            graph.insert(id, neighbors);
        }
    }
    let ledger = SaturationLedger::default();
    let mut rng = StreamFactory::new(7).stream(domains::PROPAGATION_STORY, 0);
    let outcome = propagate(
        12,
        1.0,
        2,
        SpreadKind::Story,
        &graph,
        &ledger,
        DecayCurve::Exponential,
        &mut rng,
    );
    assert!(outcome.admitted.len() <= 13);
}

#[test]
fn saturation_blocks_further_admissions_into_a_region() {
    let graph = linear_graph(4);
    let ledger = SaturationLedger::default();
    let cap = ledger.cap(SpreadKind::Event);
    for _ in 0..cap {
        ledger.increment(1, SpreadKind::Event);
    }

    for index in 0..32 {
        let mut rng = StreamFactory::new(99).stream(domains::PROPAGATION_EVENT, index);
        let outcome = propagate(
            0,
            1.0,
            3,
            SpreadKind::Event,
            &graph,
            &ledger,
            DecayCurve::Exponential,
            &mut rng,
        );
        assert!(
            !outcome.regions().any(|r| r == 1),
            "saturated region admitted on stream {index}"
        );
    }
    assert_eq!(ledger.count(1, SpreadKind::Event), cap);
}

#[test]
fn repeat_propagation_with_shared_state_is_deterministic() {
    let graph = linear_graph(10);
    let run = || {
        let ledger = SaturationLedger::default();
        let mut rng = StreamFactory::new(2_024).stream(domains::PROPAGATION_STORY, 5);
        let outcome = propagate(
            3,
            0.8,
            4,
            SpreadKind::Story,
            &graph,
            &ledger,
            DecayCurve::Exponential,
            &mut rng,
        );
        (outcome.admitted.clone(), ledger.count(3, SpreadKind::Story))
    };
    assert_eq!(run(), run());
}
