//! The propagation engine: bounded BFS with hop decay and saturation.
//!
//! Expansion is level by level from the origin region. A neighbor at BFS
//! depth `d` is admitted iff `d <= max_hops` and the stream draw lands
//! under `base_probability * decay(d) * saturation_factor`. The origin is
//! always admitted. Every considered region joins the visited set, admitted
//! or not, so a single call can never revisit or cycle.
//!
//! Determinism: the same seed, neighbor graph, and saturation state always
//! yield the same admissions and the same hop counts.

use std::collections::{BTreeMap, HashSet, VecDeque};

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use world_runtime::DecayCurve;
use world_schema::SpreadKind;

use crate::saturation::SaturationLedger;

/// The regions admitted by one propagation call, with their BFS depths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropagationOutcome {
    pub origin: u64,
    /// `(region, depth)` pairs in admission order; the origin is first at
    /// depth zero.
    pub admitted: Vec<(u64, u32)>,
}

impl PropagationOutcome {
    pub fn max_depth(&self) -> u32 {
        self.admitted.iter().map(|(_, d)| *d).max().unwrap_or(0)
    }

    pub fn regions(&self) -> impl Iterator<Item = u64> + '_ {
        self.admitted.iter().map(|(region, _)| *region)
    }
}

#[allow(clippy::too_many_arguments)]
pub fn propagate(
    origin: u64,
    base_probability: f32,
    max_hops: u32,
    kind: SpreadKind,
    graph: &BTreeMap<u64, Vec<u64>>,
    saturation: &SaturationLedger,
    curve: DecayCurve,
    rng: &mut ChaCha8Rng,
) -> PropagationOutcome {
    let mut visited: HashSet<u64> = HashSet::new();
    let mut admitted = Vec::new();
    let mut frontier: VecDeque<(u64, u32)> = VecDeque::new();

    visited.insert(origin);
    admitted.push((origin, 0));
    saturation.increment(origin, kind);
    frontier.push_back((origin, 0));

    while let Some((region, depth)) = frontier.pop_front() {
        if depth >= max_hops {
            continue;
        }
        let next_depth = depth + 1;
        let Some(neighbors) = graph.get(&region) else {
            continue;
        };
        for &neighbor in neighbors {
            if !visited.insert(neighbor) {
                continue;
            }
            let effective = base_probability
                * curve.factor(next_depth)
                * saturation.factor(neighbor, kind);
            if rng.gen::<f32>() < effective {
                admitted.push((neighbor, next_depth));
                saturation.increment(neighbor, kind);
                frontier.push_back((neighbor, next_depth));
            }
        }
    }

    tracing::trace!(
        target: "everwilds::propagation",
        origin,
        admitted = admitted.len(),
        max_depth = admitted.iter().map(|(_, d)| *d).max().unwrap_or(0),
        "propagation.complete"
    );

    PropagationOutcome { origin, admitted }
}

/// Build a linear chain graph, mostly useful in tests and tools.
pub fn linear_graph(nodes: u64) -> BTreeMap<u64, Vec<u64>> {
    let mut graph = BTreeMap::new();
    for node in 0..nodes {
        let mut neighbors = Vec::with_capacity(2);
        if node > 0 {
            neighbors.push(node - 1);
        }
        if node + 1 < nodes {
            neighbors.push(node + 1);
        }
        graph.insert(node, neighbors);
    }
    graph
}
