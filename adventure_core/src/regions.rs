//! Region model: the tile sub-volumes the scheduler drives, their
//! regenerating resource nodes, deterministic NPC seeding, and the region
//! adjacency graph the propagation engine reads.

use std::collections::BTreeMap;

use bevy::prelude::Resource;
use rand::Rng;

use world_schema::{
    BehaviorType, Biome, RegionSave, RegionStatus, ResourceNodeState, ResourceType, TileCoord,
    WorldContent,
};

use crate::rng::{domains, StreamFactory};

/// A rectangular world sub-volume with its own processing state.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub id: u64,
    pub center: TileCoord,
    pub width: u32,
    pub height: u32,
    pub status: RegionStatus,
    pub last_processed_tick: u64,
    pub resource_nodes: Vec<ResourceNodeState>,
    pub npc_count: u32,
    pub npc_behaviors: Vec<BehaviorType>,
}

impl Region {
    /// Half-open bounds check: `[origin, origin + extent)` on both axes.
    pub fn contains(&self, tile: TileCoord) -> bool {
        let x0 = self.center.x as i64 - (self.width / 2) as i64;
        let y0 = self.center.y as i64 - (self.height / 2) as i64;
        let x = tile.x as i64;
        let y = tile.y as i64;
        x >= x0 && x < x0 + self.width as i64 && y >= y0 && y < y0 + self.height as i64
    }

    pub fn to_save(&self) -> RegionSave {
        RegionSave {
            id: self.id,
            center: self.center,
            width: self.width,
            height: self.height,
            status: self.status,
            last_processed_tick: self.last_processed_tick,
            resource_nodes: self.resource_nodes.clone(),
            npc_count: self.npc_count,
            npc_behaviors: self.npc_behaviors.clone(),
            schema_version: world_schema::versions::REGION,
        }
    }

    pub fn from_save(save: RegionSave) -> Self {
        Self {
            id: save.id,
            center: save.center,
            width: save.width,
            height: save.height,
            status: save.status,
            last_processed_tick: save.last_processed_tick,
            resource_nodes: save.resource_nodes,
            npc_count: save.npc_count,
            npc_behaviors: save.npc_behaviors,
        }
    }
}

/// Logistic-style regeneration law:
/// `current <- min(r_max, current + regen_rate * dt * (1 - current/r_max))`.
/// Nodes with `regen_rate == 0` never regenerate. `current` is clamped on
/// every mutation.
pub fn regenerate_node(node: &mut ResourceNodeState, dt: f64) {
    if node.regen_rate <= 0.0 || node.r_max <= 0.0 {
        node.current = node.current.clamp(0.0, node.r_max.max(0.0));
        return;
    }
    let gain = node.regen_rate * dt * (1.0 - node.current / node.r_max);
    node.current = (node.current + gain).clamp(0.0, node.r_max);
}

/// Atomic harvest: returns `min(quantity, current)` and deducts it.
pub fn harvest_node(node: &mut ResourceNodeState, quantity: f64) -> f64 {
    let taken = quantity.max(0.0).min(node.current);
    node.current = (node.current - taken).clamp(0.0, node.r_max);
    taken
}

/// Registry of every region plus the adjacency graph between them.
/// Regions tile the world in a fixed grid; ids are row-major.
#[derive(Resource, Debug, Clone)]
pub struct RegionRegistry {
    regions: BTreeMap<u64, Region>,
    graph: BTreeMap<u64, Vec<u64>>,
    region_size: u32,
    columns: u32,
    rows: u32,
}

impl RegionRegistry {
    pub fn region(&self, id: u64) -> Option<&Region> {
        self.regions.get(&id)
    }

    pub fn region_mut(&mut self, id: u64) -> Option<&mut Region> {
        self.regions.get_mut(&id)
    }

    /// Regions in ascending id order, the scheduler's processing order.
    pub fn regions_mut(&mut self) -> impl Iterator<Item = &mut Region> {
        self.regions.values_mut()
    }

    pub fn regions(&self) -> impl Iterator<Item = &Region> {
        self.regions.values()
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Read-only view of the adjacency graph for propagation.
    pub fn graph(&self) -> &BTreeMap<u64, Vec<u64>> {
        &self.graph
    }

    pub fn neighbors(&self, id: u64) -> &[u64] {
        self.graph.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The region owning a tile, by grid arithmetic.
    pub fn region_at(&self, tile: TileCoord) -> Option<u64> {
        let col = tile.x / self.region_size;
        let row = tile.y / self.region_size;
        if col < self.columns && row < self.rows {
            Some(u64::from(row * self.columns + col))
        } else {
            None
        }
    }

    pub fn node_mut(&mut self, node_id: &str) -> Option<&mut ResourceNodeState> {
        self.regions
            .values_mut()
            .flat_map(|r| r.resource_nodes.iter_mut())
            .find(|n| n.id == node_id)
    }

    pub fn to_saves(&self) -> Vec<RegionSave> {
        self.regions.values().map(Region::to_save).collect()
    }

    pub fn restore(&mut self, saves: Vec<RegionSave>) {
        for save in saves {
            if let Some(region) = self.regions.get_mut(&save.id) {
                *region = Region::from_save(save);
            }
        }
    }
}

/// Partition the generated world into regions and seed their resource
/// nodes and NPC populations from per-region derived streams.
pub fn carve_regions(content: &WorldContent, region_size: u32, factory: &StreamFactory) -> RegionRegistry {
    let region_size = region_size.max(4);
    let columns = content.width.div_ceil(region_size);
    let rows = content.height.div_ceil(region_size);

    let mut regions = BTreeMap::new();
    let mut graph: BTreeMap<u64, Vec<u64>> = BTreeMap::new();

    for row in 0..rows {
        for col in 0..columns {
            let id = u64::from(row * columns + col);
            let x0 = col * region_size;
            let y0 = row * region_size;
            let width = region_size.min(content.width - x0);
            let height = region_size.min(content.height - y0);
            let center = TileCoord::new(x0 + width / 2, y0 + height / 2);

            let abundance = region_abundance(content, x0, y0, width, height);
            let dominant = dominant_biome(content, x0, y0, width, height);

            let mut node_rng = factory.stream(domains::WORLDGEN_RESOURCES, id);
            let node_count = (abundance * 3.0).round() as usize;
            let mut resource_nodes = Vec::with_capacity(node_count);
            for n in 0..node_count {
                let kinds = resource_kinds(dominant);
                let kind = kinds[node_rng.gen_range(0..kinds.len())];
                let nx = x0 + node_rng.gen_range(0..width);
                let ny = y0 + node_rng.gen_range(0..height);
                let r_max = 60.0 + node_rng.gen_range(0.0..80.0f64);
                resource_nodes.push(ResourceNodeState {
                    id: format!("node_{id}_{n}"),
                    kind,
                    position: TileCoord::new(nx, ny),
                    r_max,
                    regen_rate: 0.5 + f64::from(abundance) * 1.5,
                    current: r_max * (0.3 + node_rng.gen_range(0.0..0.5f64)),
                });
            }

            let mut npc_rng = factory.stream(domains::WORLDGEN_NPCS, id);
            let npc_count = (abundance * 6.0).round() as u32;
            let behaviors = [
                BehaviorType::Passive,
                BehaviorType::Defensive,
                BehaviorType::Aggressive,
                BehaviorType::Skittish,
                BehaviorType::Merchant,
            ];
            let npc_behaviors = (0..npc_count)
                .map(|_| behaviors[npc_rng.gen_range(0..behaviors.len())])
                .collect();

            regions.insert(
                id,
                Region {
                    id,
                    center,
                    width,
                    height,
                    status: RegionStatus::Active,
                    last_processed_tick: 0,
                    resource_nodes,
                    npc_count,
                    npc_behaviors,
                },
            );

            let mut neighbors = Vec::with_capacity(4);
            if col > 0 {
                neighbors.push(u64::from(row * columns + col - 1));
            }
            if col + 1 < columns {
                neighbors.push(u64::from(row * columns + col + 1));
            }
            if row > 0 {
                neighbors.push(u64::from((row - 1) * columns + col));
            }
            if row + 1 < rows {
                neighbors.push(u64::from((row + 1) * columns + col));
            }
            graph.insert(id, neighbors);
        }
    }

    tracing::debug!(
        target: "everwilds::regions",
        regions = regions.len(),
        columns,
        rows,
        "regions.carved"
    );

    RegionRegistry {
        regions,
        graph,
        region_size,
        columns,
        rows,
    }
}

fn region_abundance(content: &WorldContent, x0: u32, y0: u32, width: u32, height: u32) -> f32 {
    let mut sum = 0.0;
    let mut count = 0u32;
    for y in y0..y0 + height {
        for x in x0..x0 + width {
            sum += content.biomes[(y * content.width + x) as usize].resource_abundance();
            count += 1;
        }
    }
    if count == 0 {
        0.0
    } else {
        sum / count as f32
    }
}

fn dominant_biome(content: &WorldContent, x0: u32, y0: u32, width: u32, height: u32) -> Biome {
    let mut counts: BTreeMap<Biome, u32> = BTreeMap::new();
    for y in y0..y0 + height {
        for x in x0..x0 + width {
            *counts
                .entry(content.biomes[(y * content.width + x) as usize])
                .or_default() += 1;
        }
    }
    counts
        .into_iter()
        .max_by_key(|(_, count)| *count)
        .map(|(biome, _)| biome)
        .unwrap_or(Biome::Grassland)
}

fn resource_kinds(biome: Biome) -> &'static [ResourceType] {
    match biome {
        Biome::Forest | Biome::Taiga | Biome::Jungle => {
            &[ResourceType::Wood, ResourceType::Herbs, ResourceType::Game]
        }
        Biome::Mountain | Biome::Hills | Biome::Volcanic => {
            &[ResourceType::Stone, ResourceType::IronOre, ResourceType::Crystal]
        }
        Biome::Ocean | Biome::Lake => &[ResourceType::Fish],
        Biome::Swamp => &[ResourceType::Clay, ResourceType::Herbs],
        Biome::Desert | Biome::Tundra => &[ResourceType::Stone, ResourceType::Game],
        Biome::Grassland | Biome::Savanna => {
            &[ResourceType::Game, ResourceType::Clay, ResourceType::Herbs]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worldgen::{generate_world, WorldGenConfig};

    fn registry() -> RegionRegistry {
        let content = generate_world(&WorldGenConfig::sized(64, 64, 77));
        carve_regions(&content, 16, &StreamFactory::new(77))
    }

    #[test]
    fn regeneration_approaches_but_never_exceeds_r_max() {
        let mut node = ResourceNodeState {
            id: "node_t".into(),
            kind: ResourceType::Wood,
            position: TileCoord::new(0, 0),
            r_max: 100.0,
            regen_rate: 50.0,
            current: 95.0,
        };
        for _ in 0..100 {
            regenerate_node(&mut node, 1.0);
            assert!(node.current <= 100.0);
        }
        assert_eq!(node.current, 100.0);
    }

    #[test]
    fn zero_regen_nodes_never_recover() {
        let mut node = ResourceNodeState {
            id: "node_t".into(),
            kind: ResourceType::Stone,
            position: TileCoord::new(0, 0),
            r_max: 50.0,
            regen_rate: 0.0,
            current: 10.0,
        };
        regenerate_node(&mut node, 1_000.0);
        assert_eq!(node.current, 10.0);
    }

    #[test]
    fn harvest_is_clamped_to_availability() {
        let mut node = ResourceNodeState {
            id: "node_t".into(),
            kind: ResourceType::Fish,
            position: TileCoord::new(0, 0),
            r_max: 100.0,
            regen_rate: 1.0,
            current: 30.0,
        };
        assert_eq!(harvest_node(&mut node, 20.0), 20.0);
        assert_eq!(node.current, 10.0);
        assert_eq!(harvest_node(&mut node, 50.0), 10.0);
        assert_eq!(node.current, 0.0);
        assert_eq!(harvest_node(&mut node, -5.0), 0.0);
    }

    #[test]
    fn region_grid_covers_the_world() {
        let registry = registry();
        assert_eq!(registry.len(), 16);
        for y in (0..64).step_by(7) {
            for x in (0..64).step_by(7) {
                let tile = TileCoord::new(x, y);
                let id = registry.region_at(tile).expect("tile in a region");
                assert!(registry.region(id).expect("region").contains(tile));
            }
        }
        assert_eq!(registry.region_at(TileCoord::new(64, 0)), None);
    }

    #[test]
    fn adjacency_graph_is_four_connected_and_symmetric() {
        let registry = registry();
        for (&id, neighbors) in registry.graph() {
            assert!(neighbors.len() >= 2 && neighbors.len() <= 4);
            for &n in neighbors {
                assert!(
                    registry.neighbors(n).contains(&id),
                    "edge {id} -> {n} is not symmetric"
                );
            }
        }
    }

    #[test]
    fn node_seeding_is_deterministic_per_region() {
        let a = registry();
        let b = registry();
        for (ra, rb) in a.regions().zip(b.regions()) {
            assert_eq!(ra.resource_nodes, rb.resource_nodes);
            assert_eq!(ra.npc_behaviors, rb.npc_behaviors);
        }
    }

    #[test]
    fn save_restore_round_trips_every_region_field() {
        let original = registry();
        let saves = original.to_saves();
        assert!(
            saves.iter().any(|s| !s.npc_behaviors.is_empty()),
            "seeded world should carry NPC behavior tags"
        );

        let mut restored = registry();
        // Scramble the copy so restore has real work to do.
        for region in restored.regions_mut() {
            region.last_processed_tick = 999;
            region.resource_nodes.clear();
            region.npc_behaviors.clear();
        }
        restored.restore(saves);

        for (a, b) in original.regions().zip(restored.regions()) {
            assert_eq!(a, b, "region {} lost state across save/restore", a.id);
        }
        assert_eq!(original.to_saves(), restored.to_saves());
    }
}
