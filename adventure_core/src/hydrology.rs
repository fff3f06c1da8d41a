//! River carving, the fourth worldgen stage.
//!
//! Candidate sources sit at elevation >= 0.6 and pass a stream-derived
//! acceptance draw. From each source the walk steps to the strictly lowest
//! 4-neighbor until it enters an ocean tile (elevation < 0.2) or runs out
//! of downhill options, which flags a closed basin and stamps a lake.
//! Paths shorter than the minimum are discarded; accepted sources keep a
//! minimum pairwise separation to avoid clustering. Exhausted candidates
//! simply yield fewer rivers.

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use world_schema::{Biome, River, TileCoord};

use crate::heightfield::ElevationField;

/// Elevation at or above which a tile can source a river.
pub const RIVER_SOURCE_MIN_ELEVATION: f32 = 0.6;
/// Elevation strictly below which a tile terminates a river into the ocean.
pub const OCEAN_TERMINUS_ELEVATION: f32 = 0.2;
/// Shortest accepted river path, in tiles.
pub const RIVER_MIN_LENGTH: usize = 6;

#[derive(Debug, Clone, Copy)]
pub struct HydrologyConfig {
    /// Acceptance probability per qualifying source candidate.
    pub source_acceptance: f32,
    /// Minimum Euclidean distance between accepted sources.
    pub source_separation: f32,
}

impl Default for HydrologyConfig {
    fn default() -> Self {
        Self {
            source_acceptance: 0.35,
            source_separation: 8.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Terminus {
    Ocean,
    Basin,
}

/// Carve rivers over the elevation field. Closed-basin termini stamp
/// [`Biome::Lake`] onto dry tiles in the biome grid.
pub fn carve_rivers(
    elevation: &ElevationField,
    biomes: &mut [Biome],
    config: &HydrologyConfig,
    rng: &mut ChaCha8Rng,
) -> Vec<River> {
    let width = elevation.width;
    let height = elevation.height;
    let mut rivers = Vec::new();
    let mut sources: Vec<TileCoord> = Vec::new();

    for y in 0..height {
        for x in 0..width {
            let tile = TileCoord::new(x, y);
            if elevation.sample(x, y) < RIVER_SOURCE_MIN_ELEVATION {
                continue;
            }
            // One acceptance draw per qualifying candidate keeps the stream
            // aligned regardless of what earlier candidates produced.
            if rng.gen::<f32>() >= config.source_acceptance {
                continue;
            }
            if sources
                .iter()
                .any(|s| s.euclidean_distance(tile) < config.source_separation)
            {
                continue;
            }

            let (path, terminus) = trace_downhill(elevation, tile);
            if path.len() < RIVER_MIN_LENGTH {
                continue;
            }

            let is_lake = terminus == Terminus::Basin;
            let end = *path.last().unwrap_or(&tile);
            if is_lake {
                let idx = end.index(width);
                if !biomes[idx].is_water() {
                    biomes[idx] = Biome::Lake;
                }
            }

            sources.push(tile);
            rivers.push(River {
                id: rivers.len() as u32,
                source: tile,
                terminus: end,
                path,
                is_lake,
            });
        }
    }

    tracing::debug!(
        target: "everwilds::worldgen",
        rivers = rivers.len(),
        lakes = rivers.iter().filter(|r| r.is_lake).count(),
        "worldgen.hydrology.carved"
    );

    rivers
}

/// Walk strictly downhill from `start`. The walk cannot cycle because every
/// step decreases elevation.
fn trace_downhill(elevation: &ElevationField, start: TileCoord) -> (Vec<TileCoord>, Terminus) {
    let mut path = vec![start];
    let mut current = start;

    loop {
        let current_elev = elevation.sample(current.x, current.y);
        if current_elev < OCEAN_TERMINUS_ELEVATION {
            return (path, Terminus::Ocean);
        }

        let mut next: Option<(TileCoord, f32)> = None;
        for (nx, ny) in neighbors4(current, elevation.width, elevation.height) {
            let neighbor_elev = elevation.sample(nx, ny);
            if neighbor_elev < current_elev {
                match next {
                    Some((_, best)) if neighbor_elev >= best => {}
                    _ => next = Some((TileCoord::new(nx, ny), neighbor_elev)),
                }
            }
        }

        match next {
            Some((tile, _)) => {
                path.push(tile);
                current = tile;
            }
            None => return (path, Terminus::Basin),
        }
    }
}

fn neighbors4(tile: TileCoord, width: u32, height: u32) -> impl Iterator<Item = (u32, u32)> {
    let mut out = Vec::with_capacity(4);
    if tile.x > 0 {
        out.push((tile.x - 1, tile.y));
    }
    if tile.x + 1 < width {
        out.push((tile.x + 1, tile.y));
    }
    if tile.y > 0 {
        out.push((tile.x, tile.y - 1));
    }
    if tile.y + 1 < height {
        out.push((tile.x, tile.y + 1));
    }
    out.into_iter()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_field() -> ElevationField {
        // A single ridge at the top of the map draining straight south into
        // an ocean row.
        let width = 5u32;
        let height = 9u32;
        let mut values = Vec::new();
        for y in 0..height {
            let elev = 0.95 - y as f32 * 0.1;
            for _ in 0..width {
                values.push(elev.max(0.05));
            }
        }
        ElevationField::new(width, height, values)
    }

    #[test]
    fn traced_paths_are_downhill_monotone() {
        let field = ramp_field();
        let (path, terminus) = trace_downhill(&field, TileCoord::new(2, 0));
        assert_eq!(terminus, Terminus::Ocean);
        for pair in path.windows(2) {
            assert!(
                field.sample_tile(pair[0]) >= field.sample_tile(pair[1]),
                "uphill step {:?} -> {:?}",
                pair[0],
                pair[1]
            );
            assert_eq!(pair[0].manhattan_distance(pair[1]), 1, "path not 4-connected");
        }
    }

    #[test]
    fn a_pit_terminates_as_a_basin() {
        let width = 5u32;
        let height = 5u32;
        let mut values = vec![0.9f32; 25];
        values[(2 * width + 2) as usize] = 0.5;
        values[(1 * width + 2) as usize] = 0.7;
        let field = ElevationField::new(width, height, values);
        let (path, terminus) = trace_downhill(&field, TileCoord::new(2, 1));
        assert_eq!(terminus, Terminus::Basin);
        assert_eq!(path.last(), Some(&TileCoord::new(2, 2)));
    }

    #[test]
    fn short_paths_are_rejected_and_lakes_are_stamped() {
        let field = ramp_field();
        let mut biomes = vec![Biome::Grassland; 45];
        let mut rng = crate::rng::StreamFactory::new(7).stream(crate::rng::domains::WORLDGEN_RIVERS, 0);
        let config = HydrologyConfig {
            source_acceptance: 1.0,
            source_separation: 1.0,
        };
        let rivers = carve_rivers(&field, &mut biomes, &config, &mut rng);
        assert!(!rivers.is_empty());
        for river in &rivers {
            assert!(river.length() >= RIVER_MIN_LENGTH);
            assert!(field.sample_tile(river.source) >= RIVER_SOURCE_MIN_ELEVATION);
            assert!(!river.is_lake, "ramp drains to the ocean row");
        }
    }

    #[test]
    fn source_separation_thins_clusters() {
        let field = ramp_field();
        let mut biomes = vec![Biome::Grassland; 45];
        let mut rng = crate::rng::StreamFactory::new(7).stream(crate::rng::domains::WORLDGEN_RIVERS, 0);
        let config = HydrologyConfig {
            source_acceptance: 1.0,
            source_separation: 100.0,
        };
        let rivers = carve_rivers(&field, &mut biomes, &config, &mut rng);
        assert_eq!(rivers.len(), 1);
    }
}
