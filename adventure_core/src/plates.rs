//! Tectonic plate generation, the first worldgen stage.
//!
//! Plate centers are sampled uniformly over the grid, drift vectors land in
//! `[-0.5, 0.5]^2`, and the continental/oceanic split is a 70/30 Bernoulli
//! draw. Ownership is the Voronoi partition by nearest center, so every
//! tile belongs to exactly one plate.

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use world_schema::{Plate, PlateType, TileCoord};

/// A converging plate pair and the uplift it contributes at their boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlateCollision {
    pub a: u32,
    pub b: u32,
    /// `min(0.25, max(0, rel_drift . dir)^2 / 4)`.
    pub intensity: f32,
}

/// Full plate stage output consumed by elevation synthesis.
#[derive(Debug, Clone)]
pub struct PlateLayout {
    pub plates: Vec<Plate>,
    /// Row-major owning plate id per tile.
    pub owner: Vec<u32>,
    pub collisions: Vec<PlateCollision>,
}

impl PlateLayout {
    pub fn collision_intensity(&self, a: u32, b: u32) -> f32 {
        self.collisions
            .iter()
            .find(|c| (c.a == a && c.b == b) || (c.a == b && c.b == a))
            .map(|c| c.intensity)
            .unwrap_or(0.0)
    }
}

/// Expected tiles per plate; the plate count is `max(4, area / density)`.
pub const DEFAULT_PLATE_DENSITY: u32 = 1_024;

/// Probability that a sampled plate is continental.
const CONTINENTAL_RATIO: f32 = 0.7;

pub fn generate_plates(
    width: u32,
    height: u32,
    plate_density: u32,
    rng: &mut ChaCha8Rng,
) -> PlateLayout {
    let area = width * height;
    let count = (area / plate_density.max(1)).max(4);

    let mut plates = Vec::with_capacity(count as usize);
    for id in 0..count {
        let center = sample_distinct_center(width, height, &plates, rng);
        let drift = (rng.gen_range(-0.5..=0.5), rng.gen_range(-0.5..=0.5));
        let kind = if rng.gen::<f32>() < CONTINENTAL_RATIO {
            PlateType::Continental
        } else {
            PlateType::Oceanic
        };
        plates.push(Plate {
            id,
            center,
            drift,
            kind,
            owned_tiles: Vec::new(),
        });
    }

    let owner = assign_ownership(width, height, &mut plates);
    let collisions = detect_collisions(&plates);

    tracing::debug!(
        target: "everwilds::worldgen",
        plates = plates.len(),
        collisions = collisions.len(),
        continental = plates
            .iter()
            .filter(|p| p.kind == PlateType::Continental)
            .count(),
        "worldgen.plates.generated"
    );

    PlateLayout {
        plates,
        owner,
        collisions,
    }
}

fn sample_distinct_center(
    width: u32,
    height: u32,
    existing: &[Plate],
    rng: &mut ChaCha8Rng,
) -> TileCoord {
    // Bounded retry; on a pathologically tiny grid a duplicate center is
    // tolerable and only merges two Voronoi cells.
    for _ in 0..32 {
        let candidate = TileCoord::new(rng.gen_range(0..width), rng.gen_range(0..height));
        if existing.iter().all(|p| p.center != candidate) {
            return candidate;
        }
    }
    TileCoord::new(rng.gen_range(0..width), rng.gen_range(0..height))
}

fn assign_ownership(width: u32, height: u32, plates: &mut [Plate]) -> Vec<u32> {
    let mut owner = vec![0u32; (width * height) as usize];
    for y in 0..height {
        for x in 0..width {
            let tile = TileCoord::new(x, y);
            let mut best = 0u32;
            let mut best_dist = u64::MAX;
            for plate in plates.iter() {
                let dx = plate.center.x.abs_diff(x) as u64;
                let dy = plate.center.y.abs_diff(y) as u64;
                let dist = dx * dx + dy * dy;
                // Strict improvement keeps ties on the lowest plate id.
                if dist < best_dist {
                    best_dist = dist;
                    best = plate.id;
                }
            }
            owner[tile.index(width)] = best;
            plates[best as usize].owned_tiles.push(tile);
        }
    }
    owner
}

fn detect_collisions(plates: &[Plate]) -> Vec<PlateCollision> {
    let mut collisions = Vec::new();
    for (i, a) in plates.iter().enumerate() {
        for b in plates.iter().skip(i + 1) {
            if let Some(intensity) = collision_intensity(a, b) {
                collisions.push(PlateCollision {
                    a: a.id,
                    b: b.id,
                    intensity,
                });
            }
        }
    }
    collisions
}

/// Two plates collide iff the projection of their relative drift onto the
/// center-to-center direction is strictly positive (they are closing).
fn collision_intensity(a: &Plate, b: &Plate) -> Option<f32> {
    let dir_x = b.center.x as f32 - a.center.x as f32;
    let dir_y = b.center.y as f32 - a.center.y as f32;
    let length = (dir_x * dir_x + dir_y * dir_y).sqrt();
    if length <= f32::EPSILON {
        return None;
    }
    let rel_x = a.drift.0 - b.drift.0;
    let rel_y = a.drift.1 - b.drift.1;
    let closing = (rel_x * dir_x + rel_y * dir_y) / length;
    if closing > 0.0 {
        Some((closing * closing / 4.0).min(0.25))
    } else {
        None
    }
}
