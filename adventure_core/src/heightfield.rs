//! Elevation synthesis, the second worldgen stage.
//!
//! Each tile takes its owning plate's type baseline, a couple of octaves of
//! seeded value noise, and the aggregated collision uplift of its plate
//! boundary, then the whole field is min/max normalised into `[0, 1]`.
//! Synthesis is per-tile pure (hash-derived noise, no sequential stream
//! draws), so rows are computed in parallel without affecting determinism.

use bevy::prelude::Resource;
use rayon::prelude::*;

use world_schema::TileCoord;

use crate::plates::PlateLayout;

/// Dense row-major elevation field in `[0, 1]`.
#[derive(Resource, Debug, Clone, PartialEq)]
pub struct ElevationField {
    pub width: u32,
    pub height: u32,
    values: Vec<f32>,
}

impl ElevationField {
    pub fn new(width: u32, height: u32, values: Vec<f32>) -> Self {
        debug_assert_eq!(values.len(), (width * height) as usize);
        Self {
            width,
            height,
            values,
        }
    }

    #[inline]
    pub fn sample(&self, x: u32, y: u32) -> f32 {
        debug_assert!(x < self.width && y < self.height);
        self.values[(y * self.width + x) as usize]
    }

    #[inline]
    pub fn sample_tile(&self, tile: TileCoord) -> f32 {
        self.sample(tile.x, tile.y)
    }

    pub fn get(&self, x: u32, y: u32) -> Option<f32> {
        if x < self.width && y < self.height {
            Some(self.values[(y * self.width + x) as usize])
        } else {
            None
        }
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn into_values(self) -> Vec<f32> {
        self.values
    }
}

/// Relative weight of noise against the plate baseline.
const NOISE_AMPLITUDE: f32 = 0.22;
/// Scale applied to boundary collision intensity.
const UPLIFT_GAIN: f32 = 1.4;

pub fn synthesize_elevation(
    width: u32,
    height: u32,
    layout: &PlateLayout,
    noise_seed: u32,
) -> ElevationField {
    let w = width as usize;
    let mut values = vec![0.0f32; w * height as usize];

    values
        .par_chunks_mut(w)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, value) in row.iter_mut().enumerate() {
                *value = tile_elevation(x as u32, y as u32, width, height, layout, noise_seed);
            }
        });

    normalise_field(values, width, height)
}

fn tile_elevation(
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    layout: &PlateLayout,
    noise_seed: u32,
) -> f32 {
    let idx = (y * width + x) as usize;
    let owner_id = layout.owner[idx];
    let owner = &layout.plates[owner_id as usize];

    let nx = x as f32 / width.max(1) as f32;
    let ny = y as f32 / height.max(1) as f32;
    let noise = fbm_noise(nx * 6.0, ny * 6.0, 4, 2.0, 0.5, noise_seed);

    // Boundary proximity against the second-nearest plate: 0 far inside the
    // cell, 1 on the Voronoi edge.
    let mut d_owner = f32::MAX;
    let mut d_second = f32::MAX;
    let mut second_id = owner_id;
    for plate in &layout.plates {
        let dx = plate.center.x as f32 - x as f32;
        let dy = plate.center.y as f32 - y as f32;
        let dist = (dx * dx + dy * dy).sqrt();
        if plate.id == owner_id {
            d_owner = dist;
        } else if dist < d_second {
            d_second = dist;
            second_id = plate.id;
        }
    }
    let uplift = if second_id != owner_id && d_second < f32::MAX {
        let margin = ((d_second - d_owner) / (d_second + d_owner + f32::EPSILON)).clamp(0.0, 1.0);
        let proximity = (1.0 - margin).powi(2);
        layout.collision_intensity(owner_id, second_id) * proximity
    } else {
        0.0
    };

    owner.kind.baseline_elevation() + (noise - 0.5) * 2.0 * NOISE_AMPLITUDE + uplift * UPLIFT_GAIN
}

fn normalise_field(values: Vec<f32>, width: u32, height: u32) -> ElevationField {
    let mut min_v = f32::MAX;
    let mut max_v = f32::MIN;
    for &v in &values {
        min_v = min_v.min(v);
        max_v = max_v.max(v);
    }
    let range = max_v - min_v;
    let mut normalised = values;
    if range.abs() < f32::EPSILON {
        for v in &mut normalised {
            *v = v.clamp(0.0, 1.0);
        }
    } else {
        for v in &mut normalised {
            *v = ((*v - min_v) / range).clamp(0.0, 1.0);
        }
    }
    ElevationField::new(width, height, normalised)
}

pub(crate) fn fbm_noise(x: f32, y: f32, octaves: u32, lacunarity: f32, gain: f32, seed: u32) -> f32 {
    let mut frequency = 1.0;
    let mut amplitude = 1.0;
    let mut sum = 0.0;
    let mut normaliser = 0.0;
    for i in 0..octaves {
        let s = seed.wrapping_add(i.wrapping_mul(0x9E37_79B9));
        sum += value_noise(x * frequency, y * frequency, s) * amplitude;
        normaliser += amplitude;
        frequency *= lacunarity;
        amplitude *= gain;
    }
    (sum / normaliser).clamp(0.0, 1.0)
}

fn value_noise(x: f32, y: f32, seed: u32) -> f32 {
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let xf = x - x0 as f32;
    let yf = y - y0 as f32;

    let v00 = hash2(x0, y0, seed);
    let v10 = hash2(x0 + 1, y0, seed);
    let v01 = hash2(x0, y0 + 1, seed);
    let v11 = hash2(x0 + 1, y0 + 1, seed);

    let i1 = lerp(v00, v10, smooth_step(xf));
    let i2 = lerp(v01, v11, smooth_step(xf));
    lerp(i1, i2, smooth_step(yf))
}

fn smooth_step(t: f32) -> f32 {
    t * t * (3.0 - 2.0 * t)
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

fn hash2(x: i32, y: i32, seed: u32) -> f32 {
    let mut n = x as u32;
    n = n.wrapping_mul(0x6C8E_9CF5) ^ (y as u32).wrapping_mul(0xB529_7A4D) ^ seed;
    n ^= n >> 13;
    n = n.wrapping_mul(0x1B56_C4E9);
    n ^= n >> 11;
    ((n >> 8) & 0xFFFF) as f32 / 65535.0
}
