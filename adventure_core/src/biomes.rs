//! Climate derivation and biome assignment, the third worldgen stage.
//!
//! Temperature follows the latitude band with a noise perturbation;
//! moisture is pure fbm noise. Assignment is a deterministic function of
//! `(elevation, temperature, moisture)`. Lake and volcanic tiles are
//! stamped later by river carving and feature placement.

use bevy::prelude::Resource;

use world_schema::Biome;

use crate::heightfield::{fbm_noise, ElevationField};

/// Per-tile temperature and moisture in `[0, 1]`.
#[derive(Resource, Debug, Clone)]
pub struct ClimateFields {
    pub width: u32,
    pub height: u32,
    pub temperature: Vec<f32>,
    pub moisture: Vec<f32>,
}

impl ClimateFields {
    #[inline]
    pub fn temperature_at(&self, x: u32, y: u32) -> f32 {
        self.temperature[(y * self.width + x) as usize]
    }

    #[inline]
    pub fn moisture_at(&self, x: u32, y: u32) -> f32 {
        self.moisture[(y * self.width + x) as usize]
    }
}

pub fn derive_climate(width: u32, height: u32, noise_seed: u32) -> ClimateFields {
    let mut temperature = Vec::with_capacity((width * height) as usize);
    let mut moisture = Vec::with_capacity((width * height) as usize);

    for y in 0..height {
        // Equator at the vertical midpoint, poles at the edges.
        let band = 1.0 - (2.0 * y as f32 / height.max(1) as f32 - 1.0).abs();
        for x in 0..width {
            let nx = x as f32 / width.max(1) as f32;
            let ny = y as f32 / height.max(1) as f32;
            let temp_noise = fbm_noise(nx * 4.0, ny * 4.0, 3, 2.0, 0.5, noise_seed);
            let moist_noise = fbm_noise(
                nx * 5.0,
                ny * 5.0,
                3,
                2.1,
                0.5,
                noise_seed.wrapping_add(0x85EB_CA6B),
            );
            temperature.push((band * 0.85 + (temp_noise - 0.5) * 0.3).clamp(0.0, 1.0));
            moisture.push(moist_noise.clamp(0.0, 1.0));
        }
    }

    ClimateFields {
        width,
        height,
        temperature,
        moisture,
    }
}

/// The biome table. Evaluated top to bottom; the first match wins.
pub fn classify_biome(elevation: f32, temperature: f32, moisture: f32) -> Biome {
    if elevation < 0.2 {
        Biome::Ocean
    } else if elevation >= 0.9 {
        Biome::Mountain
    } else if elevation >= 0.7 {
        Biome::Hills
    } else if temperature < 0.2 {
        Biome::Tundra
    } else if temperature < 0.35 {
        Biome::Taiga
    } else if temperature > 0.75 && moisture < 0.25 {
        Biome::Desert
    } else if temperature > 0.7 && moisture > 0.7 {
        Biome::Jungle
    } else if temperature > 0.65 && moisture < 0.5 {
        Biome::Savanna
    } else if moisture > 0.75 {
        Biome::Swamp
    } else if moisture > 0.45 {
        Biome::Forest
    } else {
        Biome::Grassland
    }
}

pub fn assign_biomes(elevation: &ElevationField, climate: &ClimateFields) -> Vec<Biome> {
    let mut biomes = Vec::with_capacity((elevation.width * elevation.height) as usize);
    for y in 0..elevation.height {
        for x in 0..elevation.width {
            biomes.push(classify_biome(
                elevation.sample(x, y),
                climate.temperature_at(x, y),
                climate.moisture_at(x, y),
            ));
        }
    }
    biomes
}
