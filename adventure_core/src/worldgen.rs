//! The worldgen pipeline orchestrator.
//!
//! Stages execute strictly in order (plates, elevation, biomes, rivers,
//! features, stories), each consuming only prior stages' outputs and its
//! own derived stream. Given the same config the pipeline produces a
//! byte-identical [`WorldContent`] and therefore the same checksum.

use bevy::prelude::Resource;

use world_schema::{world_checksum, WorldChunk, WorldContent};

use crate::{
    biomes::{assign_biomes, derive_climate},
    features::place_features,
    heightfield::{synthesize_elevation, ElevationField},
    hydrology::{carve_rivers, HydrologyConfig},
    plates::{generate_plates, DEFAULT_PLATE_DENSITY},
    rng::{domains, StreamFactory},
    story_seed::seed_stories,
};

#[derive(Debug, Clone)]
pub struct WorldGenConfig {
    pub width: u32,
    pub height: u32,
    pub seed: u64,
    pub plate_density: u32,
    pub hydrology: HydrologyConfig,
}

impl Default for WorldGenConfig {
    fn default() -> Self {
        Self {
            width: 128,
            height: 128,
            seed: 0,
            plate_density: DEFAULT_PLATE_DENSITY,
            hydrology: HydrologyConfig::default(),
        }
    }
}

impl WorldGenConfig {
    pub fn sized(width: u32, height: u32, seed: u64) -> Self {
        Self {
            width,
            height,
            seed,
            ..Self::default()
        }
    }
}

/// The generated world plus its content checksum, held as a bevy resource.
#[derive(Resource, Debug, Clone)]
pub struct WorldState {
    pub content: WorldContent,
    pub checksum: u64,
}

impl WorldState {
    pub fn generate(config: &WorldGenConfig) -> Self {
        let content = generate_world(config);
        let checksum = world_checksum(&content);
        Self { content, checksum }
    }

    pub fn chunk(&self) -> WorldChunk {
        WorldChunk::from_content(&self.content)
    }

    pub fn elevation_field(&self) -> ElevationField {
        ElevationField::new(
            self.content.width,
            self.content.height,
            self.content.elevation.clone(),
        )
    }
}

/// Run the six-stage pipeline. None of the stages fail on a well-formed
/// config; exhausted river or feature attempts simply yield fewer of them.
pub fn generate_world(config: &WorldGenConfig) -> WorldContent {
    let factory = StreamFactory::new(config.seed);
    let width = config.width;
    let height = config.height;

    let mut plate_rng = factory.stream(domains::WORLDGEN_PLATES, 0);
    let layout = generate_plates(width, height, config.plate_density, &mut plate_rng);

    let elevation = synthesize_elevation(
        width,
        height,
        &layout,
        factory.seed_for(domains::WORLDGEN_ELEVATION, 0) as u32,
    );

    let climate = derive_climate(
        width,
        height,
        factory.seed_for(domains::WORLDGEN_CLIMATE, 0) as u32,
    );
    let mut biomes = assign_biomes(&elevation, &climate);

    let mut river_rng = factory.stream(domains::WORLDGEN_RIVERS, 0);
    let rivers = carve_rivers(&elevation, &mut biomes, &config.hydrology, &mut river_rng);

    let mut feature_rng = factory.stream(domains::WORLDGEN_FEATURES, 0);
    let features = place_features(&elevation, &mut biomes, &mut feature_rng);

    let mut story_rng = factory.stream(domains::WORLDGEN_STORIES, 0);
    let stories = seed_stories(width, height, &biomes, &mut story_rng);

    tracing::info!(
        target: "everwilds::worldgen",
        width,
        height,
        seed = config.seed,
        plates = layout.plates.len(),
        rivers = rivers.len(),
        features = features.len(),
        stories = stories.len(),
        "worldgen.pipeline.complete"
    );

    WorldContent {
        width,
        height,
        seed: config.seed,
        elevation: elevation.into_values(),
        biomes,
        plates: layout.plates,
        rivers,
        features,
        stories,
    }
}
