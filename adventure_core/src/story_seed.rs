//! Story seeding, the final worldgen stage.
//!
//! Each biome class hosts a number of stories scaling with world area.
//! Story kind follows a biome-conditioned distribution (mountains skew
//! toward legends and prophecies, grasslands toward comedies and quests),
//! priority follows kind, every origin tile is unique, and all seeded
//! stories start ACTIVE at tick zero.

use std::collections::HashSet;

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use world_schema::{Biome, Story, StoryType, TileCoord};

/// One story per biome class is attempted per this many tiles of area.
pub const STORY_AREA_DIVISOR: u32 = 4_096;

/// Biome-conditioned story kind distribution.
pub fn story_kinds(biome: Biome) -> &'static [StoryType] {
    match biome {
        Biome::Mountain | Biome::Volcanic => &[StoryType::Legend, StoryType::Prophecy],
        Biome::Grassland | Biome::Savanna => &[StoryType::Comedy, StoryType::Quest],
        Biome::Forest | Biome::Jungle => &[StoryType::Mystery, StoryType::Quest],
        Biome::Swamp => &[StoryType::Tragedy, StoryType::Mystery],
        Biome::Tundra | Biome::Taiga => &[StoryType::Legend, StoryType::Tragedy],
        Biome::Desert => &[StoryType::Prophecy, StoryType::Mystery],
        Biome::Hills => &[StoryType::Quest, StoryType::Comedy],
        Biome::Ocean | Biome::Lake => &[StoryType::Mystery],
    }
}

fn base_probability(kind: StoryType) -> f32 {
    match kind {
        StoryType::Legend => 0.8,
        StoryType::Prophecy => 0.7,
        StoryType::Tragedy => 0.55,
        StoryType::Mystery => 0.5,
        StoryType::Quest => 0.45,
        StoryType::Comedy => 0.3,
    }
}

const TITLE_SUBJECTS: [&str; 8] = [
    "Crown", "Wanderer", "Serpent", "Lantern", "Harvest", "Oath", "Hollow", "Tide",
];

const TITLE_EPITHETS: [&str; 8] = [
    "Ashen", "Silent", "Gilded", "Broken", "Verdant", "Sunken", "Restless", "Pale",
];

fn title_for(kind: StoryType, rng: &mut ChaCha8Rng) -> String {
    let epithet = TITLE_EPITHETS[rng.gen_range(0..TITLE_EPITHETS.len())];
    let subject = TITLE_SUBJECTS[rng.gen_range(0..TITLE_SUBJECTS.len())];
    let frame = match kind {
        StoryType::Legend => "Legend of the",
        StoryType::Prophecy => "Prophecy of the",
        StoryType::Tragedy => "Fall of the",
        StoryType::Mystery => "Riddle of the",
        StoryType::Quest => "Search for the",
        StoryType::Comedy => "Misadventure of the",
    };
    format!("{frame} {epithet} {subject}")
}

pub fn seed_stories(
    width: u32,
    height: u32,
    biomes: &[Biome],
    rng: &mut ChaCha8Rng,
) -> Vec<Story> {
    let area = width * height;
    let per_class = (area / STORY_AREA_DIVISOR).max(1) as usize;

    let mut used_origins: HashSet<TileCoord> = HashSet::new();
    let mut stories = Vec::new();

    for biome in Biome::ALL {
        let tiles: Vec<TileCoord> = (0..area)
            .filter(|idx| biomes[*idx as usize] == biome)
            .map(|idx| TileCoord::new(idx % width, idx / width))
            .collect();
        if tiles.is_empty() {
            continue;
        }

        let kinds = story_kinds(biome);
        let mut placed = 0usize;
        let mut attempts = 0usize;
        while placed < per_class && attempts < per_class * 8 {
            attempts += 1;
            let origin = tiles[rng.gen_range(0..tiles.len())];
            if !used_origins.insert(origin) {
                continue;
            }
            let kind = kinds[rng.gen_range(0..kinds.len())];
            let priority = kind.default_priority();
            let story = Story::builder(stories.len() as u64, kind, title_for(kind, rng))
                .origin(origin)
                .origin_tick(0)
                .base_probability(base_probability(kind))
                .max_hops(2 + u32::from(priority) / 3)
                .priority(priority)
                .metadata("origin_biome", format!("{biome:?}"))
                .build();
            stories.push(story);
            placed += 1;
        }
    }

    tracing::debug!(
        target: "everwilds::worldgen",
        stories = stories.len(),
        per_class,
        "worldgen.stories.seeded"
    );

    stories
}
