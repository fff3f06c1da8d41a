//! Regional feature placement, the fifth worldgen stage.
//!
//! Candidate tiles are visited in a stream-shuffled deterministic order; a
//! candidate is accepted when the per-type compatibility predicate holds
//! and no previously placed feature lies within the separation radius.
//! Volcano placements stamp [`Biome::Volcanic`] onto their tile.

use rand::seq::SliceRandom;
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use world_schema::{Biome, FeatureType, RegionalFeature, TileCoord, FEATURE_MIN_SEPARATION};

use crate::heightfield::ElevationField;

/// One feature is attempted per this many tiles of world area.
pub const FEATURE_AREA_DIVISOR: u32 = 512;

/// Per-type placement compatibility.
pub fn is_compatible(kind: FeatureType, elevation: f32, biome: Biome) -> bool {
    match kind {
        FeatureType::Volcano => elevation >= 0.8,
        FeatureType::SubmergedCity => biome == Biome::Ocean,
        FeatureType::MagicZone => biome.is_habitable(),
        FeatureType::AncientRuins => !biome.is_water() && elevation < 0.9,
        FeatureType::CrystalSpire => matches!(biome, Biome::Mountain | Biome::Hills),
        FeatureType::BlightedGrove => {
            matches!(biome, Biome::Forest | Biome::Jungle | Biome::Swamp)
        }
    }
}

pub fn place_features(
    elevation: &ElevationField,
    biomes: &mut [Biome],
    rng: &mut ChaCha8Rng,
) -> Vec<RegionalFeature> {
    let width = elevation.width;
    let height = elevation.height;
    let area = width * height;
    let target = (area / FEATURE_AREA_DIVISOR).max(1) as usize;

    let mut candidates: Vec<u32> = (0..area).collect();
    candidates.shuffle(rng);

    let mut features: Vec<RegionalFeature> = Vec::with_capacity(target);
    for idx in candidates {
        if features.len() >= target {
            break;
        }
        let tile = TileCoord::new(idx % width, idx / width);
        let kind = FeatureType::ALL[rng.gen_range(0..FeatureType::ALL.len())];
        let elev = elevation.sample_tile(tile);
        let biome = biomes[tile.index(width)];
        if !is_compatible(kind, elev, biome) {
            continue;
        }
        if features
            .iter()
            .any(|f| f.position.euclidean_distance(tile) < FEATURE_MIN_SEPARATION)
        {
            continue;
        }

        let intensity = rng.gen::<f32>();
        if kind == FeatureType::Volcano {
            biomes[tile.index(width)] = Biome::Volcanic;
        }
        features.push(RegionalFeature {
            id: features.len() as u32,
            kind,
            position: tile,
            intensity,
            effect: kind.effect_description(intensity),
        });
    }

    tracing::debug!(
        target: "everwilds::worldgen",
        placed = features.len(),
        target,
        "worldgen.features.placed"
    );

    features
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::biomes::{assign_biomes, derive_climate};
    use crate::plates::generate_plates;
    use crate::rng::{domains, StreamFactory};

    fn generated(seed: u64) -> Vec<RegionalFeature> {
        let factory = StreamFactory::new(seed);
        let mut plate_rng = factory.stream(domains::WORLDGEN_PLATES, 0);
        let layout = generate_plates(96, 96, 512, &mut plate_rng);
        let elevation = crate::heightfield::synthesize_elevation(
            96,
            96,
            &layout,
            factory.seed_for(domains::WORLDGEN_ELEVATION, 0) as u32,
        );
        let climate = derive_climate(96, 96, factory.seed_for(domains::WORLDGEN_CLIMATE, 0) as u32);
        let mut biomes = assign_biomes(&elevation, &climate);
        let mut rng = factory.stream(domains::WORLDGEN_FEATURES, 0);
        place_features(&elevation, &mut biomes, &mut rng)
    }

    #[test]
    fn features_respect_pairwise_separation() {
        let features = generated(12_345);
        for (i, a) in features.iter().enumerate() {
            for b in features.iter().skip(i + 1) {
                assert!(
                    a.position.euclidean_distance(b.position) >= FEATURE_MIN_SEPARATION,
                    "{:?} and {:?} are too close",
                    a.position,
                    b.position
                );
            }
        }
    }

    #[test]
    fn placement_is_deterministic() {
        let a = generated(777);
        let b = generated(777);
        assert_eq!(a.len(), b.len());
        for (fa, fb) in a.iter().zip(&b) {
            assert_eq!(fa.position, fb.position);
            assert_eq!(fa.kind, fb.kind);
            assert_eq!(fa.intensity, fb.intensity);
        }
    }

    #[test]
    fn compatibility_predicates_hold() {
        assert!(is_compatible(FeatureType::Volcano, 0.85, Biome::Mountain));
        assert!(!is_compatible(FeatureType::Volcano, 0.5, Biome::Mountain));
        assert!(is_compatible(FeatureType::SubmergedCity, 0.1, Biome::Ocean));
        assert!(!is_compatible(FeatureType::SubmergedCity, 0.5, Biome::Forest));
        assert!(is_compatible(FeatureType::BlightedGrove, 0.5, Biome::Swamp));
        assert!(!is_compatible(FeatureType::BlightedGrove, 0.5, Biome::Desert));
    }
}
