use adventure_core::{build_app_with_config, SimulationConfig, WorldGenConfig};
use bevy::app::App;

/// A small, fast world; still large enough for several regions and rivers.
pub fn small_config(seed: u64) -> SimulationConfig {
    SimulationConfig {
        worldgen: WorldGenConfig::sized(48, 48, seed),
        region_size: 16,
        ..SimulationConfig::default()
    }
}

pub fn test_app(seed: u64) -> App {
    build_app_with_config(small_config(seed))
}
