//! The region scheduler: dual-rate tick processing with activation
//! catch-up.
//!
//! ACTIVE regions integrate every tick with `dt = tick_length * A`.
//! BACKGROUND regions are touched only every `round(1 / B)` ticks, and
//! when touched (or re-activated) they integrate the full elapsed
//! simulated time `(tick - last_processed) * tick_length` in one step, so
//! a region that spent time in the background ends up where its
//! always-active twin did, up to one integration step of error. Regions
//! are processed in ascending id order; nothing inside a tick suspends.

use bevy::prelude::{Res, ResMut};

use world_schema::RegionStatus;

use crate::regions::{regenerate_node, Region, RegionRegistry};
use crate::resources::{SimulationConfig, SimulationTick};

/// Background processing cadence in ticks, from the rate multiplier.
pub fn background_cadence(background_multiplier: f64) -> u64 {
    if background_multiplier <= 0.0 {
        return u64::MAX;
    }
    ((1.0 / background_multiplier).round() as u64).max(1)
}

/// Integrate one region over `dt` seconds of simulated time.
pub fn process_region(region: &mut Region, dt: f64) {
    for node in &mut region.resource_nodes {
        regenerate_node(node, dt);
    }
}

/// Per-tick scheduler pass.
pub fn run_region_scheduler(
    config: Res<SimulationConfig>,
    tick: Res<SimulationTick>,
    mut registry: ResMut<RegionRegistry>,
) {
    let now = tick.0;
    let cadence = background_cadence(config.background_multiplier);
    for region in registry.regions_mut() {
        match region.status {
            RegionStatus::Active => {
                let dt = config.tick_length_seconds * config.active_multiplier;
                process_region(region, dt);
                region.last_processed_tick = now;
            }
            RegionStatus::Background => {
                if now % cadence == 0 {
                    let elapsed = now.saturating_sub(region.last_processed_tick);
                    let dt = elapsed as f64 * config.tick_length_seconds;
                    process_region(region, dt);
                    region.last_processed_tick = now;
                }
            }
        }
    }
}

/// Transition a region to ACTIVE, applying the resynchronization step for
/// the ticks it spent in the background. Returns false for unknown regions.
pub fn activate_region(
    registry: &mut RegionRegistry,
    config: &SimulationConfig,
    current_tick: u64,
    region_id: u64,
) -> bool {
    let Some(region) = registry.region_mut(region_id) else {
        return false;
    };
    if region.status == RegionStatus::Background {
        let elapsed = current_tick.saturating_sub(region.last_processed_tick);
        if elapsed > 0 {
            let dt = elapsed as f64 * config.tick_length_seconds;
            process_region(region, dt);
        }
        region.last_processed_tick = current_tick;
        tracing::debug!(
            target: "everwilds::scheduler",
            region = region_id,
            caught_up_ticks = elapsed,
            "scheduler.region_resynchronized"
        );
    }
    region.status = RegionStatus::Active;
    true
}

/// Transition a region to BACKGROUND. Its `last_processed_tick` keeps the
/// last integration point so the next touch covers the full gap.
pub fn deactivate_region(registry: &mut RegionRegistry, region_id: u64) -> bool {
    match registry.region_mut(region_id) {
        Some(region) => {
            region.status = RegionStatus::Background;
            true
        }
        None => false,
    }
}
