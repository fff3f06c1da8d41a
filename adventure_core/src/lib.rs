//! Core simulation crate for the Everwilds adventure server.
//!
//! Provides the bevy headless app, the deterministic worldgen pipeline,
//! the dual-rate region scheduler, the story/event propagation engine,
//! crafting and progression, structures with taxation and diplomacy, the
//! session and action pipeline, and atomic persistence. A single seed plus
//! the ordered action log determines every observable state.

use std::time::Duration;

use bevy::{app::ScheduleRunnerPlugin, prelude::*};

pub mod biomes;
pub mod crafting;
pub mod diplomacy;
pub mod features;
pub mod heightfield;
pub mod hydrology;
pub mod items;
pub mod persistence;
pub mod pipeline;
pub mod plates;
pub mod propagation;
pub mod regions;
pub mod resources;
pub mod rng;
pub mod saturation;
pub mod scheduler;
pub mod sessions;
pub mod stories;
pub mod story_seed;
pub mod structures;
pub mod systems;
pub mod taxation;
pub mod worldgen;

pub use crafting::{resolve_craft, CraftingError, CraftingResult, Recipe, RecipeBook};
pub use diplomacy::{DiplomacyError, DiplomacyLedger, ALLIANCE_STRENGTH_THRESHOLD};
pub use heightfield::ElevationField;
pub use items::PrototypeRegistry;
pub use persistence::{PersistenceError, SaveManager, DEFAULT_BACKUP_LIMIT};
pub use pipeline::{ActionPipeline, ConflictResolver, DispatchReport, LatencyWindow, LockOutcome};
pub use propagation::{linear_graph, propagate, PropagationOutcome};
pub use regions::{carve_regions, harvest_node, regenerate_node, Region, RegionRegistry};
pub use resources::{
    CharacterRegistry, ClanRegistry, SimulationConfig, SimulationTick, Streams,
};
pub use rng::{domains, FnvHasher, StreamFactory};
pub use saturation::SaturationLedger;
pub use scheduler::{activate_region, background_cadence, deactivate_region, run_region_scheduler};
pub use sessions::{AuthError, Session, SessionService};
pub use stories::{flush_propagation, StoryDirectory};
pub use structures::{StructureLedger, StructureLedgerError};
pub use systems::EnforcementLog;
pub use taxation::{TaxError, TaxLedger};
pub use worldgen::{generate_world, WorldGenConfig, WorldState};

/// Build the headless simulation app from a config: generate the world,
/// carve regions, seed the directories, and wire the fixed-order tick
/// systems.
pub fn build_app_with_config(config: SimulationConfig) -> App {
    let world_state = WorldState::generate(&config.worldgen);
    let factory = StreamFactory::new(config.worldgen.seed);
    let registry = carve_regions(&world_state.content, config.region_size, &factory);

    let mut directory = StoryDirectory::default();
    directory.adopt_seeded(&world_state.content.stories);

    let mut app = App::new();
    app.add_plugins(MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(
        Duration::from_secs_f64(1.0 / 60.0),
    )));
    app.insert_resource(Streams(factory))
        .insert_resource(world_state)
        .insert_resource(registry)
        .insert_resource(directory)
        .insert_resource(SaturationLedger::default())
        .insert_resource(StructureLedger::default())
        .insert_resource(TaxLedger::default())
        .insert_resource(DiplomacyLedger::default())
        .insert_resource(CharacterRegistry::default())
        .insert_resource(ClanRegistry::default())
        .insert_resource(PrototypeRegistry::with_defaults())
        .insert_resource(RecipeBook::with_defaults())
        .insert_resource(SessionService::default())
        .insert_resource(ActionPipeline::new())
        .insert_resource(EnforcementLog::default())
        .insert_resource(SimulationTick::default())
        .insert_resource(config);
    app.add_systems(
        Update,
        (
            systems::advance_tick,
            run_region_scheduler,
            flush_propagation,
            systems::decay_structures,
            systems::decay_diplomacy,
            systems::enforce_taxes,
        )
            .chain(),
    );
    app
}

/// Entry point for the default headless configuration.
pub fn build_headless_app() -> App {
    build_app_with_config(SimulationConfig::default())
}

/// Snapshot the whole simulation state into a save envelope.
pub fn capture_save(world: &mut World) -> world_schema::WorldSave {
    let tick = world.resource::<SimulationTick>().0;
    let mut content = world.resource::<WorldState>().content.clone();
    let directory = world.resource::<StoryDirectory>();
    content.stories = directory.story_saves();

    world_schema::WorldSave {
        schema_version: world_schema::versions::SAVE,
        tick,
        world: content,
        regions: world.resource::<RegionRegistry>().to_saves(),
        characters: world.resource::<CharacterRegistry>().to_saves(),
        structures: world.resource::<StructureLedger>().to_saves(),
        tax_records: world.resource::<TaxLedger>().to_saves(),
        relationships: world.resource::<DiplomacyLedger>().to_saves(),
        events: directory.event_saves(),
        clans: world.resource::<ClanRegistry>().to_saves(),
    }
}

/// Restore a save envelope into the running world's resources.
pub fn restore_save(world: &mut World, save: world_schema::WorldSave) {
    world.resource_mut::<SimulationTick>().0 = save.tick;
    world
        .resource_mut::<RegionRegistry>()
        .restore(save.regions);
    world
        .resource_mut::<CharacterRegistry>()
        .restore(save.characters);
    world
        .resource_mut::<StructureLedger>()
        .restore(save.structures);
    world
        .resource_mut::<TaxLedger>()
        .restore(save.tax_records);
    world
        .resource_mut::<DiplomacyLedger>()
        .restore(save.relationships);
    world
        .resource_mut::<StoryDirectory>()
        .restore(save.world.stories.clone(), save.events);
    world.resource_mut::<ClanRegistry>().restore(save.clans);
    let checksum = world_schema::world_checksum(&save.world);
    let mut state = world.resource_mut::<WorldState>();
    state.content = save.world;
    state.checksum = checksum;
}
