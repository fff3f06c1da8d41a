//! Tick-boundary systems and their ordering.
//!
//! Within a tick: resource regeneration, then propagation, then structure
//! decay, then the tax sweep (when due). Actions accepted during a tick
//! take effect at the next boundary via the pipeline's pending queue.

use bevy::prelude::{Res, ResMut, Resource};

use crate::diplomacy::DiplomacyLedger;
use crate::resources::{SimulationConfig, SimulationTick};
use crate::structures::StructureLedger;
use crate::taxation::TaxLedger;

/// Advance the monotone global tick counter.
pub fn advance_tick(mut tick: ResMut<SimulationTick>) {
    tick.0 += 1;
}

/// Periodic structure weathering.
pub fn decay_structures(
    config: Res<SimulationConfig>,
    tick: Res<SimulationTick>,
    mut ledger: ResMut<StructureLedger>,
) {
    if config.structure_decay_interval > 0 && tick.0 % config.structure_decay_interval == 0 {
        ledger.decay_all(config.structure_decay_amount, tick.0);
    }
}

/// Periodic diplomacy drift toward neutrality.
pub fn decay_diplomacy(
    config: Res<SimulationConfig>,
    tick: Res<SimulationTick>,
    mut ledger: ResMut<DiplomacyLedger>,
) {
    if config.diplomacy_decay_interval > 0 && tick.0 % config.diplomacy_decay_interval == 0 {
        ledger.decay_all(config.diplomacy_decay_interval, tick.0);
    }
}

/// Outcome of the most recent enforcement sweep.
#[derive(Resource, Debug, Clone, Default)]
pub struct EnforcementLog {
    pub last_sweep_tick: u64,
    pub seizable: Vec<String>,
    pub total_seizures: u64,
}

/// Periodic tax enforcement sweep.
pub fn enforce_taxes(
    config: Res<SimulationConfig>,
    tick: Res<SimulationTick>,
    ledger: Res<TaxLedger>,
    mut log: ResMut<EnforcementLog>,
) {
    if config.tax_enforcement_interval == 0 || tick.0 % config.tax_enforcement_interval != 0 {
        return;
    }
    let seizable = ledger.update_enforcement(tick.0);
    log.last_sweep_tick = tick.0;
    log.total_seizures += seizable.len() as u64;
    log.seizable = seizable;
}
