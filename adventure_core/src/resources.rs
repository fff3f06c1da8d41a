//! Global configuration and shared registries for the headless simulation.

use std::collections::BTreeMap;

use bevy::prelude::Resource;

use world_schema::{CharacterSheet, Clan};

use crate::rng::StreamFactory;
use crate::worldgen::WorldGenConfig;

/// Global configuration parameters for the simulation core.
#[derive(Resource, Debug, Clone)]
pub struct SimulationConfig {
    pub worldgen: WorldGenConfig,
    /// Edge length of the square region carve, in tiles.
    pub region_size: u32,
    pub tick_length_seconds: f64,
    /// Rate multiplier for ACTIVE regions.
    pub active_multiplier: f64,
    /// Rate multiplier for BACKGROUND regions; its reciprocal fixes the
    /// background processing cadence.
    pub background_multiplier: f64,
    pub structure_decay_interval: u64,
    pub structure_decay_amount: u32,
    pub diplomacy_decay_interval: u64,
    pub tax_enforcement_interval: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            worldgen: WorldGenConfig::default(),
            region_size: 16,
            tick_length_seconds: 1.0,
            active_multiplier: 1.0,
            background_multiplier: 1.0 / 60.0,
            structure_decay_interval: 1_440,
            structure_decay_amount: 1,
            diplomacy_decay_interval: 100,
            tax_enforcement_interval: 1_440,
        }
    }
}

/// Tracks total simulation ticks elapsed.
#[derive(Resource, Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationTick(pub u64);

/// The world-seeded stream factory, shared by every system that draws.
#[derive(Resource, Debug, Clone, Copy)]
pub struct Streams(pub StreamFactory);

/// Player characters by id.
#[derive(Resource, Debug, Clone, Default)]
pub struct CharacterRegistry {
    characters: BTreeMap<String, CharacterSheet>,
}

impl CharacterRegistry {
    pub fn insert(&mut self, sheet: CharacterSheet) {
        self.characters.insert(sheet.id.clone(), sheet);
    }

    pub fn get(&self, id: &str) -> Option<&CharacterSheet> {
        self.characters.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut CharacterSheet> {
        self.characters.get_mut(id)
    }

    pub fn has_character(&self, player_id: &str) -> bool {
        self.characters.contains_key(player_id)
    }

    pub fn len(&self) -> usize {
        self.characters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }

    pub fn to_saves(&self) -> Vec<CharacterSheet> {
        self.characters.values().cloned().collect()
    }

    pub fn restore(&mut self, saves: Vec<CharacterSheet>) {
        self.characters = saves.into_iter().map(|c| (c.id.clone(), c)).collect();
    }
}

/// Clans by id.
#[derive(Resource, Debug, Clone, Default)]
pub struct ClanRegistry {
    clans: BTreeMap<String, Clan>,
}

impl ClanRegistry {
    pub fn insert(&mut self, clan: Clan) {
        self.clans.insert(clan.id.clone(), clan);
    }

    pub fn get(&self, id: &str) -> Option<&Clan> {
        self.clans.get(id)
    }

    /// Value-semantics membership update, applying a JOIN_CLAN action.
    pub fn add_member(&mut self, clan_id: &str, player_id: &str) -> bool {
        match self.clans.get(clan_id) {
            Some(clan) => {
                let updated = clan.add_member(player_id);
                self.clans.insert(clan_id.to_owned(), updated);
                true
            }
            None => false,
        }
    }

    /// Value-semantics membership removal. Leaders cannot be removed.
    pub fn remove_member(&mut self, clan_id: &str, player_id: &str) -> bool {
        match self.clans.get(clan_id) {
            Some(clan) => {
                let updated = clan.remove_member(player_id);
                self.clans.insert(clan_id.to_owned(), updated);
                true
            }
            None => false,
        }
    }

    pub fn to_saves(&self) -> Vec<Clan> {
        self.clans.values().cloned().collect()
    }

    pub fn restore(&mut self, saves: Vec<Clan>) {
        self.clans = saves.into_iter().map(|c| (c.id.clone(), c)).collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use world_runtime::{validate_envelope, ActionEnvelope, ActionKind};

    #[test]
    fn character_registry_tracks_ownership() {
        let mut registry = CharacterRegistry::default();
        assert!(!registry.has_character("alia"));
        registry.insert(CharacterSheet::new("alia", "Alia"));
        assert!(registry.has_character("alia"));
        assert_eq!(registry.get("alia").map(|c| c.name.as_str()), Some("Alia"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn validated_join_clan_actions_apply_through_the_registry() {
        let mut registry = ClanRegistry::default();
        registry.insert(Clan::builder("emberfall", "Emberfall", "alia").build());

        let join = ActionEnvelope::new("a1", "bram", ActionKind::JoinClan, 0)
            .with_param("clan_id", json!("emberfall"));
        validate_envelope(&join, "bram", 100, true).expect("valid join action");
        let clan_id = join.param_str("clan_id").expect("clan_id param");

        assert!(registry.add_member(clan_id, &join.player_id));
        assert!(registry.get("emberfall").expect("clan").is_member("bram"));

        assert!(registry.remove_member("emberfall", "bram"));
        assert!(!registry.get("emberfall").expect("clan").is_member("bram"));
    }

    #[test]
    fn leaders_survive_removal_and_unknown_clans_report_failure() {
        let mut registry = ClanRegistry::default();
        registry.insert(Clan::builder("emberfall", "Emberfall", "alia").build());

        assert!(registry.remove_member("emberfall", "alia"));
        assert!(registry.get("emberfall").expect("clan").is_member("alia"));

        assert!(!registry.add_member("ghost_clan", "bram"));
        assert!(!registry.remove_member("ghost_clan", "bram"));
    }

    #[test]
    fn clan_registry_round_trips_through_saves() {
        let mut registry = ClanRegistry::default();
        registry.insert(Clan::builder("emberfall", "Emberfall", "alia").build());
        registry.add_member("emberfall", "bram");

        let mut restored = ClanRegistry::default();
        restored.restore(registry.to_saves());
        assert!(restored.get("emberfall").expect("clan").is_member("bram"));
        assert_eq!(registry.to_saves(), restored.to_saves());
    }
}
