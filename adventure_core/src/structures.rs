//! Structure ledger: ownership, access checks, damage and repair, and the
//! per-tick decay pass.

use std::collections::BTreeMap;

use bevy::prelude::Resource;
use thiserror::Error;

use world_schema::{AccessLevel, OwnerType, Structure, StructureError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructureLedgerError {
    #[error("unknown structure '{0}'")]
    UnknownStructure(String),
    #[error(transparent)]
    Invalid(#[from] StructureError),
}

/// Registry of every standing structure, keyed and swept by id.
#[derive(Resource, Debug, Clone, Default)]
pub struct StructureLedger {
    structures: BTreeMap<String, Structure>,
}

impl StructureLedger {
    pub fn register(&mut self, structure: Structure) {
        self.structures.insert(structure.id.clone(), structure);
    }

    pub fn get(&self, id: &str) -> Option<&Structure> {
        self.structures.get(id)
    }

    pub fn structures(&self) -> impl Iterator<Item = &Structure> {
        self.structures.values()
    }

    pub fn len(&self) -> usize {
        self.structures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.structures.is_empty()
    }

    pub fn has_access(&self, id: &str, role: &str, required: AccessLevel) -> bool {
        self.structures
            .get(id)
            .map(|s| s.has_access(role, required))
            .unwrap_or(false)
    }

    pub fn apply_damage(&mut self, id: &str, amount: u32, now: u64) -> Result<u32, StructureLedgerError> {
        let structure = self
            .structures
            .get_mut(id)
            .ok_or_else(|| StructureLedgerError::UnknownStructure(id.to_owned()))?;
        *structure = structure.with_damage(amount, now);
        Ok(structure.health)
    }

    pub fn repair(&mut self, id: &str, amount: u32, now: u64) -> Result<u32, StructureLedgerError> {
        let structure = self
            .structures
            .get_mut(id)
            .ok_or_else(|| StructureLedgerError::UnknownStructure(id.to_owned()))?;
        *structure = structure.with_repair(amount, now)?;
        Ok(structure.health)
    }

    pub fn set_permission(
        &mut self,
        id: &str,
        role: &str,
        level: AccessLevel,
        now: u64,
    ) -> Result<(), StructureLedgerError> {
        let structure = self
            .structures
            .get_mut(id)
            .ok_or_else(|| StructureLedgerError::UnknownStructure(id.to_owned()))?;
        *structure = structure.with_permission(role, level, now);
        Ok(())
    }

    pub fn transfer_ownership(
        &mut self,
        id: &str,
        new_owner: &str,
        owner_type: OwnerType,
        now: u64,
    ) -> Result<(), StructureLedgerError> {
        let structure = self
            .structures
            .get_mut(id)
            .ok_or_else(|| StructureLedgerError::UnknownStructure(id.to_owned()))?;
        *structure = structure.with_owner(new_owner, owner_type, now)?;
        tracing::info!(
            target: "everwilds::structures",
            structure = id,
            owner = new_owner,
            "structure.ownership_transferred"
        );
        Ok(())
    }

    /// Weathering pass: every standing structure loses `amount` health.
    /// Already-destroyed structures are left alone.
    pub fn decay_all(&mut self, amount: u32, now: u64) {
        for structure in self.structures.values_mut() {
            if !structure.is_destroyed() {
                *structure = structure.with_damage(amount, now);
            }
        }
    }

    pub fn to_saves(&self) -> Vec<Structure> {
        self.structures.values().cloned().collect()
    }

    pub fn restore(&mut self, saves: Vec<Structure>) {
        self.structures = saves.into_iter().map(|s| (s.id.clone(), s)).collect();
    }
}
