//! Diplomacy: clamped relationship algebra, incident impacts, and the
//! periodic decay toward neutrality.

use std::collections::BTreeMap;

use bevy::prelude::Resource;
use thiserror::Error;

use world_runtime::toward_zero;
use world_schema::{DiplomaticIncident, RelationshipRecord};

/// Alliance formation requires this much standing.
pub const ALLIANCE_STRENGTH_THRESHOLD: f32 = 30.0;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DiplomacyError {
    #[error("alliance requires strength > {ALLIANCE_STRENGTH_THRESHOLD}, currently {strength}")]
    AllianceRequirementsUnmet { strength: f32 },
}

/// Relationship records per owner, keyed by target.
#[derive(Resource, Debug, Clone, Default)]
pub struct DiplomacyLedger {
    relations: BTreeMap<String, BTreeMap<String, RelationshipRecord>>,
}

impl DiplomacyLedger {
    pub fn relation(&self, owner: &str, target: &str) -> Option<&RelationshipRecord> {
        self.relations.get(owner).and_then(|map| map.get(target))
    }

    fn relation_entry(&mut self, owner: &str, target: &str, now: u64) -> &mut RelationshipRecord {
        self.relations
            .entry(owner.to_owned())
            .or_default()
            .entry(target.to_owned())
            .or_insert_with(|| RelationshipRecord::new(target, now))
    }

    /// Apply a diplomatic incident's fixed metric impacts.
    pub fn apply_incident(
        &mut self,
        owner: &str,
        target: &str,
        incident: DiplomaticIncident,
        now: u64,
    ) -> Result<RelationshipRecord, DiplomacyError> {
        let current = self.relation_entry(owner, target, now).clone();

        let next = match incident {
            DiplomaticIncident::TradeMission => current
                .with_reputation(current.reputation + 5.0, now)
                .with_influence(current.influence + 2.0, now),
            DiplomaticIncident::Betrayal => current.with_reputation(current.reputation - 30.0, now),
            DiplomaticIncident::DiplomaticGift => current
                .with_reputation(current.reputation + 3.0, now)
                .with_alignment(current.alignment + 1.0, now),
            DiplomaticIncident::WarDeclaration => current
                .with_reputation(current.reputation - 40.0, now)
                .with_alignment(current.alignment - 20.0, now),
            DiplomaticIncident::AllianceFormed => {
                let strength = current.alliance_strength();
                if strength <= ALLIANCE_STRENGTH_THRESHOLD {
                    return Err(DiplomacyError::AllianceRequirementsUnmet { strength });
                }
                current
                    .with_reputation(current.reputation + 10.0, now)
                    .with_alignment(current.alignment + 10.0, now)
            }
        };

        tracing::debug!(
            target: "everwilds::diplomacy",
            owner,
            toward = target,
            ?incident,
            reputation = next.reputation,
            "diplomacy.incident_applied"
        );

        *self.relation_entry(owner, target, now) = next.clone();
        Ok(next)
    }

    /// Periodic decay over `dt` ticks: reputation and alignment drift
    /// toward zero, influence bleeds off, race affinity is untouched.
    pub fn decay_all(&mut self, dt_ticks: u64, now: u64) {
        let dt = dt_ticks as f32;
        for map in self.relations.values_mut() {
            for record in map.values_mut() {
                let reputation = toward_zero(record.reputation, 0.01 * (dt / 100.0));
                let influence = (record.influence - 0.05 * (dt / 100.0)).max(0.0);
                let alignment = toward_zero(record.alignment, 0.001 * dt);
                *record = record
                    .with_reputation(reputation, now)
                    .with_influence(influence, now)
                    .with_alignment(alignment, now);
            }
        }
    }

    pub fn to_saves(&self) -> BTreeMap<String, Vec<RelationshipRecord>> {
        self.relations
            .iter()
            .map(|(owner, map)| (owner.clone(), map.values().cloned().collect()))
            .collect()
    }

    pub fn restore(&mut self, saves: BTreeMap<String, Vec<RelationshipRecord>>) {
        self.relations = saves
            .into_iter()
            .map(|(owner, records)| {
                (
                    owner,
                    records
                        .into_iter()
                        .map(|r| (r.target_id.clone(), r))
                        .collect(),
                )
            })
            .collect();
    }
}
