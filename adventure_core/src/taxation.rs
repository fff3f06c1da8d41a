//! The tax ledger and enforcement sweep.
//!
//! Records are guarded by per-structure locks; the sweep acquires them in
//! structure-id order. Classification is a pure function of record state
//! (see `TaxRecord::standing`), so repeated sweeps at the same tick return
//! the same answer.

use std::collections::BTreeMap;
use std::sync::Mutex;

use bevy::prelude::Resource;
use thiserror::Error;

use world_schema::{EnforcementStanding, TaxPolicy, TaxRecord};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaxError {
    #[error("structure '{0}' has no tax record")]
    UnknownStructure(String),
}

#[derive(Resource, Debug, Default)]
pub struct TaxLedger {
    policy: TaxPolicy,
    records: BTreeMap<String, Mutex<TaxRecord>>,
}

impl TaxLedger {
    pub fn new(policy: TaxPolicy) -> Self {
        Self {
            policy,
            records: BTreeMap::new(),
        }
    }

    pub fn policy(&self) -> &TaxPolicy {
        &self.policy
    }

    pub fn register_structure(&mut self, structure_id: impl Into<String>, now: u64) {
        let structure_id = structure_id.into();
        self.records.insert(
            structure_id.clone(),
            Mutex::new(TaxRecord::register(structure_id, now, &self.policy)),
        );
    }

    pub fn record(&self, structure_id: &str) -> Result<TaxRecord, TaxError> {
        let cell = self
            .records
            .get(structure_id)
            .ok_or_else(|| TaxError::UnknownStructure(structure_id.to_owned()))?;
        Ok(cell.lock().expect("tax record lock").clone())
    }

    /// Assess one collection cycle against a structure's income.
    pub fn process_collection(
        &self,
        structure_id: &str,
        income: u64,
        now: u64,
    ) -> Result<TaxRecord, TaxError> {
        let cell = self
            .records
            .get(structure_id)
            .ok_or_else(|| TaxError::UnknownStructure(structure_id.to_owned()))?;
        let mut record = cell.lock().expect("tax record lock");
        *record = record.with_collection(income, now, &self.policy);
        tracing::debug!(
            target: "everwilds::taxation",
            structure = structure_id,
            owed = record.tax_owed,
            due = record.next_tax_due_tick,
            "tax.collection_processed"
        );
        Ok(record.clone())
    }

    /// Credit a payment; full settlement clears the unpaid marker.
    pub fn record_payment(
        &self,
        structure_id: &str,
        amount: u64,
        now: u64,
    ) -> Result<TaxRecord, TaxError> {
        let cell = self
            .records
            .get(structure_id)
            .ok_or_else(|| TaxError::UnknownStructure(structure_id.to_owned()))?;
        let mut record = cell.lock().expect("tax record lock");
        *record = record.with_payment(amount, now);
        Ok(record.clone())
    }

    /// Enforcement sweep: stamp first unpaid observations, then classify.
    /// Returns the ids of structures past the seizure threshold, in id
    /// order.
    pub fn update_enforcement(&self, now: u64) -> Vec<String> {
        let mut seizable = Vec::new();
        for (structure_id, cell) in &self.records {
            let mut record = cell.lock().expect("tax record lock");
            *record = record.observe_overdue(now);
            match record.standing(now, &self.policy) {
                EnforcementStanding::Seizable => {
                    tracing::warn!(
                        target: "everwilds::taxation",
                        structure = %structure_id,
                        outstanding = record.outstanding(),
                        "tax.seizure_triggered"
                    );
                    seizable.push(structure_id.clone());
                }
                EnforcementStanding::UnderSeizureRisk => {
                    tracing::debug!(
                        target: "everwilds::taxation",
                        structure = %structure_id,
                        "tax.seizure_risk"
                    );
                }
                _ => {}
            }
        }
        seizable
    }

    pub fn to_saves(&self) -> Vec<TaxRecord> {
        self.records
            .values()
            .map(|cell| cell.lock().expect("tax record lock").clone())
            .collect()
    }

    pub fn restore(&mut self, saves: Vec<TaxRecord>) {
        self.records = saves
            .into_iter()
            .map(|record| (record.structure_id.clone(), Mutex::new(record)))
            .collect();
    }
}
