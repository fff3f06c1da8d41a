//! Versioned schema migration for persisted payloads.
//!
//! Each persisted module registers its current version and an ordered list
//! of migration steps. A step is a pure transformer from one schema version
//! to the next, operating on the raw JSON value so old payloads never need
//! their historical Rust types kept alive.

use std::collections::BTreeMap;

use serde_json::{json, Value};
use thiserror::Error;

use world_schema::{modules, versions};

pub type MigrationFn = fn(Value) -> Result<Value, String>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MigrationError {
    #[error("unknown persisted module '{0}'")]
    UnknownModule(String),
    #[error("module '{module}' payload is version {version}, newer than current {current}")]
    FutureVersion {
        module: String,
        version: u32,
        current: u32,
    },
    #[error("migration step '{step}' failed: {message}")]
    StepFailed { step: &'static str, message: String },
    #[error("module '{module}' has no step covering version {version}")]
    MissingStep { module: String, version: u32 },
}

/// One migration hop, `from_version -> from_version + 1`.
#[derive(Clone)]
pub struct MigrationStep {
    pub from_version: u32,
    pub name: &'static str,
    transform: MigrationFn,
}

impl MigrationStep {
    pub fn new(from_version: u32, name: &'static str, transform: MigrationFn) -> Self {
        Self {
            from_version,
            name,
            transform,
        }
    }

    pub fn apply(&self, value: Value) -> Result<Value, MigrationError> {
        (self.transform)(value).map_err(|message| MigrationError::StepFailed {
            step: self.name,
            message,
        })
    }
}

impl std::fmt::Debug for MigrationStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationStep")
            .field("from_version", &self.from_version)
            .field("name", &self.name)
            .finish()
    }
}

#[derive(Debug, Clone)]
struct ModuleSchema {
    current_version: u32,
    steps: Vec<MigrationStep>,
}

/// Registry mapping module name to its current version and migration chain.
#[derive(Debug, Clone, Default)]
pub struct MigrationRegistry {
    schemas: BTreeMap<String, ModuleSchema>,
}

impl MigrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with every module this build persists.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(
            modules::WORLD_CHUNK,
            versions::WORLD_CHUNK,
            vec![MigrationStep::new(0, "chunk_add_schema_version", |value| {
                stamp_version(value, 1)
            })],
        );
        registry.register(
            modules::CHARACTER,
            versions::CHARACTER,
            vec![MigrationStep::new(
                0,
                "character_add_specializations",
                |mut value| {
                    let object = value
                        .as_object_mut()
                        .ok_or_else(|| "character payload is not an object".to_owned())?;
                    object
                        .entry("specializations")
                        .or_insert_with(|| json!([]));
                    object.insert("schema_version".into(), json!(1));
                    Ok(value)
                },
            )],
        );
        registry.register(
            modules::STRUCTURE,
            versions::STRUCTURE,
            vec![MigrationStep::new(0, "structure_add_upgrades", |mut value| {
                let object = value
                    .as_object_mut()
                    .ok_or_else(|| "structure payload is not an object".to_owned())?;
                object.entry("upgrades").or_insert_with(|| json!([]));
                object.insert("schema_version".into(), json!(1));
                Ok(value)
            })],
        );
        registry
    }

    pub fn register(&mut self, module: &str, current_version: u32, steps: Vec<MigrationStep>) {
        self.schemas.insert(
            module.to_owned(),
            ModuleSchema {
                current_version,
                steps,
            },
        );
    }

    pub fn current_version(&self, module: &str) -> Result<u32, MigrationError> {
        self.schemas
            .get(module)
            .map(|schema| schema.current_version)
            .ok_or_else(|| MigrationError::UnknownModule(module.to_owned()))
    }

    /// The ordered steps needed to lift a payload from `from_version` to the
    /// module's current version. Unknown modules and future versions are
    /// hard errors; no migration is attempted for either.
    pub fn migration_path(
        &self,
        module: &str,
        from_version: u32,
    ) -> Result<&[MigrationStep], MigrationError> {
        let schema = self
            .schemas
            .get(module)
            .ok_or_else(|| MigrationError::UnknownModule(module.to_owned()))?;
        if from_version > schema.current_version {
            return Err(MigrationError::FutureVersion {
                module: module.to_owned(),
                version: from_version,
                current: schema.current_version,
            });
        }
        let start = schema
            .steps
            .iter()
            .position(|step| step.from_version == from_version);
        match start {
            Some(index) => Ok(&schema.steps[index..]),
            None if from_version == schema.current_version => Ok(&[]),
            None => Err(MigrationError::MissingStep {
                module: module.to_owned(),
                version: from_version,
            }),
        }
    }

    /// Run the full migration chain on a payload, returning the lifted value
    /// and the version reached.
    pub fn migrate(
        &self,
        module: &str,
        from_version: u32,
        mut value: Value,
    ) -> Result<(Value, u32), MigrationError> {
        let steps = self.migration_path(module, from_version)?.to_vec();
        let mut version = from_version;
        for step in steps {
            value = step.apply(value)?;
            version = step.from_version + 1;
        }
        Ok((value, version))
    }
}

fn stamp_version(mut value: Value, version: u32) -> Result<Value, String> {
    let object = value
        .as_object_mut()
        .ok_or_else(|| "payload is not an object".to_owned())?;
    object.insert("schema_version".into(), json!(version));
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_module_is_a_hard_error() {
        let registry = MigrationRegistry::with_defaults();
        assert!(matches!(
            registry.migration_path("nether/Portal", 0),
            Err(MigrationError::UnknownModule(_))
        ));
    }

    #[test]
    fn future_version_is_a_hard_error() {
        let registry = MigrationRegistry::with_defaults();
        assert!(matches!(
            registry.migration_path(modules::WORLD_CHUNK, 7),
            Err(MigrationError::FutureVersion {
                version: 7,
                current: 1,
                ..
            })
        ));
    }

    #[test]
    fn current_version_needs_no_steps() {
        let registry = MigrationRegistry::with_defaults();
        let path = registry
            .migration_path(modules::WORLD_CHUNK, versions::WORLD_CHUNK)
            .expect("path");
        assert!(path.is_empty());
    }

    #[test]
    fn version_zero_character_payload_is_lifted() {
        let registry = MigrationRegistry::with_defaults();
        let legacy = json!({
            "id": "alia",
            "name": "Alia",
            "stats": {},
            "skills": {},
            "traits": [],
            "inventory": [],
            "mana": {"current": 10, "max": 10},
        });
        let (migrated, version) = registry
            .migrate(modules::CHARACTER, 0, legacy)
            .expect("migrate");
        assert_eq!(version, 1);
        assert_eq!(migrated["schema_version"], json!(1));
        assert_eq!(migrated["specializations"], json!([]));
    }

    #[test]
    fn steps_are_pure_transformers() {
        let registry = MigrationRegistry::with_defaults();
        let payload = json!({"width": 4, "height": 2, "seed": 7, "elevation": []});
        let (a, _) = registry
            .migrate(modules::WORLD_CHUNK, 0, payload.clone())
            .expect("first run");
        let (b, _) = registry
            .migrate(modules::WORLD_CHUNK, 0, payload)
            .expect("second run");
        assert_eq!(a, b);
    }
}
