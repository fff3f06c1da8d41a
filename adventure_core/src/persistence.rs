//! Atomic, checksum-validated persistence with bounded backup rotation.
//!
//! A save serializes to a temporary file alongside the target, writes a
//! SHA-256 hex digest to the sibling `.checksum` file, then atomically
//! renames the temporary over the target. Either the prior valid state
//! remains or the new state with a matching digest is visible; a partial
//! payload is never observable. Each successful save first copies the
//! prior target (and its digest) to a timestamp-named backup, keeping at
//! most `backup_limit` backups per logical file.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

use world_runtime::migrations::{MigrationError, MigrationRegistry};

/// Default number of retained backups per logical file.
pub const DEFAULT_BACKUP_LIMIT: usize = 3;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("checksum mismatch for {path}")]
    ChecksumMismatch { path: PathBuf },
    #[error("no checksum sidecar for {path}")]
    MissingChecksum { path: PathBuf },
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
    #[error("no valid payload found for {path} or any of its backups")]
    NoValidPayload { path: PathBuf },
    #[error(transparent)]
    Migration(#[from] MigrationError),
}

impl PersistenceError {
    pub fn is_checksum_mismatch(&self) -> bool {
        matches!(self, PersistenceError::ChecksumMismatch { .. })
    }
}

#[derive(Debug, Default)]
pub struct SaveManager {
    backup_limit: usize,
    path_locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl SaveManager {
    pub fn new() -> Self {
        Self::with_backup_limit(DEFAULT_BACKUP_LIMIT)
    }

    pub fn with_backup_limit(backup_limit: usize) -> Self {
        Self {
            backup_limit,
            path_locks: Mutex::new(HashMap::new()),
        }
    }

    fn path_lock(&self, path: &Path) -> Arc<Mutex<()>> {
        let mut locks = self.path_locks.lock().expect("path lock table");
        Arc::clone(locks.entry(path.to_path_buf()).or_default())
    }

    /// Atomic save of a JSON payload.
    pub fn save_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), PersistenceError> {
        let lock = self.path_lock(path);
        let _guard = lock.lock().expect("save path lock");

        let payload = serde_json::to_vec_pretty(value)?;
        let digest = digest_hex(&payload);

        let tmp_path = sibling(path, "tmp");
        fs::write(&tmp_path, &payload)?;

        if path.exists() {
            self.rotate_backups(path)?;
        }

        fs::write(sibling(path, "checksum"), digest.as_bytes())?;
        fs::rename(&tmp_path, path)?;

        tracing::debug!(
            target: "everwilds::persistence",
            path = %path.display(),
            bytes = payload.len(),
            "persistence.saved"
        );
        Ok(())
    }

    /// Load and verify a JSON payload. A digest mismatch surfaces as the
    /// distinguishable [`PersistenceError::ChecksumMismatch`].
    pub fn load_json<T: DeserializeOwned>(&self, path: &Path) -> Result<T, PersistenceError> {
        let payload = fs::read(path)?;
        let checksum_path = sibling(path, "checksum");
        if !checksum_path.exists() {
            return Err(PersistenceError::MissingChecksum {
                path: path.to_path_buf(),
            });
        }
        let stored = fs::read_to_string(&checksum_path)?;
        if digest_hex(&payload) != stored.trim() {
            return Err(PersistenceError::ChecksumMismatch {
                path: path.to_path_buf(),
            });
        }
        Ok(serde_json::from_slice(&payload)?)
    }

    /// Load the target, falling back through backups newest to oldest until
    /// one verifies.
    pub fn load_with_backup_fallback<T: DeserializeOwned>(
        &self,
        path: &Path,
    ) -> Result<T, PersistenceError> {
        match self.load_json(path) {
            Ok(value) => return Ok(value),
            Err(err) if recoverable(&err) => {
                tracing::warn!(
                    target: "everwilds::persistence",
                    path = %path.display(),
                    error = %err,
                    "persistence.primary_invalid"
                );
            }
            Err(err) => return Err(err),
        }

        let mut backups = self.list_backups(path)?;
        backups.reverse();
        for backup in backups {
            match self.load_json(&backup) {
                Ok(value) => {
                    tracing::info!(
                        target: "everwilds::persistence",
                        backup = %backup.display(),
                        "persistence.recovered_from_backup"
                    );
                    return Ok(value);
                }
                Err(err) if recoverable(&err) => continue,
                Err(err) => return Err(err),
            }
        }

        Err(PersistenceError::NoValidPayload {
            path: path.to_path_buf(),
        })
    }

    /// Load a raw JSON payload and lift it to the module's current schema
    /// version through the migration registry.
    pub fn load_migrated(
        &self,
        path: &Path,
        module: &str,
        registry: &MigrationRegistry,
    ) -> Result<serde_json::Value, PersistenceError> {
        let value: serde_json::Value = self.load_json(path)?;
        let from_version = value
            .get("schema_version")
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(0) as u32;
        let (migrated, _) = registry.migrate(module, from_version, value)?;
        Ok(migrated)
    }

    /// Timestamp-named backups for a logical file, oldest first.
    pub fn list_backups(&self, path: &Path) -> Result<Vec<PathBuf>, PersistenceError> {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            return Ok(Vec::new());
        };
        let prefix = format!("{file_name}.bak-");
        let mut backups = Vec::new();
        if !parent.exists() {
            return Ok(backups);
        }
        for entry in fs::read_dir(parent)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.starts_with(&prefix) && !name.ends_with(".checksum") {
                backups.push(entry.path());
            }
        }
        // The UTC timestamp suffix sorts lexicographically by age.
        backups.sort();
        Ok(backups)
    }

    fn rotate_backups(&self, path: &Path) -> Result<(), PersistenceError> {
        let stamp = Utc::now().format("%Y%m%dT%H%M%S%.6fZ");
        let mut backup = PathBuf::from(format!("{}.bak-{stamp}", path.display()));
        let mut counter = 0u32;
        while backup.exists() {
            counter += 1;
            backup = PathBuf::from(format!("{}.bak-{stamp}-{counter}", path.display()));
        }
        fs::copy(path, &backup)?;
        let checksum = sibling(path, "checksum");
        if checksum.exists() {
            fs::copy(&checksum, PathBuf::from(format!("{}.checksum", backup.display())))?;
        }

        if self.backup_limit > 0 {
            let backups = self.list_backups(path)?;
            if backups.len() > self.backup_limit {
                for stale in &backups[..backups.len() - self.backup_limit] {
                    fs::remove_file(stale)?;
                    let stale_checksum = PathBuf::from(format!("{}.checksum", stale.display()));
                    if stale_checksum.exists() {
                        fs::remove_file(stale_checksum)?;
                    }
                }
            }
        }
        Ok(())
    }
}

fn recoverable(err: &PersistenceError) -> bool {
    matches!(
        err,
        PersistenceError::ChecksumMismatch { .. }
            | PersistenceError::MissingChecksum { .. }
            | PersistenceError::Io(_)
            | PersistenceError::Serde(_)
    )
}

fn sibling(path: &Path, extension: &str) -> PathBuf {
    PathBuf::from(format!("{}.{extension}", path.display()))
}

fn digest_hex(payload: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Payload {
        tick: u64,
        label: String,
    }

    fn payload(tick: u64) -> Payload {
        Payload {
            tick,
            label: "everwilds".into(),
        }
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("world.json");
        let manager = SaveManager::new();
        manager.save_json(&path, &payload(7)).expect("save");
        let loaded: Payload = manager.load_json(&path).expect("load");
        assert_eq!(loaded, payload(7));
    }

    #[test]
    fn corruption_is_a_distinguishable_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("world.json");
        let manager = SaveManager::new();
        manager.save_json(&path, &payload(7)).expect("save");

        fs::write(&path, b"{\"tick\": 9999, \"label\": \"tampered\"}").expect("tamper");
        let err = manager.load_json::<Payload>(&path).expect_err("corrupted");
        assert!(err.is_checksum_mismatch());
    }

    #[test]
    fn fallback_returns_the_most_recent_valid_backup() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("world.json");
        let manager = SaveManager::new();
        manager.save_json(&path, &payload(1)).expect("save 1");
        manager.save_json(&path, &payload(2)).expect("save 2");
        manager.save_json(&path, &payload(3)).expect("save 3");

        fs::write(&path, b"garbage").expect("tamper");
        let recovered: Payload = manager.load_with_backup_fallback(&path).expect("fallback");
        assert_eq!(recovered, payload(2), "newest valid backup wins");
    }

    #[test]
    fn fallback_without_valid_state_reports_no_payload() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("world.json");
        let manager = SaveManager::new();
        manager.save_json(&path, &payload(1)).expect("save");
        fs::write(&path, b"garbage").expect("tamper target");
        for backup in manager.list_backups(&path).expect("list") {
            fs::remove_file(backup).expect("drop backup");
        }
        let err = manager
            .load_with_backup_fallback::<Payload>(&path)
            .expect_err("nothing valid");
        assert!(matches!(err, PersistenceError::NoValidPayload { .. }));
    }

    #[test]
    fn backups_rotate_at_the_limit() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("world.json");
        let manager = SaveManager::with_backup_limit(3);
        for tick in 0..8 {
            manager.save_json(&path, &payload(tick)).expect("save");
        }
        let backups = manager.list_backups(&path).expect("list");
        assert_eq!(backups.len(), 3);
        // Oldest retained backup is the fifth save.
        let oldest: Payload = manager.load_json(&backups[0]).expect("oldest backup");
        assert_eq!(oldest.tick, 4);
    }

    #[test]
    fn migrated_loads_lift_legacy_payloads() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("character.json");
        let manager = SaveManager::new();
        let legacy = serde_json::json!({"id": "alia", "name": "Alia"});
        manager.save_json(&path, &legacy).expect("save");

        let registry = MigrationRegistry::with_defaults();
        let migrated = manager
            .load_migrated(&path, world_schema::modules::CHARACTER, &registry)
            .expect("migrate");
        assert_eq!(migrated["schema_version"], serde_json::json!(1));
        assert_eq!(migrated["specializations"], serde_json::json!([]));

        let err = manager
            .load_migrated(&path, "nether/Portal", &registry)
            .expect_err("unknown module");
        assert!(matches!(err, PersistenceError::Migration(_)));
    }
}
