// checkpoint.rs — persisted recovery snapshot.
//
// Single-writer resource: only the lifecycle manager writes it, on a
// throttled cadence, so an uncontrolled termination costs at most one
// checkpoint interval of progress.

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{Result, TrackerError};

/// Accumulated session metrics persisted for crash recovery.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Checkpoint {
    pub session_id: String,
    pub ruck_weight_kg: f64,
    pub user_weight_kg: f64,
    pub start_time: DateTime<Utc>,
    pub total_paused_secs: i64,
    pub distance_km: f64,
    pub elevation_gain_m: f64,
    pub elevation_loss_m: f64,
    pub calories: f64,
    pub is_active: bool,
    pub last_updated: DateTime<Utc>,
}

/// Key-value put/get primitive over the platform's local storage.
pub trait CheckpointStore: Send + Sync {
    fn put(&self, key: &str, checkpoint: &Checkpoint) -> Result<()>;
    fn get(&self, key: &str) -> Result<Option<Checkpoint>>;
    fn clear(&self, key: &str) -> Result<()>;
}

/// Default store key for the single in-flight session.
pub const ACTIVE_SESSION_KEY: &str = "active_session";

/// One JSON file per key under a base directory.
pub struct JsonFileStore {
    base_dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir)
            .map_err(|e| TrackerError::Storage(format!("create {}: {e}", base_dir.display())))?;
        Ok(JsonFileStore { base_dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.base_dir.join(format!("{key}.json"))
    }
}

impl CheckpointStore for JsonFileStore {
    fn put(&self, key: &str, checkpoint: &Checkpoint) -> Result<()> {
        let json = serde_json::to_string_pretty(checkpoint)?;
        let path = self.path_for(key);
        std::fs::write(&path, json)
            .map_err(|e| TrackerError::Storage(format!("write {}: {e}", path.display())))?;
        debug!("checkpoint written to {}", path.display());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Checkpoint>> {
        let path = self.path_for(key);
        if !Path::new(&path).exists() {
            return Ok(None);
        }
        let json = std::fs::read_to_string(&path)
            .map_err(|e| TrackerError::Storage(format!("read {}: {e}", path.display())))?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    fn clear(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        if path.exists() {
            std::fs::remove_file(&path)
                .map_err(|e| TrackerError::Storage(format!("remove {}: {e}", path.display())))?;
        }
        Ok(())
    }
}

/// In-memory store for tests and replay.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<std::collections::HashMap<String, Checkpoint>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CheckpointStore for MemoryStore {
    fn put(&self, key: &str, checkpoint: &Checkpoint) -> Result<()> {
        self.entries
            .lock()
            .map_err(|_| TrackerError::Storage("store lock poisoned".into()))?
            .insert(key.to_string(), checkpoint.clone());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Checkpoint>> {
        Ok(self
            .entries
            .lock()
            .map_err(|_| TrackerError::Storage("store lock poisoned".into()))?
            .get(key)
            .cloned())
    }

    fn clear(&self, key: &str) -> Result<()> {
        self.entries
            .lock()
            .map_err(|_| TrackerError::Storage("store lock poisoned".into()))?
            .remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_checkpoint() -> Checkpoint {
        Checkpoint {
            session_id: "s-1".to_string(),
            ruck_weight_kg: 20.0,
            user_weight_kg: 80.0,
            start_time: Utc::now(),
            total_paused_secs: 0,
            distance_km: 2.5,
            elevation_gain_m: 40.0,
            elevation_loss_m: 12.0,
            calories: 310.0,
            is_active: true,
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryStore::new();
        assert!(store.get(ACTIVE_SESSION_KEY).unwrap().is_none());

        store.put(ACTIVE_SESSION_KEY, &sample_checkpoint()).unwrap();
        let loaded = store.get(ACTIVE_SESSION_KEY).unwrap().unwrap();
        assert_eq!(loaded.session_id, "s-1");
        assert!(loaded.is_active);

        store.clear(ACTIVE_SESSION_KEY).unwrap();
        assert!(store.get(ACTIVE_SESSION_KEY).unwrap().is_none());
    }

    #[test]
    fn file_store_round_trip() {
        let dir = std::env::temp_dir().join(format!("ruck_ckpt_{}", std::process::id()));
        let store = JsonFileStore::new(&dir).unwrap();

        store.put("t", &sample_checkpoint()).unwrap();
        let loaded = store.get("t").unwrap().unwrap();
        assert!((loaded.distance_km - 2.5).abs() < 1e-9);

        store.clear("t").unwrap();
        assert!(store.get("t").unwrap().is_none());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
