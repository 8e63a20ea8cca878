//! World-state store: path-addressable get / set / update over the entity tree.
//!
//! No transactions, last write wins. External writers own the input fields
//! (grid, solar, load, clock); the driver writes only what a step changes.

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use tracing::{debug, info};
use types::WorldState;

use crate::error::StoreError;
use crate::tree::JsonTree;

/// Top-level keys a usable snapshot must carry.
pub const REQUIRED_KEYS: [&str; 4] = ["grid", "house_a", "house_b", "simulation"];

/// Shared world-state store.
pub trait WorldStore: Send + Sync {
    /// Whole snapshot. `Ok(None)` when the store is empty or a required
    /// top-level key is absent; `Err(Corrupt)` when present but unreadable.
    fn get_full_state(&self) -> Result<Option<WorldState>, StoreError>;

    /// Raw value at `path`, `None` if absent.
    fn get(&self, path: &str) -> Result<Option<Value>, StoreError>;

    /// Overwrite the value at `path`.
    fn set(&self, path: &str, value: Value) -> Result<(), StoreError>;

    /// Merge `fields` into the object at `path`.
    fn update(&self, path: &str, fields: Map<String, Value>) -> Result<(), StoreError>;

    /// Replace everything with the initial world and return it.
    fn reset(&self) -> Result<WorldState, StoreError>;
}

/// Decode a raw root into a snapshot.
pub(crate) fn decode_state(root: &Value) -> Result<Option<WorldState>, StoreError> {
    let Some(obj) = root.as_object() else {
        return Ok(None);
    };
    if REQUIRED_KEYS.iter().any(|k| obj.get(*k).is_none_or(Value::is_null)) {
        return Ok(None);
    }
    serde_json::from_value(root.clone())
        .map(Some)
        .map_err(|e| StoreError::Corrupt(e.to_string()))
}

// ─────────────────────────────────────────────────────────────────────────────
// In-memory
// ─────────────────────────────────────────────────────────────────────────────

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tree: RwLock<JsonTree>,
}

impl MemoryStore {
    /// An empty store; the first `get_full_state` returns `None`.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store already holding `state`.
    pub fn with_state(state: &WorldState) -> Result<Self, StoreError> {
        Ok(Self {
            tree: RwLock::new(JsonTree::new(serde_json::to_value(state)?)),
        })
    }
}

impl WorldStore for MemoryStore {
    fn get_full_state(&self) -> Result<Option<WorldState>, StoreError> {
        decode_state(self.tree.read().root())
    }

    fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.tree.read().get(path).cloned())
    }

    fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        self.tree.write().set(path, value)
    }

    fn update(&self, path: &str, fields: Map<String, Value>) -> Result<(), StoreError> {
        self.tree.write().update(path, fields)
    }

    fn reset(&self) -> Result<WorldState, StoreError> {
        let state = WorldState::initial();
        *self.tree.write() = JsonTree::new(serde_json::to_value(&state)?);
        info!("world state reset");
        Ok(state)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// JSON file
// ─────────────────────────────────────────────────────────────────────────────

/// Store persisted as a pretty-printed JSON document.
///
/// The file is the only copy of the world: every read loads it from disk and
/// every write reloads, modifies and rewrites it, so values written by other
/// processes (a sensor bridge, a dashboard) are seen on the next read and
/// survive the driver's own writes.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    /// Serializes this process's read-modify-write cycles.
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Open `path`. A missing file reads as an empty store.
    ///
    /// A file that exists but is not valid JSON reads as an empty tree so
    /// the driver can reset over it.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        read_root(&path)?;
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<JsonTree, StoreError> {
        read_root(&self.path).map(JsonTree::new)
    }

    fn modify(
        &self,
        apply: impl FnOnce(&mut JsonTree) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock();
        let mut tree = self.load()?;
        apply(&mut tree)?;
        self.flush(&tree)
    }

    fn flush(&self, tree: &JsonTree) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(tree.root())?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Current document at `path`; `Null` when missing, empty or unparsable.
fn read_root(path: &Path) -> Result<Value, StoreError> {
    match fs::read_to_string(path) {
        Ok(text) if text.trim().is_empty() => Ok(Value::Null),
        Ok(text) => Ok(serde_json::from_str(&text).unwrap_or_else(|e| {
            debug!(path = %path.display(), error = %e, "unreadable store file, treating as empty");
            Value::Null
        })),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Value::Null),
        Err(e) => Err(e.into()),
    }
}

impl WorldStore for JsonFileStore {
    fn get_full_state(&self) -> Result<Option<WorldState>, StoreError> {
        decode_state(self.load()?.root())
    }

    fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.load()?.get(path).cloned())
    }

    fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        self.modify(|tree| tree.set(path, value))
    }

    fn update(&self, path: &str, fields: Map<String, Value>) -> Result<(), StoreError> {
        self.modify(|tree| tree.update(path, fields))
    }

    fn reset(&self) -> Result<WorldState, StoreError> {
        let state = WorldState::initial();
        let root = serde_json::to_value(&state)?;
        self.modify(|tree| {
            *tree = JsonTree::new(root);
            Ok(())
        })?;
        info!(path = %self.path.display(), "world state reset");
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use types::{Cash, GridStatus};

    #[test]
    fn test_empty_store_has_no_state() {
        let store = MemoryStore::new();
        assert!(store.get_full_state().unwrap().is_none());
    }

    #[test]
    fn test_reset_writes_initial_world() {
        let store = MemoryStore::new();
        let state = store.reset().unwrap();
        assert_eq!(state, WorldState::initial());
        assert_eq!(store.get_full_state().unwrap(), Some(state));
        assert_eq!(store.get("grid/voltage").unwrap(), Some(json!(220)));
    }

    #[test]
    fn test_missing_required_key_reads_as_absent() {
        let store = MemoryStore::new();
        store.reset().unwrap();
        store.set("simulation", Value::Null).unwrap();
        assert!(store.get_full_state().unwrap().is_none());
    }

    #[test]
    fn test_corrupt_household_is_reported() {
        let store = MemoryStore::new();
        store.reset().unwrap();
        store.set("house_a/battery_level", json!("full")).unwrap();
        assert!(matches!(
            store.get_full_state(),
            Err(StoreError::Corrupt(_))
        ));
    }

    #[test]
    fn test_update_fields_visible_in_snapshot() {
        let store = MemoryStore::with_state(&WorldState::initial()).unwrap();
        let fields = json!({"status": "BLACKOUT", "voltage": 0});
        store
            .update("grid", fields.as_object().unwrap().clone())
            .unwrap();
        store.set("house_b/wallet_balance", json!(1950.5)).unwrap();

        let state = store.get_full_state().unwrap().unwrap();
        assert_eq!(state.grid.status, GridStatus::Blackout);
        assert_eq!(state.house_b.wallet_balance, Cash::from_float(1950.5));
    }

    #[test]
    fn test_file_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("world.json");

        let store = JsonFileStore::open(&path).unwrap();
        assert!(store.get_full_state().unwrap().is_none());
        store.reset().unwrap();
        store.set("community/total_donated_kwh", json!(1.2)).unwrap();
        drop(store);

        let reopened = JsonFileStore::open(&path).unwrap();
        let state = reopened.get_full_state().unwrap().unwrap();
        assert_eq!(state.community.total_donated_kwh, 1.2);
    }

    #[test]
    fn test_file_store_ignores_garbage_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("world.json");
        fs::write(&path, "{not json").unwrap();

        let store = JsonFileStore::open(&path).unwrap();
        assert!(store.get_full_state().unwrap().is_none());
        store.reset().unwrap();
        assert!(store.get_full_state().unwrap().is_some());
    }

    #[test]
    fn test_file_store_sees_external_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("world.json");
        let store = JsonFileStore::open(&path).unwrap();
        store.reset().unwrap();

        // Another process rewrites the document.
        let mut doc: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        doc["house_a"]["solar_output"] = json!(4.2);
        fs::write(&path, serde_json::to_vec_pretty(&doc).unwrap()).unwrap();

        let state = store.get_full_state().unwrap().unwrap();
        assert_eq!(state.house_a.solar_output, 4.2);
        assert_eq!(store.get("house_a/solar_output").unwrap(), Some(json!(4.2)));
    }

    #[test]
    fn test_file_store_write_keeps_external_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("world.json");
        let driver = JsonFileStore::open(&path).unwrap();
        driver.reset().unwrap();

        let sensor = JsonFileStore::open(&path).unwrap();
        sensor.set("house_a/solar_output", json!(4.2)).unwrap();
        driver.set("market/active_contract", json!(false)).unwrap();

        let reopened = JsonFileStore::open(&path).unwrap();
        let state = reopened.get_full_state().unwrap().unwrap();
        assert_eq!(state.house_a.solar_output, 4.2);
        assert!(!state.market.active_contract);
    }
}
