//! Session snapshots over an opaque key-value store.
//!
//! Stored blobs may be missing, truncated or hand-edited. Decoding repairs
//! them one field at a time instead of rejecting the whole snapshot, and
//! reports every repair so the caller can log it.
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use thiserror::Error;

use crate::constants::{FIVE_STAR_PITY_CAP, FOUR_STAR_PITY_CAP, MAX_CRYSTALS};
use crate::pity::PityState;
use crate::wallet::Inventory;

/// Trait for abstracting the device-local key-value store.
/// Platform-specific implementations should provide this.
pub trait KeyValueStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Read the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, Self::Error>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), Self::Error>;

    /// Remove `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn remove(&self, key: &str) -> Result<(), Self::Error>;
}

/// In-memory store. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Rc<RefCell<HashMap<String, String>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw value under `key`, bypassing the trait.
    #[must_use]
    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }
}

impl KeyValueStore for MemoryStore {
    type Error = Infallible;

    fn get(&self, key: &str) -> Result<Option<String>, Self::Error> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), Self::Error> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), Self::Error> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}

/// Directory-backed store: one `<key>.json` file per key.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{file}.json"))
    }
}

impl KeyValueStore for FileStore {
    type Error = io::Error;

    fn get(&self, key: &str) -> Result<Option<String>, Self::Error> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), Self::Error> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.path_for(key), value)
    }

    fn remove(&self, key: &str) -> Result<(), Self::Error> {
        match fs::remove_file(self.path_for(key)) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
            _ => Ok(()),
        }
    }
}

/// Failures while reading or writing a snapshot.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("storage backend failed: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("stored snapshot is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("stored snapshot is not a JSON object")]
    NotAnObject,
}

impl PersistenceError {
    fn backend<E: std::error::Error + Send + Sync + 'static>(err: E) -> Self {
        Self::Backend(Box::new(err))
    }
}

/// Persisted session state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub crystals: u32,
    pub afterburn: u32,
    pub scrap: u32,
    pub pity_state: PityState,
    #[serde(default, skip_serializing_if = "Inventory::is_empty")]
    pub inventory: Inventory,
}

impl SessionSnapshot {
    /// Fresh-session values: full crystals, everything else empty.
    #[must_use]
    pub fn fresh(max_crystals: u32) -> Self {
        Self {
            crystals: max_crystals,
            afterburn: 0,
            scrap: 0,
            pity_state: PityState::default(),
            inventory: Inventory::new(),
        }
    }

    /// Encode for storage.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, PersistenceError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a stored blob, repairing bad fields individually.
    ///
    /// # Errors
    ///
    /// Returns an error only if the blob is not a JSON object at all.
    pub fn decode(raw: &str, bounds: SnapshotBounds) -> Result<DecodedSnapshot, PersistenceError> {
        let value: Value = serde_json::from_str(raw)?;
        let Value::Object(map) = value else {
            return Err(PersistenceError::NotAnObject);
        };

        let mut repairs = Vec::new();
        let max = u64::from(bounds.max_crystals);
        let crystals = read_count(&map, "crystals", "crystals", max, &mut repairs)
            .unwrap_or(bounds.max_crystals);
        let uncapped = u64::from(u32::MAX);
        let afterburn =
            read_count(&map, "afterburn", "afterburn", uncapped, &mut repairs).unwrap_or(0);
        let scrap = read_count(&map, "scrap", "scrap", uncapped, &mut repairs).unwrap_or(0);
        let pity_state = read_pity(&map, bounds, &mut repairs);
        let inventory = read_inventory(&map, &mut repairs);

        Ok(DecodedSnapshot {
            snapshot: Self {
                crystals,
                afterburn,
                scrap,
                pity_state,
                inventory,
            },
            repairs,
        })
    }
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self::fresh(MAX_CRYSTALS)
    }
}

/// Upper bounds applied while decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotBounds {
    pub max_crystals: u32,
    pub five_star_cap: u32,
    pub four_star_cap: u32,
}

impl Default for SnapshotBounds {
    fn default() -> Self {
        Self {
            max_crystals: MAX_CRYSTALS,
            five_star_cap: FIVE_STAR_PITY_CAP,
            four_star_cap: FOUR_STAR_PITY_CAP,
        }
    }
}

/// Why a stored field was replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairReason {
    Missing,
    Invalid,
    OutOfRange,
}

/// One field-level repair made while decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRepair {
    pub field: String,
    pub reason: RepairReason,
}

impl fmt::Display for FieldRepair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self.reason {
            RepairReason::Missing => "missing",
            RepairReason::Invalid => "invalid",
            RepairReason::OutOfRange => "out of range",
        };
        write!(f, "{} ({reason})", self.field)
    }
}

/// A decoded snapshot plus the repairs it needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedSnapshot {
    pub snapshot: SessionSnapshot,
    pub repairs: Vec<FieldRepair>,
}

fn note(repairs: &mut Vec<FieldRepair>, field: &str, reason: RepairReason) {
    repairs.push(FieldRepair {
        field: field.to_string(),
        reason,
    });
}

/// Read a non-negative integer, truncating fractions and clamping to `max`.
fn read_count(
    map: &Map<String, Value>,
    key: &str,
    label: &str,
    max: u64,
    repairs: &mut Vec<FieldRepair>,
) -> Option<u32> {
    let Some(value) = map.get(key) else {
        note(repairs, label, RepairReason::Missing);
        return None;
    };
    let Some(number) = value.as_f64().filter(|n| n.is_finite()) else {
        note(repairs, label, RepairReason::Invalid);
        return None;
    };
    if number < 0.0 {
        note(repairs, label, RepairReason::OutOfRange);
        return Some(0);
    }
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let whole = number.trunc().min(u64::MAX as f64) as u64;
    if whole > max {
        note(repairs, label, RepairReason::OutOfRange);
    }
    Some(u32::try_from(whole.min(max)).unwrap_or(u32::MAX))
}

/// Only JSON booleans are accepted; truthy numbers or strings reset to `false`.
fn read_flag(
    map: &Map<String, Value>,
    key: &str,
    label: &str,
    repairs: &mut Vec<FieldRepair>,
) -> bool {
    match map.get(key) {
        Some(Value::Bool(flag)) => *flag,
        Some(_) => {
            note(repairs, label, RepairReason::Invalid);
            false
        }
        None => {
            note(repairs, label, RepairReason::Missing);
            false
        }
    }
}

fn read_pity(
    map: &Map<String, Value>,
    bounds: SnapshotBounds,
    repairs: &mut Vec<FieldRepair>,
) -> PityState {
    let pity = match map.get("pityState") {
        Some(Value::Object(pity)) => pity,
        Some(_) => {
            note(repairs, "pityState", RepairReason::Invalid);
            return PityState::default();
        }
        None => {
            note(repairs, "pityState", RepairReason::Missing);
            return PityState::default();
        }
    };
    PityState {
        pity5: read_count(
            pity,
            "pity5",
            "pityState.pity5",
            u64::from(bounds.five_star_cap),
            repairs,
        )
        .unwrap_or(0),
        pity4: read_count(
            pity,
            "pity4",
            "pityState.pity4",
            u64::from(bounds.four_star_cap),
            repairs,
        )
        .unwrap_or(0),
        guarantee5: read_flag(pity, "guarantee5", "pityState.guarantee5", repairs),
        guarantee4: read_flag(pity, "guarantee4", "pityState.guarantee4", repairs),
    }
}

/// Inventory is optional; only malformed entries count as repairs.
fn read_inventory(map: &Map<String, Value>, repairs: &mut Vec<FieldRepair>) -> Inventory {
    let entries = match map.get("inventory") {
        None => return Inventory::new(),
        Some(Value::Object(entries)) => entries,
        Some(_) => {
            note(repairs, "inventory", RepairReason::Invalid);
            return Inventory::new();
        }
    };
    entries
        .iter()
        .filter_map(|(id, count)| {
            let valid = count
                .as_u64()
                .filter(|n| *n >= 1)
                .and_then(|n| u32::try_from(n).ok());
            if valid.is_none() {
                note(repairs, &format!("inventory.{id}"), RepairReason::Invalid);
            }
            valid.map(|n| (id.clone(), n))
        })
        .collect()
}

/// Load the snapshot stored under `key`.
///
/// # Errors
///
/// Returns an error if the backend fails or the blob is unreadable as a
/// whole. Field-level problems are repaired and reported instead.
pub fn load_snapshot<S: KeyValueStore>(
    store: &S,
    key: &str,
    bounds: SnapshotBounds,
) -> Result<Option<DecodedSnapshot>, PersistenceError> {
    let Some(raw) = store.get(key).map_err(PersistenceError::backend)? else {
        return Ok(None);
    };
    SessionSnapshot::decode(&raw, bounds).map(Some)
}

/// Store `snapshot` under `key`.
///
/// # Errors
///
/// Returns an error if encoding or the backend write fails.
pub fn save_snapshot<S: KeyValueStore>(
    store: &S,
    key: &str,
    snapshot: &SessionSnapshot,
) -> Result<(), PersistenceError> {
    let json = snapshot.to_json()?;
    store.set(key, &json).map_err(PersistenceError::backend)
}

/// Read a millisecond timestamp stored under `key`; unparsable values read as absent.
///
/// # Errors
///
/// Returns an error if the backend fails.
pub fn load_timestamp<S: KeyValueStore>(
    store: &S,
    key: &str,
) -> Result<Option<u64>, PersistenceError> {
    let raw = store.get(key).map_err(PersistenceError::backend)?;
    Ok(raw.and_then(|value| value.trim().parse::<u64>().ok()))
}

/// Store a millisecond timestamp under `key`.
///
/// # Errors
///
/// Returns an error if the backend write fails.
pub fn save_timestamp<S: KeyValueStore>(
    store: &S,
    key: &str,
    millis: u64,
) -> Result<(), PersistenceError> {
    store
        .set(key, &millis.to_string())
        .map_err(PersistenceError::backend)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(decoded: &DecodedSnapshot) -> Vec<&str> {
        decoded
            .repairs
            .iter()
            .map(|repair| repair.field.as_str())
            .collect()
    }

    #[test]
    fn snapshot_roundtrips_through_memory_store() {
        let store = MemoryStore::new();
        let mut snapshot = SessionSnapshot::default();
        snapshot.crystals = 1_234;
        snapshot.afterburn = 45;
        snapshot.pity_state = PityState::new(17, 2).with_guarantees(true, false);
        snapshot.inventory.add("item_nada");

        save_snapshot(&store, "slot", &snapshot).unwrap();
        let loaded = load_snapshot(&store, "slot", SnapshotBounds::default())
            .unwrap()
            .expect("snapshot stored");
        assert_eq!(loaded.snapshot, snapshot);
        assert!(loaded.repairs.is_empty());
        assert!(
            load_snapshot(&store, "missing", SnapshotBounds::default())
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn stored_shape_uses_camel_case_keys() {
        let json = SessionSnapshot::default().to_json().unwrap();
        assert!(json.contains("\"pityState\""));
        assert!(json.contains("\"guarantee5\""));
        assert!(!json.contains("inventory"));
    }

    #[test]
    fn decode_repairs_fields_individually() {
        let raw = r#"{
            "crystals": "lots",
            "afterburn": 12.9,
            "scrap": -4,
            "pityState": { "pity5": 500, "pity4": 3, "guarantee5": "yes" }
        }"#;
        let decoded = SessionSnapshot::decode(raw, SnapshotBounds::default()).unwrap();
        let snapshot = &decoded.snapshot;
        assert_eq!(snapshot.crystals, 14_000);
        assert_eq!(snapshot.afterburn, 12);
        assert_eq!(snapshot.scrap, 0);
        assert_eq!(snapshot.pity_state.pity5, 80);
        assert_eq!(snapshot.pity_state.pity4, 3);
        assert!(!snapshot.pity_state.guarantee5);
        assert!(!snapshot.pity_state.guarantee4);
        assert_eq!(
            fields(&decoded),
            vec![
                "crystals",
                "scrap",
                "pityState.pity5",
                "pityState.guarantee5",
                "pityState.guarantee4",
            ]
        );
        assert_eq!(decoded.repairs[0].reason, RepairReason::Invalid);
        assert_eq!(decoded.repairs[1].reason, RepairReason::OutOfRange);
    }

    #[test]
    fn truthy_non_boolean_flags_reset_to_false() {
        let raw = r#"{ "pityState": { "pity5": 1, "pity4": 1, "guarantee5": 1, "guarantee4": "true" } }"#;
        let decoded = SessionSnapshot::decode(raw, SnapshotBounds::default()).unwrap();
        assert!(!decoded.snapshot.pity_state.guarantee5);
        assert!(!decoded.snapshot.pity_state.guarantee4);
        let flags: Vec<_> = decoded
            .repairs
            .iter()
            .filter(|repair| repair.field.starts_with("pityState.guarantee"))
            .map(|repair| repair.reason)
            .collect();
        assert_eq!(flags, vec![RepairReason::Invalid, RepairReason::Invalid]);
    }

    #[test]
    fn decode_defaults_missing_sections() {
        let decoded = SessionSnapshot::decode("{}", SnapshotBounds::default()).unwrap();
        assert_eq!(decoded.snapshot, SessionSnapshot::default());
        assert_eq!(
            fields(&decoded),
            vec!["crystals", "afterburn", "scrap", "pityState"]
        );
        assert!(
            decoded
                .repairs
                .iter()
                .all(|repair| repair.reason == RepairReason::Missing)
        );
    }

    #[test]
    fn decode_drops_bad_inventory_entries() {
        let raw = r#"{ "inventory": { "a": 2, "b": 0, "c": "x" } }"#;
        let decoded = SessionSnapshot::decode(raw, SnapshotBounds::default()).unwrap();
        assert_eq!(decoded.snapshot.inventory.count("a"), 2);
        assert!(!decoded.snapshot.inventory.contains("b"));
        assert!(fields(&decoded).contains(&"inventory.b"));
        assert!(fields(&decoded).contains(&"inventory.c"));
    }

    #[test]
    fn decode_rejects_non_objects() {
        assert!(matches!(
            SessionSnapshot::decode("[1,2]", SnapshotBounds::default()),
            Err(PersistenceError::NotAnObject)
        ));
        assert!(matches!(
            SessionSnapshot::decode("{ nope", SnapshotBounds::default()),
            Err(PersistenceError::Json(_))
        ));
    }

    #[test]
    fn timestamps_ignore_garbage() {
        let store = MemoryStore::new();
        assert_eq!(load_timestamp(&store, "t").unwrap(), None);
        save_timestamp(&store, "t", 42).unwrap();
        assert_eq!(load_timestamp(&store, "t").unwrap(), Some(42));
        store.set("t", "soon").unwrap();
        assert_eq!(load_timestamp(&store, "t").unwrap(), None);
    }

    #[test]
    fn file_store_reads_writes_and_removes() {
        let dir = std::env::temp_dir().join(format!(
            "convene-store-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        ));
        let store = FileStore::new(&dir);
        assert_eq!(store.get("gacha_state").unwrap(), None);
        store.set("gacha_state", "{}").unwrap();
        assert!(dir.join("gacha_state.json").exists());
        assert_eq!(store.get("gacha_state").unwrap().as_deref(), Some("{}"));
        store.remove("gacha_state").unwrap();
        store.remove("gacha_state").unwrap();
        assert_eq!(store.get("gacha_state").unwrap(), None);
        let _ = fs::remove_dir_all(dir);
    }
}
