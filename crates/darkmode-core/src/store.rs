//! Extension storage.
//!
//! Storage is a flat JSON key-value namespace shared by the popup and every
//! page agent, without locking or transactions: the last write wins. The
//! popup writes the global keys, page agents write the per-page map, so the
//! two writers never touch the same key.
//!
//! `Store` is the raw namespace; `SettingsStore` layers the typed records
//! on top of it and applies the settings defaulting on every read.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::settings::{PageId, PageState, SettingsRecord};

/// Global settings record.
pub const SETTINGS_KEY: &str = "extensionSettings";

/// Global on/off toggle.
pub const ENABLED_KEY: &str = "darkModeEnabled";

/// Map from page identity to `PageState`.
pub const PAGE_STATES_KEY: &str = "darkModeStates";

/// Flat key-value storage backend.
pub trait Store: Send + Sync {
    /// Read the given keys. Keys without a value are absent from the result.
    fn get(&self, keys: &[&str]) -> Result<Map<String, Value>>;

    /// Write the given keys, leaving all other keys untouched.
    fn set(&self, items: Map<String, Value>) -> Result<()>;
}

impl<S: Store + ?Sized> Store for Arc<S> {
    fn get(&self, keys: &[&str]) -> Result<Map<String, Value>> {
        (**self).get(keys)
    }

    fn set(&self, items: Map<String, Value>) -> Result<()> {
        (**self).set(items)
    }
}

fn select(data: &Map<String, Value>, keys: &[&str]) -> Map<String, Value> {
    keys.iter()
        .filter_map(|key| data.get(*key).map(|value| ((*key).to_string(), value.clone())))
        .collect()
}

/// Process-local storage.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Mutex<Map<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-populated with `data`.
    pub fn with_data(data: Map<String, Value>) -> Self {
        Self {
            data: Mutex::new(data),
        }
    }

    /// Copy of the whole namespace.
    pub fn dump(&self) -> Map<String, Value> {
        self.data.lock().clone()
    }
}

impl Store for MemoryStore {
    fn get(&self, keys: &[&str]) -> Result<Map<String, Value>> {
        Ok(select(&self.data.lock(), keys))
    }

    fn set(&self, items: Map<String, Value>) -> Result<()> {
        let mut data = self.data.lock();
        for (key, value) in items {
            data.insert(key, value);
        }
        Ok(())
    }
}

/// Storage persisted as a single JSON object in a file.
///
/// A missing file reads as an empty namespace. Writes replace the file via a
/// temporary sibling and a rename.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    // Serializes read-merge-write cycles within this process.
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<Map<String, Value>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };

        if content.trim().is_empty() {
            return Ok(Map::new());
        }

        match serde_json::from_str::<Value>(&content)? {
            Value::Object(map) => Ok(map),
            _ => Err(Error::Store(format!(
                "{} does not contain a JSON object",
                self.path.display()
            ))),
        }
    }

    fn write_all(&self, data: &Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(data)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl Store for JsonFileStore {
    fn get(&self, keys: &[&str]) -> Result<Map<String, Value>> {
        Ok(select(&self.read_all()?, keys))
    }

    fn set(&self, items: Map<String, Value>) -> Result<()> {
        let _guard = self.write_lock.lock();
        let mut data = self.read_all()?;
        for (key, value) in items {
            data.insert(key, value);
        }
        self.write_all(&data)?;
        debug!("Wrote storage file {}", self.path.display());
        Ok(())
    }
}

/// All three storage keys read in one call.
#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    /// Global settings, if ever saved.
    pub settings: Option<SettingsRecord>,
    /// Global toggle, if ever saved.
    pub enabled: Option<bool>,
    page_states: Map<String, Value>,
}

impl StoreSnapshot {
    fn from_map(mut map: Map<String, Value>) -> Self {
        let settings = match map.remove(SETTINGS_KEY) {
            None | Some(Value::Null) => None,
            Some(value) => Some(SettingsRecord::from_value(&value)),
        };
        let enabled = map.get(ENABLED_KEY).and_then(Value::as_bool);
        let page_states = match map.remove(PAGE_STATES_KEY) {
            Some(Value::Object(states)) => states,
            None | Some(Value::Null) => Map::new(),
            Some(_) => {
                warn!("Ignoring malformed {PAGE_STATES_KEY} entry");
                Map::new()
            }
        };

        Self {
            settings,
            enabled,
            page_states,
        }
    }

    /// Stored state for one page, if present and well-formed.
    pub fn page_state(&self, id: &PageId) -> Option<PageState> {
        let value = self.page_states.get(id.as_str())?;
        match serde_json::from_value(value.clone()) {
            Ok(state) => Some(state),
            Err(e) => {
                warn!("Ignoring malformed page state for {id}: {e}");
                None
            }
        }
    }

    /// Global settings, or the defaults when never saved.
    pub fn settings_or_default(&self) -> SettingsRecord {
        self.settings.clone().unwrap_or_default()
    }
}

/// Typed access to the extension's storage keys.
#[derive(Debug)]
pub struct SettingsStore<S> {
    store: S,
    /// Cap on stored page states; 0 keeps every page.
    max_page_states: usize,
}

impl<S: Store> SettingsStore<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            max_page_states: 0,
        }
    }

    /// Keep at most `max` page states, evicting the least recently written.
    /// `0` disables the cap.
    pub fn with_max_page_states(mut self, max: usize) -> Self {
        self.max_page_states = max;
        self
    }

    /// The underlying backend.
    pub fn backend(&self) -> &S {
        &self.store
    }

    pub fn snapshot(&self) -> Result<StoreSnapshot> {
        let map = self
            .store
            .get(&[SETTINGS_KEY, ENABLED_KEY, PAGE_STATES_KEY])?;
        Ok(StoreSnapshot::from_map(map))
    }

    /// Global settings, or the defaults when never saved.
    pub fn global_settings(&self) -> Result<SettingsRecord> {
        let map = self.store.get(&[SETTINGS_KEY])?;
        Ok(StoreSnapshot::from_map(map).settings_or_default())
    }

    /// Global toggle, `None` when never saved.
    pub fn global_enabled(&self) -> Result<Option<bool>> {
        let map = self.store.get(&[ENABLED_KEY])?;
        Ok(map.get(ENABLED_KEY).and_then(Value::as_bool))
    }

    /// Write the global settings and toggle together.
    pub fn save_globals(&self, settings: &SettingsRecord, enabled: bool) -> Result<()> {
        let mut items = Map::new();
        items.insert(SETTINGS_KEY.to_string(), settings.to_value());
        items.insert(ENABLED_KEY.to_string(), Value::Bool(enabled));
        self.store.set(items)
    }

    pub fn page_state(&self, id: &PageId) -> Result<Option<PageState>> {
        let map = self.store.get(&[PAGE_STATES_KEY])?;
        Ok(StoreSnapshot::from_map(map).page_state(id))
    }

    /// Every stored page state, in storage order. Malformed entries are skipped.
    pub fn page_states(&self) -> Result<Vec<(String, PageState)>> {
        let map = self.store.get(&[PAGE_STATES_KEY])?;
        let snapshot = StoreSnapshot::from_map(map);
        Ok(snapshot
            .page_states
            .into_iter()
            .filter_map(|(id, value)| {
                serde_json::from_value::<PageState>(value)
                    .ok()
                    .map(|state| (id, state))
            })
            .collect())
    }

    /// Write one page's state, keeping every other page's entry.
    ///
    /// This is a read-modify-write of the whole map; concurrent writers for
    /// different pages can lose each other's update.
    pub fn put_page_state(&self, id: &PageId, state: &PageState) -> Result<()> {
        let mut current = self.store.get(&[PAGE_STATES_KEY])?;
        let mut states = match current.remove(PAGE_STATES_KEY) {
            Some(Value::Object(states)) => states,
            _ => Map::new(),
        };

        if self.max_page_states > 0 {
            // Re-insert at the end so eviction order follows write recency.
            states = states
                .into_iter()
                .filter(|(key, _)| key != id.as_str())
                .collect();
        }

        states.insert(id.as_str().to_string(), serde_json::to_value(state)?);

        if self.max_page_states > 0 && states.len() > self.max_page_states {
            let excess = states.len() - self.max_page_states;
            debug!("Evicting {excess} page state(s) over the cap");
            states = states.into_iter().skip(excess).collect();
        }

        let mut items = Map::new();
        items.insert(PAGE_STATES_KEY.to_string(), Value::Object(states));
        self.store.set(items)
    }
}
