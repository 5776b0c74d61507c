//! Configuration types and parsing.
//!
//! The configuration covers the host side of the extension: where storage
//! lives, how much per-page state it keeps, and how the popup reacts to a
//! page without an agent. Dark mode settings themselves are user data and
//! live in storage, not here.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use toml::Table;

use crate::error::{Error, Result};

/// Embedded default configuration TOML, compiled into the binary.
pub const DEFAULT_CONFIG_TOML: &str = include_str!("../../../config.toml");

/// Config file under the config directory.
const CONFIG_FILE: &str = "darkmode/config.toml";

/// Storage file under the data directory.
const STORAGE_FILE: &str = "darkmode/storage.json";

/// Caps below this evict page states almost immediately.
const SMALL_PAGE_STATE_CAP: usize = 10;

/// Result of loading a configuration file.
#[derive(Debug)]
pub struct ConfigLoadResult {
    /// The loaded configuration.
    pub config: Config,
    /// Path where config was found, if any.
    pub source: Option<PathBuf>,
    /// Whether defaults were used (no config file found).
    pub used_defaults: bool,
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Storage backend configuration.
    pub store: StoreConfig,

    /// Popup behavior.
    pub control: ControlConfig,
}

impl Config {
    /// Load configuration from the embedded default TOML string.
    pub fn from_default_toml() -> Result<Self> {
        let config: Config = toml::from_str(DEFAULT_CONFIG_TOML)?;
        Ok(config)
    }

    /// Read a TOML file and merge it over the embedded defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::ConfigNotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path)?;
        Self::load_with_defaults(&content)
    }

    /// Merge a TOML string over the embedded defaults.
    ///
    /// Both are parsed as TOML tables and deep-merged (user values win)
    /// before deserializing, so unknown keys are still rejected.
    pub fn load_with_defaults(user_toml: &str) -> Result<Self> {
        let mut base: Table = toml::from_str(DEFAULT_CONFIG_TOML)?;
        let user: Table = toml::from_str(user_toml)?;

        deep_merge_toml(&mut base, user);

        let config: Config = base.try_into()?;
        Ok(config)
    }

    /// Find and load configuration using the XDG lookup chain.
    ///
    /// An explicit path is strict: it must exist and parse.
    ///
    /// Otherwise the first existing file of
    /// 1. `$XDG_CONFIG_HOME/darkmode/config.toml`
    /// 2. `~/.config/darkmode/config.toml`
    /// 3. `./config.toml` (current working directory)
    ///
    /// is loaded, and a load error on it is returned as-is rather than
    /// skipped. With no file anywhere, the embedded defaults are used.
    pub fn find_and_load(explicit_path: Option<&Path>) -> Result<ConfigLoadResult> {
        let search_paths = Self::config_search_paths();

        let found = match explicit_path {
            Some(path) => Some(path.to_path_buf()),
            None => search_paths.iter().find(|path| path.exists()).cloned(),
        };

        if let Some(path) = found {
            let config = Self::load(&path).inspect_err(|e| {
                tracing::error!("Failed to load config file {:?}: {}", path, e);
            })?;
            return Ok(ConfigLoadResult {
                config,
                source: Some(path),
                used_defaults: false,
            });
        }

        tracing::info!("No config file found, using built-in defaults");
        tracing::debug!(
            "Searched: {}",
            search_paths
                .iter()
                .map(|path| path.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(ConfigLoadResult {
            config: Self::from_default_toml()?,
            source: None,
            used_defaults: true,
        })
    }

    /// Config file candidates, most specific first.
    pub fn config_search_paths() -> Vec<PathBuf> {
        let xdg = env::var("XDG_CONFIG_HOME")
            .ok()
            .map(|dir| PathBuf::from(dir).join(CONFIG_FILE));
        let home = env::var("HOME")
            .ok()
            .map(|dir| PathBuf::from(dir).join(".config").join(CONFIG_FILE));

        xdg.into_iter()
            .chain(home)
            .chain(std::iter::once(PathBuf::from("config.toml")))
            .collect()
    }

    /// Resolve the storage file.
    ///
    /// An empty `store.path` means `$XDG_DATA_HOME/darkmode/storage.json`,
    /// then `~/.local/share/darkmode/storage.json`, then `./storage.json`.
    pub fn store_path(&self) -> PathBuf {
        if !self.store.path.is_empty() {
            return PathBuf::from(&self.store.path);
        }

        if let Ok(xdg_data) = env::var("XDG_DATA_HOME") {
            if !xdg_data.is_empty() {
                return PathBuf::from(xdg_data).join(STORAGE_FILE);
            }
        }

        match env::var("HOME") {
            Ok(home) => PathBuf::from(home).join(".local/share").join(STORAGE_FILE),
            Err(_) => PathBuf::from("storage.json"),
        }
    }

    /// Validate the configuration, returning every invalid value at once.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        let path = self.store.path.as_str();
        if !path.is_empty() {
            if path.trim().is_empty() {
                errors.push("store.path: must not be blank".to_string());
            } else if path.ends_with('/') || Path::new(path).file_name().is_none() {
                errors.push(format!(
                    "store.path: invalid value '{}', expected a file path",
                    path
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::ConfigValidation(errors))
        }
    }

    /// Non-fatal issues worth reporting.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        let cap = self.store.max_page_states;
        if cap > 0 && cap < SMALL_PAGE_STATE_CAP {
            warnings.push(format!(
                "store.max_page_states: {} is very small; pages will forget their state quickly",
                cap
            ));
        }

        if !self.control.provision_on_missing_agent {
            warnings.push(
                "control.provision_on_missing_agent: disabled; Apply fails on pages \
                 opened before the extension was loaded"
                    .to_string(),
            );
        }

        warnings
    }

    /// Human-readable summary of the configuration.
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();

        lines.push("Store:".to_string());
        if self.store.path.is_empty() {
            lines.push(format!("  path: {} (default)", self.store_path().display()));
        } else {
            lines.push(format!("  path: {}", self.store.path));
        }
        if self.store.max_page_states == 0 {
            lines.push("  max_page_states: unbounded".to_string());
        } else {
            lines.push(format!(
                "  max_page_states: {}",
                self.store.max_page_states
            ));
        }

        lines.push("\nControl:".to_string());
        lines.push(format!(
            "  provision_on_missing_agent: {}",
            self.control.provision_on_missing_agent
        ));

        lines.join("\n")
    }
}

/// Merge `overlay` into `base`. Tables merge key by key; any other value
/// (arrays included) replaces what was there.
fn deep_merge_toml(base: &mut Table, overlay: Table) {
    for (key, overlay_value) in overlay {
        match (base.get_mut(&key), overlay_value) {
            (Some(toml::Value::Table(base_table)), toml::Value::Table(overlay_table)) => {
                deep_merge_toml(base_table, overlay_table);
            }
            (_, overlay_value) => {
                base.insert(key, overlay_value);
            }
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Storage file. Empty selects the per-user data directory.
    pub path: String,

    /// Maximum number of remembered page states; 0 keeps every page.
    pub max_page_states: usize,
}

/// Popup behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ControlConfig {
    /// Attach an agent and retry once when a page has none.
    pub provision_on_missing_agent: bool,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            provision_on_missing_agent: true,
        }
    }
}
