//! Settings file model and the objects built from it.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::parse_config;
use crate::constants::{DEFAULT_CACHE_LIMIT, SHELL_COMMAND_TIMEOUT};
use crate::core::DeclkitError;
use crate::storage::{ApplianceDataStore, DataStore, JsonFileDataStore, LocalShell, MemoryDataStore};
use crate::templating::KnownHashes;

/// Environment variable naming the settings file.
pub const CONFIG_ENV_VAR: &str = "DECLKIT_CONFIG";

/// Which [`DataStore`] backend persisted template sets live in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// Process memory; nothing survives the process
    Memory,
    /// One JSON document on disk
    #[default]
    File,
    /// Appliance data collection driven through a privileged shell
    Appliance,
}

/// `[store]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreSettings {
    pub kind: StoreKind,
    /// JSON document used by the `file` backend.
    pub path: PathBuf,
    /// Folder holding the appliance collection.
    pub namespace: String,
    /// Appliance collection name.
    pub collection: String,
    /// Program appliance commands are piped into.
    pub shell: String,
    /// Extra arguments for `shell`.
    pub shell_args: Vec<String>,
    pub command_timeout_secs: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            kind: StoreKind::default(),
            path: default_store_path(),
            namespace: "declkit".to_string(),
            collection: "dataStore".to_string(),
            shell: "tmsh".to_string(),
            shell_args: Vec::new(),
            command_timeout_secs: SHELL_COMMAND_TIMEOUT.as_secs(),
        }
    }
}

/// Contents of `config.toml`.
///
/// ```toml
/// cache_limit = 100
/// templates_dir = "./templates"
///
/// [store]
/// kind = "file"            # memory | file | appliance
/// path = "./declkit-store.json"
///
/// [supported_hashes]
/// examples = ["sha256:..."]
/// ```
///
/// Every key is optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Compiled engines each provider keeps.
    pub cache_limit: usize,
    /// Root of the filesystem template sets.
    pub templates_dir: PathBuf,
    pub store: StoreSettings,
    /// Set hashes accepted as supported in addition to the built-in ones.
    pub supported_hashes: BTreeMap<String, Vec<String>>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cache_limit: DEFAULT_CACHE_LIMIT,
            templates_dir: PathBuf::from("templates"),
            store: StoreSettings::default(),
            supported_hashes: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// `~/.declkit/config.toml`, or `%LOCALAPPDATA%\declkit\config.toml` on Windows.
    pub fn default_path() -> Result<PathBuf> {
        Ok(config_dir()?.join("config.toml"))
    }

    /// The settings file to read, if any.
    ///
    /// `explicit` (`--config`) wins over `env` (`DECLKIT_CONFIG`), which wins over
    /// [`Self::default_path`]. Only the default location may be absent.
    pub fn resolve_path(explicit: Option<&Path>, env: Option<OsString>) -> Result<Option<PathBuf>> {
        let chosen = explicit
            .map(Path::to_path_buf)
            .or_else(|| env.filter(|v| !v.is_empty()).map(PathBuf::from));

        if let Some(path) = chosen {
            if !path.is_file() {
                return Err(DeclkitError::ConfigError {
                    message: format!("Settings file not found: {}", path.display()),
                }
                .into());
            }
            return Ok(Some(path));
        }

        let default = Self::default_path()?;
        Ok(default.is_file().then_some(default))
    }

    /// Load settings using the lookup order of [`Self::resolve_path`].
    ///
    /// With no file anywhere the defaults apply.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match Self::resolve_path(explicit, std::env::var_os(CONFIG_ENV_VAR))? {
            Some(path) => Self::load_from(&path),
            None => {
                tracing::debug!("no settings file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load and check the settings file at `path`.
    pub fn load_from(path: &Path) -> Result<Self> {
        let settings: Self = parse_config(path)?;
        settings.validate()?;
        tracing::debug!("loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Reject values no component can work with.
    pub fn validate(&self) -> Result<()> {
        let problem = if self.cache_limit == 0 {
            Some("cache_limit must be at least 1".to_string())
        } else if self.store.command_timeout_secs == 0 {
            Some("store.command_timeout_secs must be at least 1".to_string())
        } else if self.store.kind == StoreKind::Appliance
            && (self.store.namespace.is_empty() || self.store.collection.is_empty())
        {
            Some("store.namespace and store.collection are required for the appliance store".to_string())
        } else if self.store.kind == StoreKind::File && self.store.path.as_os_str().is_empty() {
            Some("store.path is required for the file store".to_string())
        } else {
            None
        };

        match problem {
            Some(message) => Err(DeclkitError::ConfigError {
                message,
            }
            .into()),
            None => Ok(()),
        }
    }

    /// The configured [`DataStore`] backend.
    pub fn build_store(&self) -> Arc<dyn DataStore> {
        let store = &self.store;
        match store.kind {
            StoreKind::Memory => Arc::new(MemoryDataStore::new()),
            StoreKind::File => Arc::new(JsonFileDataStore::new(&store.path)),
            StoreKind::Appliance => {
                let shell = LocalShell::new(&store.shell)
                    .args(store.shell_args.iter().cloned())
                    .timeout(Duration::from_secs(store.command_timeout_secs));
                Arc::new(ApplianceDataStore::new(
                    Arc::new(shell),
                    &store.namespace,
                    &store.collection,
                ))
            }
        }
    }

    /// Built-in known hashes extended with `supported_hashes`.
    pub fn known_hashes(&self) -> KnownHashes {
        let mut known = KnownHashes::builtin();
        for (name, hashes) in &self.supported_hashes {
            known.extend(name.clone(), hashes.iter().cloned());
        }
        known
    }
}

fn config_dir() -> Result<PathBuf> {
    let dir = if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .ok_or_else(|| anyhow::anyhow!("Unable to determine local data directory"))?
            .join("declkit")
    } else {
        dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?
            .join(".declkit")
    };
    Ok(dir)
}

fn default_store_path() -> PathBuf {
    config_dir().map_or_else(|_| PathBuf::from("declkit-store.json"), |dir| dir.join("store.json"))
}
