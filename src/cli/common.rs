//! Shared state and helpers for CLI commands.

use anyhow::{Context, Result};
use serde_json::Value;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::config::Settings;
use crate::provider::{DataStoreTemplateProvider, FsTemplateProvider, TemplateProvider};

/// Everything a command works with, built once from the settings.
#[derive(Debug)]
pub struct CommandContext {
    pub settings: Settings,
    /// Template sets on disk below `settings.templates_dir`.
    pub local: FsTemplateProvider,
    /// Template sets persisted in the configured store.
    pub store: DataStoreTemplateProvider,
}

impl CommandContext {
    /// Build providers from `settings`.
    pub fn new(settings: Settings) -> Self {
        let local = FsTemplateProvider::with_cache_limit(&settings.templates_dir, settings.cache_limit);
        let store = DataStoreTemplateProvider::with_cache_limit(settings.build_store(), settings.cache_limit)
            .with_known_hashes(settings.known_hashes());
        Self {
            settings,
            local,
            store,
        }
    }

    /// Load settings (see [`Settings::load`]) and apply a `--templates-dir` override.
    pub fn load(config: Option<&Path>, templates_dir: Option<PathBuf>) -> Result<Self> {
        let mut settings = Settings::load(config)?;
        if let Some(dir) = templates_dir {
            settings.templates_dir = dir;
        }
        Ok(Self::new(settings))
    }

    /// The store provider when `from_store`, the filesystem provider otherwise.
    pub fn provider(&self, from_store: bool) -> &dyn TemplateProvider {
        if from_store { &self.store } else { &self.local }
    }
}

/// Parameters from a JSON file, or from stdin when `path` is `-`.
///
/// No path means an empty parameter object.
pub fn read_params(path: Option<&Path>) -> Result<Value> {
    let text = match path {
        None => return Ok(Value::Object(serde_json::Map::new())),
        Some(p) if p == Path::new("-") => {
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text).context("Failed to read parameters from stdin")?;
            text
        }
        Some(p) => std::fs::read_to_string(p)
            .with_context(|| format!("Failed to read parameters file: {}", p.display()))?,
    };

    if text.trim().is_empty() {
        return Ok(Value::Object(serde_json::Map::new()));
    }
    serde_json::from_str(&text).context("Parameters are not valid JSON")
}

/// Write `value` as JSON followed by a newline.
pub fn write_json(out: &mut dyn Write, value: &Value, pretty: bool) -> Result<()> {
    let text = if pretty { serde_json::to_string_pretty(value)? } else { serde_json::to_string(value)? };
    writeln!(out, "{text}")?;
    Ok(())
}
