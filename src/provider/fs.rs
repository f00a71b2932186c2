//! Template provider reading template sets from a directory tree.

use anyhow::{Context, Result};
use futures::future::BoxFuture;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use walkdir::WalkDir;

use super::{ProviderCore, TemplateProvider, split_template_name, template_not_found};
use crate::constants::{DEFAULT_CACHE_LIMIT, SCHEMA_EXTENSION, TEMPLATE_EXTENSION};
use crate::core::DeclkitError;
use crate::templating::{Engine, SchemaSet, TemplateSetData, compile};

/// Template sets stored as directories below a root.
///
/// Every sub-directory of the root is a template set. Inside a set, `*.mst`
/// files are templates and `*.json` files are schema sets named by their stem.
/// Hidden directories are ignored.
///
/// ```rust,no_run
/// use declkit::provider::{FsTemplateProvider, TemplateProvider};
///
/// # async fn example() -> anyhow::Result<()> {
/// let provider = FsTemplateProvider::new("templates");
/// let engine = provider.fetch("examples/simple_http").await?;
/// println!("{}", engine.schema());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct FsTemplateProvider {
    root: PathBuf,
    filter: Option<BTreeSet<String>>,
    removed: Mutex<BTreeSet<String>>,
    core: ProviderCore,
}

impl FsTemplateProvider {
    /// Provider over every set below `root`, caching the default number of engines.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_cache_limit(root, DEFAULT_CACHE_LIMIT)
    }

    /// Provider over every set below `root`, caching at most `cache_limit` engines.
    pub fn with_cache_limit(root: impl Into<PathBuf>, cache_limit: usize) -> Self {
        Self {
            root: root.into(),
            filter: None,
            removed: Mutex::new(BTreeSet::new()),
            core: ProviderCore::new(cache_limit),
        }
    }

    /// Only expose the named sets.
    #[must_use]
    pub fn with_filter<I, S>(mut self, sets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filter = Some(sets.into_iter().map(Into::into).collect());
        self
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Shared provider state.
    pub fn core(&self) -> &ProviderCore {
        &self.core
    }

    fn removed(&self) -> MutexGuard<'_, BTreeSet<String>> {
        self.removed.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn is_visible(&self, set: &str) -> bool {
        self.filter.as_ref().is_none_or(|f| f.contains(set)) && !self.removed().contains(set)
    }

    async fn visible_sets(&self) -> Result<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(target: "provider", "templates directory {} does not exist", self.root.display());
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to read templates directory: {}", self.root.display())
                });
            }
        };

        let mut sets = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with('.') && self.is_visible(&name) {
                sets.push(name);
            }
        }
        sets.sort();
        Ok(sets)
    }

    async fn load_set(&self, set: &str) -> Result<TemplateSetData> {
        if !self.is_visible(set) {
            return Err(DeclkitError::SetNotFound {
                name: set.to_string(),
            }
            .into());
        }
        let dir = self.root.join(set);
        if !tokio::fs::metadata(&dir).await.is_ok_and(|m| m.is_dir()) {
            return Err(DeclkitError::SetNotFound {
                name: set.to_string(),
            }
            .into());
        }

        let name = set.to_string();
        tokio::task::spawn_blocking(move || read_set_dir(&name, &dir))
            .await
            .context("Template set read task failed")?
    }

    async fn load_schemas(&self) -> Result<SchemaSet> {
        let mut sets = Vec::new();
        for set in self.visible_sets().await? {
            sets.push(self.load_set(&set).await?);
        }
        SchemaSet::from_set_data(&sets)
    }

    async fn read_template(&self, name: &str) -> Result<String> {
        let path = split_template_name(name)
            .filter(|(set, _)| self.is_visible(set))
            .map(|(set, template)| self.root.join(set).join(format!("{template}.{TEMPLATE_EXTENSION}")));

        if let Some(path) = path {
            match tokio::fs::read_to_string(&path).await {
                Ok(text) => return Ok(text),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to read template: {}", path.display()));
                }
            }
        }

        Err(template_not_found(name, &self.list_templates().await?))
    }

    async fn fetch_engine(&self, name: &str) -> Result<Arc<Engine>> {
        self.core
            .engine(name, || async {
                let text = self.read_template(name).await?;
                let schemas = self.core.schemas(|| self.load_schemas()).await?;
                compile(name, &text, &schemas)
            })
            .await
    }

    async fn list_templates(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for set in self.visible_sets().await? {
            let data = self.load_set(&set).await?;
            names.extend(data.templates.keys().map(|t| format!("{set}/{t}")));
        }
        Ok(names)
    }
}

/// Read every template and schema file directly inside `dir`.
fn read_set_dir(name: &str, dir: &Path) -> Result<TemplateSetData> {
    let mut templates = BTreeMap::new();
    let mut schemas = BTreeMap::new();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to read template set: {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let (Some(stem), Some(extension)) =
            (path.file_stem().and_then(|s| s.to_str()), path.extension().and_then(|e| e.to_str()))
        else {
            continue;
        };

        let target = match extension {
            TEMPLATE_EXTENSION => &mut templates,
            SCHEMA_EXTENSION => &mut schemas,
            _ => continue,
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        target.insert(stem.to_string(), text);
    }

    tracing::trace!(
        target: "provider",
        "read set '{}': {} template(s), {} schema file(s)",
        name,
        templates.len(),
        schemas.len()
    );
    Ok(TemplateSetData::new(name, templates, schemas))
}

impl TemplateProvider for FsTemplateProvider {
    fn fetch<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<Arc<Engine>>> {
        Box::pin(self.fetch_engine(name))
    }

    fn list(&self) -> BoxFuture<'_, Result<Vec<String>>> {
        Box::pin(self.list_templates())
    }

    fn list_sets(&self) -> BoxFuture<'_, Result<Vec<String>>> {
        Box::pin(self.visible_sets())
    }

    fn has_set<'a>(&'a self, set: &'a str) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move { Ok(self.visible_sets().await?.iter().any(|s| s == set)) })
    }

    fn get_set_data<'a>(&'a self, set: &'a str) -> BoxFuture<'a, Result<TemplateSetData>> {
        Box::pin(self.load_set(set))
    }

    fn remove_set<'a>(&'a self, set: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if !self.has_set(set).await? {
                return Err(DeclkitError::SetNotFound {
                    name: set.to_string(),
                }
                .into());
            }
            self.removed().insert(set.to_string());
            self.core.invalidate_set(set);
            tracing::debug!(target: "provider", "hid template set '{}'", set);
            Ok(())
        })
    }

    fn invalidate_cache(&self) {
        self.core.invalidate();
    }
}
