//! Template providers: resolve template names to compiled engines.
//!
//! Templates are addressed as `set/template`. A provider reads template text from
//! its backend, compiles it against the provider's schema set, and caches the
//! resulting [`Engine`] in a [`ResourceCache`]:
//!
//! ```text
//! fetch("examples/simple_http")
//!   └─ cache hit? ── yes ─> Arc<Engine>
//!        │ no
//!        ├─ backend: template text
//!        ├─ schema set (loaded once, shared by all engines)
//!        └─ compile ─> cached Arc<Engine>
//! ```
//!
//! Engines never change once built. [`TemplateProvider::invalidate_cache`] drops
//! them so the next fetch recompiles from the backend; the backend itself and the
//! loaded schema set are untouched. A provider that writes set bundles itself
//! calls [`ProviderCore::reload_schemas`] afterwards, so schema files added or
//! changed by the write are seen by the next compile.
//!
//! # Providers
//!
//! - [`FsTemplateProvider`] - one directory per template set
//! - [`DataStoreTemplateProvider`] - [`TemplateSetData`] bundles in a [`crate::storage::DataStore`]

mod datastore;
mod fs;

pub use datastore::DataStoreTemplateProvider;
pub use fs::FsTemplateProvider;

use anyhow::Result;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use strsim::levenshtein;
use tokio::sync::OnceCell;

use crate::cache::ResourceCache;
use crate::core::DeclkitError;
use crate::templating::{Engine, SchemaSet, TemplateSetData};

/// Maximum edit distance for name suggestions, as a percentage of the name length.
const SIMILARITY_THRESHOLD_PERCENT: usize = 50;

/// Resolves template names to compiled engines and manages template sets.
///
/// Methods return boxed futures so providers can be used as
/// `Arc<dyn TemplateProvider>`.
pub trait TemplateProvider: Send + Sync {
    /// The compiled engine for template `name` (`set/template`).
    ///
    /// # Errors
    ///
    /// [`DeclkitError::TemplateNotFound`] when no such template exists, plus any
    /// compile error.
    fn fetch<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<Arc<Engine>>>;

    /// All template names, as `set/template`, sorted.
    fn list(&self) -> BoxFuture<'_, Result<Vec<String>>>;

    /// Names of all template sets, sorted.
    fn list_sets(&self) -> BoxFuture<'_, Result<Vec<String>>>;

    /// Whether template set `set` exists.
    fn has_set<'a>(&'a self, set: &'a str) -> BoxFuture<'a, Result<bool>>;

    /// The complete bundle for template set `set`.
    ///
    /// # Errors
    ///
    /// [`DeclkitError::SetNotFound`] when the set does not exist.
    fn get_set_data<'a>(&'a self, set: &'a str) -> BoxFuture<'a, Result<TemplateSetData>>;

    /// Remove template set `set` from this provider.
    fn remove_set<'a>(&'a self, set: &'a str) -> BoxFuture<'a, Result<()>>;

    /// Drop every compiled engine.
    fn invalidate_cache(&self);
}

/// State every provider shares: the engine cache and the lazily loaded schema set.
#[derive(Debug)]
pub struct ProviderCore {
    engines: ResourceCache<Arc<Engine>>,
    // Swapped for a fresh cell by `reload_schemas`; loads in flight finish on the old one.
    schemas: Mutex<Arc<OnceCell<Arc<SchemaSet>>>>,
}

impl ProviderCore {
    /// Core caching at most `cache_limit` engines.
    pub fn new(cache_limit: usize) -> Self {
        Self {
            engines: ResourceCache::new(cache_limit),
            schemas: Mutex::new(Arc::new(OnceCell::new())),
        }
    }

    /// Cached engine for `name`, running `build` on a miss.
    pub async fn engine<F, Fut>(&self, name: &str, build: F) -> Result<Arc<Engine>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Engine>>,
    {
        self.engines.fetch(name, || async move { Ok(Arc::new(build().await?)) }).await
    }

    /// The schema set, running `load` the first time only.
    pub async fn schemas<F, Fut>(&self, load: F) -> Result<Arc<SchemaSet>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<SchemaSet>>,
    {
        let cell = Arc::clone(&self.schemas.lock().unwrap_or_else(PoisonError::into_inner));
        let schemas = cell
            .get_or_try_init(|| async move {
                let schemas = load().await?;
                tracing::debug!(
                    target: "provider",
                    "loaded schema sets: {}",
                    schemas.set_names().collect::<Vec<_>>().join(", ")
                );
                Ok::<_, anyhow::Error>(Arc::new(schemas))
            })
            .await?;
        Ok(Arc::clone(schemas))
    }

    /// Forget the loaded schema set and every engine compiled against it.
    ///
    /// The next fetch loads the schema set from the backend again.
    pub fn reload_schemas(&self) {
        *self.schemas.lock().unwrap_or_else(PoisonError::into_inner) = Arc::new(OnceCell::new());
        self.engines.clear();
        tracing::debug!(target: "provider", "schema set and engines dropped");
    }

    /// Drop all compiled engines.
    pub fn invalidate(&self) {
        self.engines.clear();
        tracing::debug!(target: "provider", "engine cache cleared");
    }

    /// Drop the compiled engines of one template set.
    pub fn invalidate_set(&self, set: &str) {
        let prefix = format!("{set}/");
        for key in self.engines.keys().into_iter().filter(|k| k.starts_with(&prefix)) {
            self.engines.invalidate(&key);
        }
    }

    /// The engine cache.
    pub fn engines(&self) -> &ResourceCache<Arc<Engine>> {
        &self.engines
    }
}

/// Split `set/template` into its parts.
pub fn split_template_name(name: &str) -> Option<(&str, &str)> {
    let (set, template) = name.split_once('/')?;
    if set.is_empty() || template.is_empty() || template.contains('/') {
        return None;
    }
    Some((set, template))
}

/// Up to three names from `available` close to `target`, closest first.
pub fn find_similar_names(target: &str, available: &[String]) -> Vec<String> {
    let mut scored: Vec<_> = available.iter().map(|name| (name.clone(), levenshtein(target, name))).collect();

    scored.sort_by_key(|(_, distance)| *distance);

    scored
        .into_iter()
        .filter(|(_, distance)| *distance <= target.len() * SIMILARITY_THRESHOLD_PERCENT / 100)
        .take(3)
        .map(|(name, _)| name)
        .collect()
}

/// [`DeclkitError::TemplateNotFound`] for `name` with suggestions from `available`.
pub(crate) fn template_not_found(name: &str, available: &[String]) -> anyhow::Error {
    DeclkitError::TemplateNotFound {
        name: name.to_string(),
        suggestions: find_similar_names(name, available),
    }
    .into()
}
