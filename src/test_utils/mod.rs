//! Test utilities for declkit
//!
//! Available to unit tests and, through the `test-utils` feature, to the
//! integration suite.
//!
//! - [`TemplateFixture`] - temporary templates directories with known sets
//! - [`FakeAppliance`] - in-process stand-in for the appliance configuration shell
//!
//! # Example
//!
//! ```rust,no_run
//! use declkit::provider::{FsTemplateProvider, TemplateProvider};
//! use declkit::test_utils::TemplateFixture;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let fixture = TemplateFixture::examples()?;
//! let provider = FsTemplateProvider::new(fixture.root());
//! assert!(provider.has_set("examples").await?);
//! # Ok(())
//! # }
//! ```

mod appliance;
mod fixtures;

pub use appliance::FakeAppliance;
pub use fixtures::{F5_SCHEMAS, PLAIN, SIMPLE_HTTP, TemplateFixture, WITH_POOL};

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests, once per process.
///
/// Uses `level` when given, otherwise `RUST_LOG`; with neither, logging stays off.
///
/// ```bash
/// RUST_LOG=provider=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}
