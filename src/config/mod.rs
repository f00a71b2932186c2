//! Configuration for declkit
//!
//! Settings come from one TOML file, looked up in this order:
//!
//! 1. `--config <FILE>` on the command line
//! 2. the `DECLKIT_CONFIG` environment variable
//! 3. `~/.declkit/config.toml` (`%LOCALAPPDATA%\declkit\config.toml` on Windows)
//!
//! A file named by 1 or 2 must exist. When the default file is absent every
//! setting takes its default.
//!
//! ```toml
//! cache_limit = 100
//! templates_dir = "./templates"
//!
//! [store]
//! kind = "appliance"
//! namespace = "declkit"
//! collection = "dataStore"
//! shell = "tmsh"
//! command_timeout_secs = 60
//!
//! [supported_hashes]
//! examples = ["sha256:..."]
//! ```
//!
//! # Modules
//!
//! - `parser` - generic TOML parsing with file context
//! - `settings` - the [`Settings`] model and the stores and hash tables built from it

mod parser;
mod settings;

pub use parser::parse_config;
pub use settings::{CONFIG_ENV_VAR, Settings, StoreKind, StoreSettings};
