//! Generic TOML configuration parsing.
//!
//! ```rust,no_run
//! use declkit::config::parse_config;
//! use serde::Deserialize;
//! use std::path::Path;
//!
//! #[derive(Deserialize)]
//! struct MyConfig {
//!     cache_limit: usize,
//! }
//!
//! # fn example() -> anyhow::Result<()> {
//! let config: MyConfig = parse_config(Path::new("config.toml"))?;
//! println!("cache limit: {}", config.cache_limit);
//! # Ok(())
//! # }
//! ```
//!
//! Errors carry the file path as context:
//!
//! ```text
//! Failed to parse config file: /path/to/config.toml
//! Caused by:
//!     invalid type: string "x", expected usize
//! ```

use anyhow::{Context, Result};
use std::path::Path;

/// Parse the TOML file at `path` into `T`.
///
/// # Errors
///
/// Fails when the file cannot be read, is not valid TOML, or does not match `T`.
/// The cause is kept; the context names the file and whether reading or
/// parsing failed.
pub fn parse_config<T>(path: &Path) -> Result<T>
where
    T: serde::de::DeserializeOwned,
{
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: T = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(serde::Deserialize)]
    struct TestConfig {
        name: String,
        limit: usize,
    }

    #[test]
    fn test_parse_config() {
        let temp = tempfile::tempdir().unwrap();
        let config_path = temp.path().join("test.toml");
        std::fs::write(&config_path, "name = \"test\"\nlimit = 42\n").unwrap();

        let config: TestConfig = parse_config(&config_path).unwrap();
        assert_eq!(config.name, "test");
        assert_eq!(config.limit, 42);
    }

    #[test]
    fn test_parse_config_error_names_file() {
        let temp = tempfile::tempdir().unwrap();
        let config_path = temp.path().join("invalid.toml");
        std::fs::write(&config_path, "invalid = toml {").unwrap();

        let err = parse_config::<TestConfig>(&config_path).err().unwrap();
        assert!(err.to_string().contains("invalid.toml"));

        let missing = parse_config::<TestConfig>(&temp.path().join("missing.toml")).err().unwrap();
        assert!(missing.to_string().starts_with("Failed to read config file"));
    }
}
