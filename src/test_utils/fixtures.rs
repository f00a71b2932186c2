//! Template set fixtures written into temporary directories.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

use crate::constants::{SCHEMA_EXTENSION, TEMPLATE_EXTENSION};

/// Bundled HTTP template.
pub const SIMPLE_HTTP: &str = include_str!("../../templates/examples/simple_http.mst");

/// Bundled pool template referencing the `f5` schema set.
pub const WITH_POOL: &str = include_str!("../../templates/examples/with_pool.mst");

/// Bundled `f5` schema set.
pub const F5_SCHEMAS: &str = include_str!("../../templates/examples/f5.json");

/// Template of the `extra` set.
pub const PLAIN: &str = r#"{{! Plain service without a schema reference }}
{
  "class": "ADC",
  {{tenant_name}}: {
    "class": "Tenant",
    {{app_name}}: {
      "class": "Application",
      "remark": {{remark:text}}
    }
  }
}"#;

/// A templates directory in a temporary location, removed on drop.
#[derive(Debug)]
pub struct TemplateFixture {
    temp: TempDir,
}

impl TemplateFixture {
    /// Templates directory with no sets.
    pub fn empty() -> Result<Self> {
        Ok(Self {
            temp: TempDir::new().context("Failed to create temporary templates directory")?,
        })
    }

    /// The bundled `examples` set plus a small `extra` set.
    ///
    /// `examples` holds `simple_http`, `with_pool` and the `f5` schema set, byte
    /// for byte as shipped. `extra` holds the single template `plain`.
    pub fn examples() -> Result<Self> {
        let fixture = Self::empty()?;
        fixture.write_template("examples", "simple_http", SIMPLE_HTTP)?;
        fixture.write_template("examples", "with_pool", WITH_POOL)?;
        fixture.write_schema("examples", "f5", F5_SCHEMAS)?;
        fixture.write_template("extra", "plain", PLAIN)?;
        Ok(fixture)
    }

    /// The templates directory.
    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    /// Create or replace template `name` in `set`.
    pub fn write_template(&self, set: &str, name: &str, text: &str) -> Result<()> {
        self.write(set, &format!("{name}.{TEMPLATE_EXTENSION}"), text)
    }

    /// Create or replace schema set `name` in `set`.
    pub fn write_schema(&self, set: &str, name: &str, text: &str) -> Result<()> {
        self.write(set, &format!("{name}.{SCHEMA_EXTENSION}"), text)
    }

    fn write(&self, set: &str, file: &str, text: &str) -> Result<()> {
        let dir = self.root().join(set);
        fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;
        let path = dir.join(file);
        fs::write(&path, text).with_context(|| format!("Failed to write {}", path.display()))
    }
}
