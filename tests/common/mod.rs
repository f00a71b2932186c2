// Allow dead code because these utilities are used across different test files
// and not all utilities are used in every test file
#![allow(dead_code)]

use anyhow::{Context, Result};
use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use declkit::test_utils::TemplateFixture;

/// An isolated declkit installation: the example template sets, a settings file
/// pointing at them, and a JSON file store, all in temporary directories.
pub struct TestProject {
    pub templates: TemplateFixture,
    home: TempDir,
}

impl TestProject {
    pub fn new() -> Result<Self> {
        let templates = TemplateFixture::examples()?;
        let home = TempDir::new().context("Failed to create temporary home")?;

        let project = Self {
            templates,
            home,
        };
        project.write_config(&format!(
            "templates_dir = {:?}\n\n[store]\nkind = \"file\"\npath = {:?}\n",
            project.templates.root(),
            project.store_path(),
        ))?;
        Ok(project)
    }

    pub fn home(&self) -> &Path {
        self.home.path()
    }

    pub fn config_path(&self) -> PathBuf {
        self.home().join("config.toml")
    }

    pub fn store_path(&self) -> PathBuf {
        self.home().join("store.json")
    }

    pub fn write_config(&self, content: &str) -> Result<()> {
        fs::write(self.config_path(), content).context("Failed to write settings file")
    }

    /// Write `content` to `name` in the temporary home and return its path.
    pub fn write_file(&self, name: &str, content: &str) -> Result<PathBuf> {
        let path = self.home().join(name);
        fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    /// The declkit binary, configured for this project.
    pub fn declkit(&self) -> Command {
        let mut cmd = Command::cargo_bin("declkit").expect("declkit binary is built for tests");
        cmd.env("HOME", self.home())
            .env_remove("DECLKIT_CONFIG")
            .env_remove("RUST_LOG")
            .env("NO_COLOR", "1")
            .arg("--config")
            .arg(self.config_path());
        cmd
    }
}
