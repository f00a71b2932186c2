//! Command-line interface for declkit.
//!
//! # Commands
//!
//! - `list` - templates and their parameters
//! - `schema` - a template's inferred parameter schema
//! - `validate` - check parameters against a template
//! - `render` - render a declaration
//! - `sets` - template sets on disk and in the store, with status
//! - `upload` - copy template sets into the store
//! - `remove` - delete a template set from the store
//!
//! ```bash
//! declkit list --detailed
//! declkit schema examples/with_pool
//! echo '{"tenant_name": "prod"}' | declkit render examples/simple_http --params - --pretty
//! declkit upload examples
//! declkit sets
//! ```
//!
//! Templates come from the templates directory (`--templates-dir`, or
//! `templates_dir` in the settings file) unless a command is given `--store`.

pub mod common;
mod list;
mod remove;
mod render;
mod schema;
mod sets;
mod upload;
mod validate;

pub use common::CommandContext;
pub use list::ListCommand;
pub use remove::RemoveCommand;
pub use render::RenderCommand;
pub use schema::SchemaCommand;
pub use sets::{SetReport, SetsCommand};
pub use upload::UploadCommand;
pub use validate::ValidateCommand;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Root command and global options.
#[derive(Parser, Debug)]
#[command(
    name = "declkit",
    about = "Compile parametrized templates into validated service declarations",
    version,
    author
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Show debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Settings file (default: `DECLKIT_CONFIG`, then ~/.declkit/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory holding the template sets
    #[arg(long, global = true, value_name = "DIR")]
    templates_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List available templates
    List(ListCommand),

    /// Print the parameter schema of a template
    Schema(SchemaCommand),

    /// Validate parameters against a template
    Validate(ValidateCommand),

    /// Render a declaration from a template
    Render(RenderCommand),

    /// Show template sets and their status
    Sets(SetsCommand),

    /// Upload template sets to the store
    Upload(UploadCommand),

    /// Remove a template set from the store
    Remove(RemoveCommand),
}

impl Cli {
    /// Log filter for the chosen verbosity.
    ///
    /// `--verbose` and `--quiet` win over `RUST_LOG`; without either, `RUST_LOG`
    /// applies and falls back to `warn`.
    pub fn log_filter(&self) -> EnvFilter {
        if self.verbose {
            EnvFilter::new("debug")
        } else if self.quiet {
            EnvFilter::new("error")
        } else {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
        }
    }

    /// Run the selected command, writing its output to stdout.
    pub async fn execute(self) -> Result<()> {
        let ctx = CommandContext::load(self.config.as_deref(), self.templates_dir)?;
        let mut stdout = std::io::stdout();
        Self::dispatch(self.command, &ctx, &mut stdout).await
    }

    async fn dispatch(command: Commands, ctx: &CommandContext, out: &mut dyn std::io::Write) -> Result<()> {
        match command {
            Commands::List(cmd) => cmd.execute(ctx, out).await,
            Commands::Schema(cmd) => cmd.execute(ctx, out).await,
            Commands::Validate(cmd) => cmd.execute(ctx, out).await,
            Commands::Render(cmd) => cmd.execute(ctx, out).await,
            Commands::Sets(cmd) => cmd.execute(ctx, out).await,
            Commands::Upload(cmd) => cmd.execute(ctx, out).await,
            Commands::Remove(cmd) => cmd.execute(ctx, out).await,
        }
    }
}
