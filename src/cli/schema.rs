//! `declkit schema`: print a template's inferred parameter schema.

use anyhow::Result;
use clap::Args;
use std::io::Write;

use super::common::{CommandContext, write_json};

#[derive(Args, Debug)]
pub struct SchemaCommand {
    /// Template name as `set/template`
    pub template: String,

    /// Read the template from the store instead of the templates directory
    #[arg(long)]
    pub store: bool,
}

impl SchemaCommand {
    pub async fn execute(self, ctx: &CommandContext, out: &mut dyn Write) -> Result<()> {
        let engine = ctx.provider(self.store).fetch(&self.template).await?;
        write_json(out, engine.schema(), true)
    }
}
