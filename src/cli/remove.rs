//! `declkit remove`: delete a template set from the store.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::io::Write;

use super::common::CommandContext;
use crate::provider::TemplateProvider;

#[derive(Args, Debug)]
pub struct RemoveCommand {
    /// Template set name
    pub set: String,
}

impl RemoveCommand {
    pub async fn execute(self, ctx: &CommandContext, out: &mut dyn Write) -> Result<()> {
        ctx.store.remove_set(&self.set).await?;
        writeln!(out, "{} removed {}", "✓".green(), self.set.bold())?;
        Ok(())
    }
}
