//! `declkit upload`: copy a template set from the templates directory into the store.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::io::Write;

use super::common::CommandContext;
use crate::provider::TemplateProvider;

#[derive(Args, Debug)]
pub struct UploadCommand {
    /// Template set names
    #[arg(required = true, value_name = "SET")]
    pub sets: Vec<String>,
}

impl UploadCommand {
    pub async fn execute(self, ctx: &CommandContext, out: &mut dyn Write) -> Result<()> {
        for set in &self.sets {
            let data = ctx.local.get_set_data(set).await?;
            ctx.store.upload_set(&data).await?;
            let status = ctx.store.set_status(set, None).await?;
            let support = if status.supported { "supported".green() } else { "custom".yellow() };
            writeln!(out, "{} uploaded {} ({}, {})", "✓".green(), set.bold(), data.hash.dimmed(), support)?;
        }
        Ok(())
    }
}
