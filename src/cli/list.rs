//! `declkit list`: available templates and their parameters.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde_json::{Value, json};
use std::io::Write;

use super::common::{CommandContext, write_json};

#[derive(Args, Debug, Default)]
pub struct ListCommand {
    /// Only templates of this set
    #[arg(long, value_name = "SET")]
    pub set: Option<String>,

    /// List templates persisted in the store instead of the templates directory
    #[arg(long)]
    pub store: bool,

    /// Show each template's parameters
    #[arg(short, long)]
    pub detailed: bool,

    /// Output format
    #[arg(long, default_value = "table", value_parser = ["table", "json"])]
    pub format: String,
}

impl ListCommand {
    pub async fn execute(self, ctx: &CommandContext, out: &mut dyn Write) -> Result<()> {
        let provider = ctx.provider(self.store);
        let names: Vec<String> = provider
            .list()
            .await?
            .into_iter()
            .filter(|name| self.set.as_ref().is_none_or(|set| name.starts_with(&format!("{set}/"))))
            .collect();

        if self.format == "json" {
            let mut entries = Vec::new();
            for name in &names {
                let engine = provider.fetch(name).await?;
                entries.push(json!({
                    "name": name,
                    "description": engine.description(),
                    "parameters": engine.parameters().iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
                    "required": engine.required(),
                }));
            }
            return write_json(out, &Value::Array(entries), true);
        }

        if names.is_empty() {
            writeln!(out, "No templates found.")?;
            return Ok(());
        }

        for name in &names {
            let engine = provider.fetch(name).await?;
            if engine.description().is_empty() {
                writeln!(out, "{}", name.bold())?;
            } else {
                writeln!(out, "{}  {}", name.bold(), engine.description().dimmed())?;
            }

            if self.detailed {
                let required = engine.required();
                for parameter in engine.parameters() {
                    let marker = if required.contains(&parameter.name.as_str()) { "*" } else { " " };
                    writeln!(
                        out,
                        "  {} {} {}",
                        marker,
                        parameter.name.cyan(),
                        parameter.token.dimmed()
                    )?;
                }
            }
        }
        writeln!(out, "{}: {} template(s)", "Total".green().bold(), names.len())?;
        Ok(())
    }
}
