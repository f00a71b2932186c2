//! `declkit sets`: template sets on disk and in the store, with their status.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use std::io::Write;

use super::common::{CommandContext, write_json};
use crate::provider::TemplateProvider;
use crate::templating::SetStatus;

#[derive(Args, Debug, Default)]
pub struct SetsCommand {
    /// Output format
    #[arg(long, default_value = "table", value_parser = ["table", "json"])]
    pub format: String,
}

/// One row of the `sets` report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetReport {
    pub name: String,
    /// Present in the templates directory
    pub local: bool,
    /// Status in the store; `None` when not uploaded
    pub stored: Option<SetStatus>,
}

impl SetsCommand {
    pub async fn execute(self, ctx: &CommandContext, out: &mut dyn Write) -> Result<()> {
        let reports = collect(ctx).await?;

        if self.format == "json" {
            return write_json(out, &serde_json::to_value(&reports)?, true);
        }

        if reports.is_empty() {
            writeln!(out, "No template sets found.")?;
            return Ok(());
        }

        for report in &reports {
            let state = match &report.stored {
                None => "not uploaded".dimmed().to_string(),
                Some(status) => {
                    let mut state = if status.supported {
                        "supported".green().to_string()
                    } else {
                        "custom".yellow().to_string()
                    };
                    if status.update_available {
                        state.push_str(&format!(", {}", "update available".cyan()));
                    }
                    if !report.local {
                        state.push_str(&format!(", {}", "store only".dimmed()));
                    }
                    state
                }
            };
            writeln!(out, "{:<24} {}", report.name.bold(), state)?;
        }
        Ok(())
    }
}

/// Union of local and stored sets, sorted by name.
pub async fn collect(ctx: &CommandContext) -> Result<Vec<SetReport>> {
    let local = ctx.local.list_sets().await?;
    let stored = ctx.store.list_set_status(Some(&ctx.local)).await?;

    let mut reports: Vec<SetReport> = stored
        .into_iter()
        .map(|status| SetReport {
            name: status.name.clone(),
            local: local.contains(&status.name),
            stored: Some(status),
        })
        .collect();

    for name in local {
        if !reports.iter().any(|r| r.name == name) {
            reports.push(SetReport {
                name,
                local: true,
                stored: None,
            });
        }
    }
    reports.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(reports)
}
