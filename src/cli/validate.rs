//! `declkit validate`: check a parameter set against a template's schema.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde_json::json;
use std::io::Write;
use std::path::PathBuf;

use super::common::{CommandContext, read_params, write_json};
use crate::core::DeclkitError;

#[derive(Args, Debug, Default)]
pub struct ValidateCommand {
    /// Template name as `set/template`
    pub template: String,

    /// JSON parameters file, `-` for stdin
    #[arg(short, long, value_name = "FILE")]
    pub params: Option<PathBuf>,

    /// Read the template from the store instead of the templates directory
    #[arg(long)]
    pub store: bool,

    /// Output format
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    pub format: String,
}

impl ValidateCommand {
    pub async fn execute(self, ctx: &CommandContext, out: &mut dyn Write) -> Result<()> {
        let engine = ctx.provider(self.store).fetch(&self.template).await?;
        let params = read_params(self.params.as_deref())?;
        let issues = engine.validate(&params).unwrap_or_default();

        if self.format == "json" {
            write_json(out, &json!({"valid": issues.is_empty(), "issues": issues}), true)?;
        } else if issues.is_empty() {
            writeln!(out, "{} parameters are valid for {}", "✓".green(), self.template.bold())?;
        } else {
            writeln!(out, "{} parameters are invalid for {}", "✗".red(), self.template.bold())?;
            for issue in &issues {
                writeln!(out, "  - {issue}")?;
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(DeclkitError::Other {
                message: format!("{} validation issue(s) for template '{}'", issues.len(), self.template),
            }
            .into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::common::tests::context;
    use crate::test_utils::TemplateFixture;

    #[tokio::test]
    async fn test_valid_and_invalid() {
        let fixture = TemplateFixture::examples().unwrap();
        let ctx = context(&fixture);
        let params = fixture.root().join("params.json");

        std::fs::write(&params, r#"{"tenant_name": "t", "app_name": "a", "remark": "hi"}"#).unwrap();
        let mut out = Vec::new();
        ValidateCommand {
            template: "extra/plain".to_string(),
            params: Some(params.clone()),
            ..ValidateCommand::default()
        }
        .execute(&ctx, &mut out)
        .await
        .unwrap();
        assert!(String::from_utf8(out).unwrap().contains("valid"));

        std::fs::write(&params, r#"{"tenant_name": 5}"#).unwrap();
        let mut out = Vec::new();
        let result = ValidateCommand {
            template: "extra/plain".to_string(),
            params: Some(params),
            format: "json".to_string(),
            ..ValidateCommand::default()
        }
        .execute(&ctx, &mut out)
        .await;
        assert!(result.is_err());

        let report: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(report["valid"], false);
        assert!(report["issues"].as_array().unwrap().len() >= 2);
    }
}
