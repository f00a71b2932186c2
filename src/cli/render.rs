//! `declkit render`: render a declaration from a template and parameters.

use anyhow::Result;
use clap::Args;
use std::io::Write;
use std::path::PathBuf;

use super::common::{CommandContext, read_params, write_json};
use crate::core::DeclkitError;
use crate::utils::atomic_write;

#[derive(Args, Debug, Default)]
pub struct RenderCommand {
    /// Template name as `set/template`
    pub template: String,

    /// JSON parameters file, `-` for stdin
    #[arg(short, long, value_name = "FILE")]
    pub params: Option<PathBuf>,

    /// Pretty-print the declaration
    #[arg(long)]
    pub pretty: bool,

    /// Refuse to render parameters that fail validation
    #[arg(long)]
    pub strict: bool,

    /// Read the template from the store instead of the templates directory
    #[arg(long)]
    pub store: bool,

    /// Write the declaration to FILE instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

impl RenderCommand {
    pub async fn execute(self, ctx: &CommandContext, out: &mut dyn Write) -> Result<()> {
        let engine = ctx.provider(self.store).fetch(&self.template).await?;
        let params = read_params(self.params.as_deref())?;

        if self.strict {
            if let Some(issues) = engine.validate(&params) {
                let details: Vec<String> = issues.iter().map(ToString::to_string).collect();
                return Err(DeclkitError::Other {
                    message: format!(
                        "Parameters for template '{}' are invalid:\n  - {}",
                        self.template,
                        details.join("\n  - ")
                    ),
                }
                .into());
            }
        }

        let declaration = engine.render(&params)?;

        match &self.output {
            Some(path) => {
                let mut text = if self.pretty {
                    serde_json::to_string_pretty(&declaration)?
                } else {
                    serde_json::to_string(&declaration)?
                };
                text.push('\n');
                atomic_write(path, text.as_bytes())?;
                tracing::info!("wrote declaration for '{}' to {}", self.template, path.display());
                Ok(())
            }
            None => write_json(out, &declaration, self.pretty),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::common::tests::context;
    use crate::test_utils::TemplateFixture;
    use serde_json::Value;

    #[tokio::test]
    async fn test_render_to_stdout() {
        let fixture = TemplateFixture::examples().unwrap();
        let ctx = context(&fixture);
        let params = fixture.root().join("params.json");
        std::fs::write(&params, r#"{"tenant_name": "prod", "pool_members": ["10.0.0.5", "10.0.0.6"]}"#).unwrap();

        let mut out = Vec::new();
        RenderCommand {
            template: "examples/simple_http".to_string(),
            params: Some(params),
            ..RenderCommand::default()
        }
        .execute(&ctx, &mut out)
        .await
        .unwrap();

        let declaration: Value = serde_json::from_slice(&out).unwrap();
        let pool = &declaration["prod"]["app1"]["web_pool"];
        assert_eq!(pool["members"][0]["serverAddresses"], serde_json::json!(["10.0.0.5", "10.0.0.6"]));
        assert_eq!(declaration["prod"]["app1"]["constants"]["template"], "examples/simple_http");
    }

    #[tokio::test]
    async fn test_strict_rejects_incomplete_params() {
        let fixture = TemplateFixture::examples().unwrap();
        let ctx = context(&fixture);
        let err = RenderCommand {
            template: "extra/plain".to_string(),
            strict: true,
            ..RenderCommand::default()
        }
        .execute(&ctx, &mut Vec::new())
        .await
        .unwrap_err();
        assert!(err.to_string().contains("extra/plain"));
    }

    #[tokio::test]
    async fn test_render_to_file() {
        let fixture = TemplateFixture::examples().unwrap();
        let ctx = context(&fixture);
        let output = fixture.root().join("out/declaration.json");

        let mut out = Vec::new();
        RenderCommand {
            template: "extra/plain".to_string(),
            pretty: true,
            output: Some(output.clone()),
            ..RenderCommand::default()
        }
        .execute(&ctx, &mut out)
        .await
        .unwrap();

        assert!(out.is_empty());
        let declaration: Value = serde_json::from_str(&std::fs::read_to_string(output).unwrap()).unwrap();
        assert_eq!(declaration["t1"]["app1"]["remark"], "");
    }
}
