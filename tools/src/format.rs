use std::path::PathBuf;

use async_trait::async_trait;
use opsgate_core::registry::parse_args;
use opsgate_core::{Config, ParamType, ToolContext, ToolDescriptor, ToolError, ToolHandler, ToolOutput};
use serde::Deserialize;
use serde_json::Value;

use crate::process;

#[derive(Debug, Deserialize)]
struct Args {
    file_path: PathBuf,
    #[serde(default)]
    prettier_version: Option<String>,
}

/// Reformats a file in place with prettier.
pub struct FormatFile;

#[async_trait]
impl ToolHandler for FormatFile {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            "format_file",
            "Format a file in place with prettier (Markdown, JSON, JavaScript, CSS and more).",
        )
        .required("file_path", ParamType::String, "Path of the file to format")
        .optional(
            "prettier_version",
            ParamType::String,
            "Exact prettier version to use, e.g. 3.4.2",
        )
    }

    async fn call(&self, ctx: &ToolContext, arguments: Value) -> Result<ToolOutput, ToolError> {
        let args: Args = parse_args(arguments)?;
        tokio::fs::metadata(&args.file_path)
            .await
            .map_err(|e| ToolError::io(&args.file_path, e))?;

        let (program, argv) = prettier_command(
            &ctx.config,
            args.prettier_version.as_deref(),
            &args.file_path.display().to_string(),
        )?;
        process::run(ctx.retry(), &program, &argv, None).await?;

        Ok(ToolOutput::new(format!(
            "formatted {} with {program}",
            args.file_path.display()
        )))
    }
}

/// `prettier --write <file>`, or `npx -y prettier@<version> --write <file>` when a version is pinned.
fn prettier_command(
    config: &Config,
    version: Option<&str>,
    file: &str,
) -> Result<(String, Vec<String>), ToolError> {
    let write_args = ["--write".to_string(), file.to_string()];
    match version.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok((config.prettier_bin.clone(), write_args.to_vec())),
        Some(v) if v.chars().all(|c| c.is_ascii_alphanumeric() || ".-+".contains(c)) => {
            let mut argv = vec!["-y".to_string(), format!("prettier@{v}")];
            argv.extend(write_args);
            Ok(("npx".to_string(), argv))
        }
        Some(v) => Err(ToolError::InvalidArguments(format!(
            "'{v}' is not a valid prettier version"
        ))),
    }
}
