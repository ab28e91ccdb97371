use std::path::PathBuf;

use async_trait::async_trait;
use opsgate_core::registry::parse_args;
use opsgate_core::{ParamType, ToolContext, ToolDescriptor, ToolError, ToolHandler, ToolOutput};
use serde::Deserialize;
use serde_json::Value;

use crate::files::{read_text, write_output};

#[derive(Debug, Deserialize)]
struct Args {
    file_path: PathBuf,
    file_dest: PathBuf,
}

/// Asks the model for the sender address of an email message.
pub struct ExtractEmail;

#[async_trait]
impl ToolHandler for ExtractEmail {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            "extract_email",
            "Read an email message from a file, extract the sender's email address \
             and write only that address to a destination file.",
        )
        .required("file_path", ParamType::String, "Path of the email message")
        .required("file_dest", ParamType::String, "Path to write the sender's address to")
    }

    async fn call(&self, ctx: &ToolContext, arguments: Value) -> Result<ToolOutput, ToolError> {
        let args: Args = parse_args(arguments)?;
        let message = read_text(&args.file_path).await?;

        let prompt = format!(
            "Extract the sender's email address from this email message. \
             Respond with only the email address and nothing else.\n\n{message}"
        );
        let answer = ctx.llm.complete(&prompt).await?;
        let address = answer.trim().trim_matches('`').trim();
        if address.is_empty() {
            return Err(ToolError::InvalidInput("model returned no address".into()));
        }

        write_output(&args.file_dest, &format!("{address}\n")).await?;
        Ok(ToolOutput::new(format!(
            "sender address written to {}",
            args.file_dest.display()
        )))
    }
}
