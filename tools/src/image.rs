use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use opsgate_core::registry::parse_args;
use opsgate_core::{ParamType, ToolContext, ToolDescriptor, ToolError, ToolHandler, ToolOutput};
use serde::Deserialize;
use serde_json::Value;

use crate::files::write_output;

#[derive(Debug, Deserialize)]
struct Args {
    image_path: PathBuf,
    extract: String,
    file_dest: PathBuf,
}

/// Reads a piece of information out of an image with the multimodal model.
pub struct ExtractFromImage;

#[async_trait]
impl ToolHandler for ExtractFromImage {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            "extract_from_image",
            "Extract a requested piece of information (for example a card number) \
             from an image file and write it to a destination file.",
        )
        .required("image_path", ParamType::String, "Path of the image file")
        .required("extract", ParamType::String, "What to extract from the image")
        .required("file_dest", ParamType::String, "Path to write the extracted text to")
    }

    async fn call(&self, ctx: &ToolContext, arguments: Value) -> Result<ToolOutput, ToolError> {
        let args: Args = parse_args(arguments)?;

        let mime = image_mime(&args.image_path)?;
        let bytes = tokio::fs::read(&args.image_path)
            .await
            .map_err(|e| ToolError::io(&args.image_path, e))?;
        let data_url = format!("data:{mime};base64,{}", STANDARD.encode(&bytes));

        let prompt = format!(
            "Extract the {} from this image. Respond with only the extracted value.",
            args.extract
        );
        let answer = ctx.llm.describe_image(&prompt, &data_url).await?;

        write_output(&args.file_dest, &format!("{}\n", answer.trim())).await?;
        Ok(ToolOutput::new(format!(
            "{} written to {}",
            args.extract,
            args.file_dest.display()
        )))
    }
}

fn image_mime(path: &Path) -> Result<&'static str, ToolError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "png" => Ok("image/png"),
        "jpg" | "jpeg" => Ok("image/jpeg"),
        "gif" => Ok("image/gif"),
        "webp" => Ok("image/webp"),
        _ => Err(ToolError::InvalidInput(format!(
            "unsupported image type: {}",
            path.display()
        ))),
    }
}
