use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use opsgate_core::registry::parse_args;
use opsgate_core::{ParamType, ToolContext, ToolDescriptor, ToolError, ToolHandler, ToolOutput};
use serde::Deserialize;
use serde_json::Value;
use walkdir::WalkDir;

use crate::files::{blocking, write_output};

#[derive(Debug, Deserialize)]
struct Args {
    dir_path: PathBuf,
    file_dest: PathBuf,
}

/// Index of Markdown files by their first top-level heading.
pub struct MarkdownTitles;

#[async_trait]
impl ToolHandler for MarkdownTitles {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            "markdown_titles",
            "Find all Markdown (.md) files under a directory, extract the first \
             level-one heading of each, and write a JSON object mapping each file's \
             path (relative to the directory) to its title.",
        )
        .required("dir_path", ParamType::String, "Directory to scan recursively")
        .required("file_dest", ParamType::String, "Path to write the JSON index to")
    }

    async fn call(&self, _ctx: &ToolContext, arguments: Value) -> Result<ToolOutput, ToolError> {
        let args: Args = parse_args(arguments)?;

        let dir = args.dir_path.clone();
        let index = blocking(move || collect_titles(&dir)).await?;

        let json = serde_json::to_string_pretty(&index)
            .map_err(|e| ToolError::InvalidInput(e.to_string()))?;
        write_output(&args.file_dest, &json).await?;

        Ok(ToolOutput::new(format!(
            "{} title(s) written to {}",
            index.len(),
            args.file_dest.display()
        )))
    }
}

fn collect_titles(dir: &Path) -> Result<BTreeMap<String, String>, ToolError> {
    if !dir.is_dir() {
        return Err(ToolError::InvalidInput(format!(
            "{} is not a directory",
            dir.display()
        )));
    }

    let mut index = BTreeMap::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| dir.to_path_buf());
            ToolError::io(path, e.into())
        })?;
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().map_or(true, |ext| ext != "md") {
            continue;
        }

        let text = std::fs::read_to_string(path).map_err(|e| ToolError::io(path, e))?;
        if let Some(title) = first_heading(&text) {
            let relative = path.strip_prefix(dir).unwrap_or(path);
            index.insert(to_slash(relative), title.to_string());
        }
    }
    Ok(index)
}

fn first_heading(text: &str) -> Option<&str> {
    text.lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix("# "))
        .map(str::trim)
}

fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
