use std::path::PathBuf;

use async_trait::async_trait;
use opsgate_core::registry::parse_args;
use opsgate_core::{ParamType, ToolContext, ToolDescriptor, ToolError, ToolHandler, ToolOutput};
use serde::Deserialize;
use serde_json::Value;

use crate::files::write_output;
use crate::process;

#[derive(Debug, Deserialize)]
struct Args {
    file_path: PathBuf,
    keys: Vec<String>,
    file_dest: PathBuf,
}

/// Sorts a JSON array of objects with `jq`.
pub struct SortJson;

#[async_trait]
impl ToolHandler for SortJson {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            "sort_json",
            "Sort a JSON array of objects by one or more keys (in priority order) \
             and write the sorted array to a destination file.",
        )
        .required("file_path", ParamType::String, "Path of the JSON file to sort")
        .required("keys", ParamType::StringArray, "Keys to sort by, most significant first")
        .required("file_dest", ParamType::String, "Path to write the sorted JSON to")
    }

    async fn call(&self, ctx: &ToolContext, arguments: Value) -> Result<ToolOutput, ToolError> {
        let args: Args = parse_args(arguments)?;
        let filter = sort_filter(&args.keys)?;

        let sorted = process::run(
            ctx.retry(),
            &ctx.config.jq_bin,
            &[
                "--compact-output".to_string(),
                filter,
                args.file_path.display().to_string(),
            ],
            None,
        )
        .await?;

        write_output(&args.file_dest, &sorted).await?;
        Ok(ToolOutput::new(format!(
            "sorted by {} into {}",
            args.keys.join(", "),
            args.file_dest.display()
        )))
    }
}

/// Build `sort_by(.["a"], .["b"])`. Keys are JSON-quoted so any key text is safe inside the filter.
fn sort_filter(keys: &[String]) -> Result<String, ToolError> {
    if keys.is_empty() {
        return Err(ToolError::InvalidArguments("at least one sort key is required".into()));
    }
    let paths: Vec<String> = keys
        .iter()
        .map(|key| format!(".[{}]", Value::String(key.clone())))
        .collect();
    Ok(format!("sort_by({})", paths.join(", ")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_quotes_each_key() {
        let filter = sort_filter(&["last_name".into(), "first name".into()]).unwrap();
        assert_eq!(filter, r#"sort_by(.["last_name"], .["first name"])"#);
    }

    #[test]
    fn filter_escapes_quotes_in_keys() {
        let filter = sort_filter(&[r#"a"b"#.into()]).unwrap();
        assert_eq!(filter, r#"sort_by(.["a\"b"])"#);
    }

    #[test]
    fn empty_keys_are_rejected() {
        assert!(matches!(
            sort_filter(&[]),
            Err(ToolError::InvalidArguments(_))
        ));
    }
}
