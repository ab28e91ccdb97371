use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;
use opsgate_core::registry::parse_args;
use opsgate_core::{ParamType, ToolContext, ToolDescriptor, ToolError, ToolHandler, ToolOutput};
use serde::Deserialize;
use serde_json::Value;

use crate::files::{blocking, write_output};

#[derive(Debug, Deserialize)]
struct Args {
    dir_path: PathBuf,
    count: usize,
    file_dest: PathBuf,
}

/// First lines of the most recently modified `.log` files in a directory.
pub struct RecentLogs;

#[async_trait]
impl ToolHandler for RecentLogs {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            "recent_logs",
            "Take the most recently modified .log files in a directory and write the \
             first line of each, most recent first, to a destination file.",
        )
        .required("dir_path", ParamType::String, "Directory containing .log files")
        .required("count", ParamType::Integer, "How many of the most recent files to include")
        .required("file_dest", ParamType::String, "Path to write the first lines to")
    }

    async fn call(&self, _ctx: &ToolContext, arguments: Value) -> Result<ToolOutput, ToolError> {
        let args: Args = parse_args(arguments)?;

        let dir = args.dir_path.clone();
        let count = args.count;
        let lines = blocking(move || first_lines_of_recent(&dir, count)).await?;

        let mut contents = lines.join("\n");
        contents.push('\n');
        write_output(&args.file_dest, &contents).await?;

        Ok(ToolOutput::new(format!(
            "first lines of {} log file(s) written to {}",
            lines.len(),
            args.file_dest.display()
        )))
    }
}

fn first_lines_of_recent(dir: &Path, count: usize) -> Result<Vec<String>, ToolError> {
    if !dir.is_dir() {
        return Err(ToolError::InvalidInput(format!(
            "{} is not a directory",
            dir.display()
        )));
    }

    let escaped = glob::Pattern::escape(&dir.to_string_lossy());
    let pattern = format!("{}/*.log", escaped.trim_end_matches('/'));
    let entries =
        glob::glob(&pattern).map_err(|e| ToolError::InvalidInput(format!("bad pattern: {e}")))?;

    let mut logs: Vec<(SystemTime, PathBuf)> = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| ToolError::io(e.path().to_path_buf(), e.into_error()))?;
        let modified = path
            .metadata()
            .and_then(|m| m.modified())
            .map_err(|e| ToolError::io(&path, e))?;
        logs.push((modified, path));
    }
    logs.sort_by(|a, b| b.0.cmp(&a.0));

    logs.into_iter()
        .take(count)
        .map(|(_, path)| first_line(&path))
        .collect()
}

fn first_line(path: &Path) -> Result<String, ToolError> {
    let file = File::open(path).map_err(|e| ToolError::io(path, e))?;
    let mut line = String::new();
    BufReader::new(file)
        .read_line(&mut line)
        .map_err(|e| ToolError::io(path, e))?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use opsgate_core::testing::{test_context, ScriptedModel};
    use opsgate_core::Config;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn touch_at(path: &Path, contents: &str, age_secs: u64) {
        std::fs::write(path, contents).unwrap();
        let file = File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(age_secs))
            .unwrap();
    }

    #[tokio::test]
    async fn writes_first_lines_of_most_recent_files() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("logs");
        std::fs::create_dir(&logs).unwrap();
        for (i, age) in [500, 400, 300, 200, 100].iter().enumerate() {
            touch_at(
                &logs.join(format!("log-{i}.log")),
                &format!("first of {i}\nsecond of {i}\n"),
                *age,
            );
        }
        touch_at(&logs.join("notes.txt"), "not a log\n", 0);

        let dest = dir.path().join("logs-recent.txt");
        let ctx = test_context(Config::default(), Arc::new(ScriptedModel::new()));
        RecentLogs
            .call(&ctx, json!({ "dir_path": logs, "count": 2, "file_dest": dest }))
            .await
            .unwrap();

        assert_eq!(
            std::fs::read_to_string(&dest).unwrap(),
            "first of 4\nfirst of 3\n"
        );
    }

    #[tokio::test]
    async fn missing_directory_is_invalid_input() {
        let ctx = test_context(Config::default(), Arc::new(ScriptedModel::new()));
        let err = RecentLogs
            .call(
                &ctx,
                json!({ "dir_path": "/no/such/dir", "count": 1, "file_dest": "/tmp/x" }),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));
    }
}
