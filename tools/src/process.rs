use std::path::Path;
use std::process::Stdio;

use opsgate_core::retry;
use opsgate_core::{RetryPolicy, ToolError};
use tokio::process::Command;
use tracing::debug;

/// Run `program` with `args` and return its stdout. A non-zero exit is a terminal
/// failure carrying stderr; an attempt that runs past the timeout is killed and retried.
pub(crate) async fn run(
    policy: &RetryPolicy,
    program: &str,
    args: &[String],
    cwd: Option<&Path>,
) -> Result<String, ToolError> {
    debug!("Running {program} {}", args.join(" "));
    retry::run(policy, program, || run_once(program, args, cwd))
        .await
        .map_err(|err| err.for_operation(program))
}

async fn run_once(program: &str, args: &[String], cwd: Option<&Path>) -> Result<String, ToolError> {
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }

    let output = command
        .output()
        .await
        .map_err(|e| ToolError::process(program, format!("could not start: {e}")))?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(ToolError::process(
            program,
            format!("{}: {}", output.status, stderr.trim()),
        ))
    }
}
