use std::path::Path;

use async_trait::async_trait;
use opsgate_core::registry::parse_args;
use opsgate_core::retry;
use opsgate_core::{ParamType, ToolContext, ToolDescriptor, ToolError, ToolHandler, ToolOutput};
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::files::write_output;
use crate::process;

const DEFAULT_SCRIPT_NAME: &str = "datagen.py";

#[derive(Debug, Deserialize)]
struct Args {
    url: String,
    #[serde(default)]
    email: Option<String>,
}

/// Downloads a data-generation script and runs it with `uv`.
pub struct GenerateDataset;

#[async_trait]
impl ToolHandler for GenerateDataset {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            "generate_dataset",
            "Download a Python data-generation script from a URL and run it with uv, \
             passing the user's email address as its only argument.",
        )
        .required("url", ParamType::String, "URL of the script to run")
        .optional("email", ParamType::String, "Email address to pass to the script")
    }

    async fn call(&self, ctx: &ToolContext, arguments: Value) -> Result<ToolOutput, ToolError> {
        let args: Args = parse_args(arguments)?;
        let url = Url::parse(&args.url)
            .map_err(|e| ToolError::InvalidArguments(format!("invalid URL: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ToolError::InvalidArguments(format!(
                "unsupported URL scheme: {}",
                url.scheme()
            )));
        }

        let script = download(ctx, &url).await?;
        let script_path = ctx.config.data_dir.join(script_name(&url));
        write_output(&script_path, &script).await?;
        info!("Saved dataset script to {}", script_path.display());

        let email = args
            .email
            .filter(|e| !e.trim().is_empty())
            .unwrap_or_else(|| ctx.config.user_email.clone());
        let output = process::run(
            ctx.retry(),
            &ctx.config.uv_bin,
            &[
                "run".to_string(),
                script_path.display().to_string(),
                email.clone(),
            ],
            Some(working_dir(&ctx.config.data_dir)),
        )
        .await?;

        Ok(ToolOutput::new(format!(
            "ran {} for {email} ({} bytes of output)",
            script_path.display(),
            output.len()
        )))
    }
}

async fn download(ctx: &ToolContext, url: &Url) -> Result<String, ToolError> {
    let http = &ctx.http;
    retry::run(ctx.retry(), "script download", || async move {
        let response = http.get(url.clone()).send().await.map_err(http_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::Http {
                message: format!("GET {url} returned {status}"),
                retryable: status.is_server_error(),
            });
        }
        response.text().await.map_err(http_error)
    })
    .await
    .map_err(|err| err.for_operation("script download"))
}

fn http_error(err: reqwest::Error) -> ToolError {
    ToolError::Http {
        retryable: err.is_timeout() || err.is_connect() || err.is_request(),
        message: err.to_string(),
    }
}

/// Last path segment of the URL if it looks like a file name, else a fixed name.
fn script_name(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty() && name.contains('.'))
        .map(str::to_string)
        .unwrap_or_else(|| DEFAULT_SCRIPT_NAME.to_string())
}

fn working_dir(data_dir: &Path) -> &Path {
    data_dir
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(data_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use opsgate_core::testing::{test_context, ScriptedModel};
    use opsgate_core::Config;
    use opsgate_core::RetryPolicy;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn script_name_comes_from_url_path() {
        let url = Url::parse("https://example.com/project-1/datagen.py").unwrap();
        assert_eq!(script_name(&url), "datagen.py");
        let url = Url::parse("https://example.com/generate/").unwrap();
        assert_eq!(script_name(&url), DEFAULT_SCRIPT_NAME);
    }

    #[test]
    fn scripts_run_next_to_the_data_dir() {
        assert_eq!(working_dir(Path::new("/data")), Path::new("/"));
        assert_eq!(working_dir(Path::new("/srv/app/data")), Path::new("/srv/app"));
    }

    #[tokio::test]
    async fn non_http_urls_are_rejected() {
        let ctx = test_context(Config::default(), Arc::new(ScriptedModel::new()));
        let err = GenerateDataset
            .call(&ctx, json!({ "url": "file:///etc/passwd" }))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn stalled_download_times_out_under_its_own_name() {
        // Accepts connections and never answers.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            data_dir: dir.path().to_path_buf(),
            retry: RetryPolicy::no_retry(Duration::from_millis(200)),
            ..Config::default()
        };
        let ctx = test_context(config, Arc::new(ScriptedModel::new()));
        let err = GenerateDataset
            .call(&ctx, json!({ "url": format!("http://{addr}/datagen.py") }))
            .await
            .unwrap_err();

        match err {
            ToolError::ProcessTimeout { program, .. } => assert_eq!(program, "script download"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(!dir.path().join("datagen.py").exists());
    }
}
