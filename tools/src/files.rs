use std::io::Write;
use std::path::Path;

use opsgate_core::ToolError;
use tempfile::NamedTempFile;
use tokio::fs;

pub(crate) async fn read_text(path: &Path) -> Result<String, ToolError> {
    fs::read_to_string(path)
        .await
        .map_err(|e| ToolError::io(path, e))
}

/// Write `contents` to `dest` via a uniquely named temp file in the same
/// directory, then rename it over `dest`. Concurrent writers never share a temp file.
pub(crate) async fn write_output(dest: &Path, contents: &str) -> Result<(), ToolError> {
    let parent = dest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    fs::create_dir_all(&parent)
        .await
        .map_err(|e| ToolError::io(&parent, e))?;

    let dest = dest.to_path_buf();
    let contents = contents.to_owned();
    blocking(move || {
        let mut temp = NamedTempFile::new_in(&parent).map_err(|e| ToolError::io(&parent, e))?;
        temp.write_all(contents.as_bytes())
            .map_err(|e| ToolError::io(temp.path(), e))?;
        // On failure the returned handle is dropped, which removes the temp file.
        temp.persist(&dest)
            .map_err(|e| ToolError::io(&dest, e.error))?;
        Ok(())
    })
    .await
}

/// Run synchronous filesystem work off the async runtime.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, ToolError>
where
    F: FnOnce() -> Result<T, ToolError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ToolError::process("blocking worker", e.to_string()))?
}
