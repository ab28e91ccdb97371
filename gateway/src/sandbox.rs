use std::path::{Component, Path, PathBuf};

/// Accept `requested` only if it lies under `prefix` (compared component by
/// component) and has no `..` segments. Symlinks are not resolved.
pub fn resolve(prefix: &Path, requested: &str) -> Option<PathBuf> {
    let path = Path::new(requested);
    if path.components().any(|c| matches!(c, Component::ParentDir)) {
        return None;
    }
    path.starts_with(prefix).then(|| path.to_path_buf())
}
