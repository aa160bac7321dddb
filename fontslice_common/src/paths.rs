use anyhow::{bail, Result};
use std::path::Path;

pub fn path_to_string(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Returns the relative URI prefix that leads from `from_dir` to `to_dir`.
///
/// The result is either empty (same directory) or ends with a `/`, so a file name can be
/// appended to it directly.
pub fn relative_uri(from_dir: &Path, to_dir: &Path) -> Result<String> {
    let from_dir = from_dir.canonicalize()?;
    let to_dir = to_dir.canonicalize()?;

    let mut ancestor = from_dir.as_path();
    let mut prefix = String::new();
    loop {
        if let Ok(rest) = to_dir.strip_prefix(ancestor) {
            let mut uri = format!("{prefix}{}", path_to_string(rest));
            if !uri.is_empty() && !uri.ends_with('/') {
                uri.push('/');
            }
            return Ok(uri);
        }

        if let Some(parent) = ancestor.parent() {
            ancestor = parent;
        } else {
            bail!("{} and {} share no common parent!", from_dir.display(), to_dir.display());
        }
        prefix.push_str("../");
    }
}
