//! Path helpers shared by the walker, projection and renderers.
//!
//! Store paths are `/`-separated. Directory names carry a trailing `/`,
//! leaf names never do.

use std::cmp::Ordering;

use crate::errors::{Result, VkvError};

/// Compare two paths so that shallower paths sort before deeper ones that
/// share the same prefix (`a` < `a/b` < `a/b/c` < `a2`).
pub fn path_cmp(a: &str, b: &str) -> Ordering {
    let key = |c: u8| if c == b'/' { 0 } else { c };
    a.bytes().map(key).cmp(b.bytes().map(key))
}

/// Sort a list of paths in place with [`path_cmp`].
pub fn sort_paths(paths: &mut [String]) {
    paths.sort_by(|a, b| path_cmp(a, b));
}

/// Normalise a sub-path into directory form: `""` or `"a/b/"`.
///
/// Rejects empty interior segments such as `a//b`.
pub fn dir_path(sub_path: &str) -> Result<String> {
    let trimmed = sub_path.trim_matches('/');
    if trimmed.is_empty() {
        return Ok(String::new());
    }
    if trimmed.split('/').any(str::is_empty) {
        return Err(VkvError::bad_input(format!(
            "path '{}' contains an empty segment",
            sub_path
        )));
    }
    Ok(format!("{}/", trimmed))
}

/// Last segment of a path, ignoring a trailing `/`.
pub fn last_segment(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Parent directory of a path in directory form (`"a/b/c"` → `"a/b/"`).
pub fn parent_dir(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => format!("{}/", &trimmed[..idx]),
        None => String::new(),
    }
}

/// Join two namespace paths, skipping empty parts.
pub fn join_namespace(base: &str, child: &str) -> String {
    let base = base.trim_matches('/');
    let child = child.trim_matches('/');
    match (base.is_empty(), child.is_empty()) {
        (true, _) => child.to_string(),
        (false, true) => base.to_string(),
        (false, false) => format!("{}/{}", base, child),
    }
}

/// Split a `-p engine/sub/path` argument, or combine an explicit engine path
/// with an optional sub-path.
///
/// Returns `(engine, sub_path)` where the engine never carries slashes at
/// either end.
pub fn resolve_target(path: Option<&str>, engine_path: Option<&str>) -> Result<(String, String)> {
    match (engine_path, path) {
        (Some(engine), sub) => {
            let engine = engine.trim_matches('/');
            if engine.is_empty() {
                return Err(VkvError::bad_input("engine path cannot be empty"));
            }
            let sub = sub.unwrap_or_default().trim_matches('/').to_string();
            Ok((engine.to_string(), sub))
        }
        (None, Some(path)) => {
            let path = path.trim_matches('/');
            let mut parts = path.splitn(2, '/');
            let engine = parts.next().unwrap_or_default();
            if engine.is_empty() {
                return Err(VkvError::bad_input("path cannot be empty"));
            }
            let sub = parts.next().unwrap_or_default().to_string();
            Ok((engine.to_string(), sub))
        }
        (None, None) => Err(VkvError::bad_input("either --path or --engine-path is required")),
    }
}
