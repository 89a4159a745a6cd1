//! Path collection helpers.

use crate::error::{MergeError, Result};
use std::path::PathBuf;

/// Expand input arguments into paths, preserving argument order.
///
/// Arguments containing glob metacharacters are expanded (matches sorted,
/// as `glob` yields them). Plain paths are kept as given, even when they do
/// not exist, so that validation can report them.
///
/// # Errors
///
/// Returns [`MergeError::InvalidRequest`] for a malformed pattern, or a
/// pattern that matches nothing.
pub fn collect_paths_for_patterns<T>(patterns: T) -> Result<Vec<PathBuf>>
where
    T: IntoIterator,
    T::Item: AsRef<str>,
{
    let mut resolved_paths = Vec::new();

    for pattern in patterns {
        let pattern = pattern.as_ref();
        if is_glob(pattern) {
            resolved_paths.extend(collect_paths_for_pattern(pattern)?);
        } else {
            resolved_paths.push(PathBuf::from(pattern));
        }
    }

    Ok(resolved_paths)
}

fn collect_paths_for_pattern(pattern: &str) -> Result<Vec<PathBuf>> {
    let entries = glob::glob(pattern)
        .map_err(|err| MergeError::invalid_request(format!("bad pattern '{pattern}': {err}")))?;

    let mut resolved_paths = Vec::new();
    for entry in entries {
        let path = entry.map_err(|err| {
            MergeError::invalid_request(format!("cannot expand '{pattern}': {err}"))
        })?;
        if path.is_file() {
            resolved_paths.push(path);
        }
    }

    if resolved_paths.is_empty() {
        return Err(MergeError::invalid_request(format!(
            "pattern '{pattern}' matched no files"
        )));
    }
    Ok(resolved_paths)
}

fn is_glob(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}

/// Parse non-empty, non-comment lines of an input list into path
/// arguments.
pub fn parse_input_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}
