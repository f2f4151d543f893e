//! Path resolution for file references inside documents.
//!
//! References are resolved against the directory of the document that
//! contains them. A `*` wildcard is allowed in the final path segment only;
//! matches are the regular files of the parent directory whose names fit the
//! pattern, sorted by name.

use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{BloxError, Result};

/// The wildcard marker.
pub const WILDCARD: char = '*';

/// Join `pattern` onto `base_dir` and normalize it into an absolute path.
///
/// `.` and `..` components are folded lexically; the path does not have to
/// exist.
pub fn absolutize(base_dir: &Path, pattern: &str) -> PathBuf {
    absolute(&base_dir.join(pattern))
}

/// Make `path` absolute against the working directory and normalize it.
pub fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return normalize(path);
    }
    match std::env::current_dir() {
        Ok(cwd) => normalize(&cwd.join(path)),
        Err(_) => normalize(path),
    }
}

/// Fold `.` and `..` components without touching the filesystem.
///
/// `..` at the root is dropped; leading `..` of a relative path are kept.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                Some(Component::ParentDir) | Some(Component::CurDir) | None => {
                    out.push(component)
                }
            },
            other => out.push(other),
        }
    }
    out
}

/// Resolve one reference.
///
/// Without a wildcard this yields exactly one path, whether or not it exists.
/// With a wildcard in the final segment it yields the matching files, which
/// may be none; a missing parent directory is an error. `file` is the
/// document making the reference, for error reporting.
pub fn resolve_path(base_dir: &Path, pattern: &str, file: &Path) -> Result<Vec<PathBuf>> {
    if !pattern.contains(WILDCARD) {
        return Ok(vec![absolutize(base_dir, pattern)]);
    }

    let resolved = absolutize(base_dir, pattern);
    let unresolved = |message: String| BloxError::UnresolvedPath {
        file: file.to_path_buf(),
        path: resolved.clone(),
        message,
    };

    let name = resolved
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| unresolved("wildcard pattern has no file name".to_string()))?;

    if !name.contains(WILDCARD) {
        return Err(unresolved(
            "wildcards are only supported in the final path segment".to_string(),
        ));
    }

    let directory = resolved
        .parent()
        .ok_or_else(|| unresolved("wildcard pattern has no parent directory".to_string()))?;

    if !directory.is_dir() {
        return Err(unresolved(format!(
            "directory does not exist: {}",
            directory.display()
        )));
    }

    let mut matches: Vec<PathBuf> = WalkDir::new(directory)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .filter(|e| {
            e.file_name()
                .to_str()
                .map(|n| matches_pattern(n, name))
                .unwrap_or(false)
        })
        .map(|e| e.into_path())
        .collect();
    matches.sort();

    Ok(matches)
}

/// Resolve several references, keeping pattern order and flattening matches.
pub fn resolve_paths<S: AsRef<str>>(
    base_dir: &Path,
    patterns: &[S],
    file: &Path,
) -> Result<Vec<PathBuf>> {
    let mut resolved = Vec::new();
    for pattern in patterns {
        resolved.extend(resolve_path(base_dir, pattern.as_ref(), file)?);
    }
    Ok(resolved)
}

/// Match a file name against a pattern where `*` matches any run of
/// characters (including none).
pub fn matches_pattern(name: &str, pattern: &str) -> bool {
    let mut parts = pattern.split(WILDCARD);

    // No wildcard: exact match.
    let first = parts.next().unwrap_or("");
    let rest: Vec<&str> = parts.collect();
    if rest.is_empty() {
        return name == pattern;
    }

    let Some(mut remaining) = name.strip_prefix(first) else {
        return false;
    };

    let (last, middle) = match rest.split_last() {
        Some(split) => split,
        None => return true,
    };

    for part in middle {
        match remaining.find(part) {
            Some(pos) => remaining = &remaining[pos + part.len()..],
            None => return false,
        }
    }

    remaining.ends_with(last)
}
