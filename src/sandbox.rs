// CLASSIFICATION: COMMUNITY
// Filename: sandbox.rs v0.3
// Author: Lukas Bower
// Date Modified: 2026-07-30

//! Lexical path confinement for untrusted, user-supplied paths.
//!
//! Resolution never touches the filesystem and never follows symlinks; the
//! kernel performs any symlink resolution later, at the point of I/O.

use std::path::{Component, Path, PathBuf, MAIN_SEPARATOR};

use crate::error::FileGateError;

/// Resolve `input` relative to `root`, guaranteeing the result stays inside
/// `root`.
///
/// The input is trimmed of surrounding whitespace and at most one leading
/// separator is stripped before joining, so `""`, `"."`, and `"/"` all
/// resolve to `root` itself. Traversals that stay inside the root
/// (`"a/../b"`) are legal; anything that lexically escapes fails with
/// [`FileGateError::PathEscape`].
pub fn resolve_within_root(root: &Path, input: &str) -> Result<PathBuf, FileGateError> {
    let sanitized = input.trim();
    let relative = sanitized.strip_prefix(MAIN_SEPARATOR).unwrap_or(sanitized);

    let root = lexical_clean(root);
    let candidate = lexical_clean(&root.join(relative));

    if candidate.starts_with(&root) {
        Ok(candidate)
    } else {
        Err(FileGateError::PathEscape(sanitized.to_string()))
    }
}

/// Collapse `.` and `..` components by segment walking alone.
///
/// For absolute paths, `..` above the root is dropped; for relative paths,
/// leading `..` components are preserved. The empty result is rendered as
/// `"."`, mirroring the usual clean semantics.
pub fn lexical_clean(path: &Path) -> PathBuf {
    let absolute = path.is_absolute();
    let mut segments: Vec<&std::ffi::OsStr> = Vec::new();
    let mut leading_parents = 0usize;

    for component in path.components() {
        match component {
            Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
            Component::ParentDir => {
                if segments.pop().is_none() && !absolute {
                    leading_parents += 1;
                }
            }
            Component::Normal(segment) => segments.push(segment),
        }
    }

    let mut cleaned = PathBuf::new();
    if absolute {
        cleaned.push(std::path::MAIN_SEPARATOR_STR);
    }
    for _ in 0..leading_parents {
        cleaned.push("..");
    }
    for segment in segments {
        cleaned.push(segment);
    }
    if cleaned.as_os_str().is_empty() {
        cleaned.push(".");
    }
    cleaned
}
