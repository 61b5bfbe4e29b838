// CLASSIFICATION: COMMUNITY
// Filename: ops.rs v0.3
// Author: Lukas Bower
// Date Modified: 2026-08-02

//! The operation dispatcher: one function per VFS operation.
//!
//! Every function resolves its path arguments through the sandbox first,
//! then acquires the lock shape that matches the mutation's blast radius:
//!
//! * reads take no lock (torn reads during a concurrent write are accepted);
//! * point writes (`write`, `write_binary`, `mkdir`) take an exact lock;
//! * `remove` takes a subtree lock — nothing below the target may be active;
//! * `rename` takes one atomic subtree acquisition over both endpoints,
//!   since a renamed directory relocates every descendant.
//!
//! The guard drops at scope exit, so the keys are released on every path out
//! of the operation, including unwinds.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{FileGateError, Result};
use crate::locker::PathLocker;
use crate::mime::mime_for_path;
use crate::sandbox::{lexical_clean, resolve_within_root};

/// Metadata reported by `stat`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatEntry {
    size: u64,
    is_directory: bool,
    modified: String,
    created: String,
}

/// One entry of a directory listing.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirEntry {
    name: String,
    is_directory: bool,
}

/// Directory listing payload.
#[derive(Debug, Serialize)]
pub struct Listing {
    entries: Vec<DirEntry>,
}

/// Text file content payload.
#[derive(Debug, Serialize)]
pub struct FileContent {
    content: String,
}

/// Acknowledgement of a completed write.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteReceipt {
    bytes_written: usize,
}

/// Acknowledgement of a created directory.
#[derive(Debug, Serialize)]
pub struct Created {
    created: bool,
}

/// Acknowledgement of a removed file or subtree.
#[derive(Debug, Serialize)]
pub struct Removed {
    removed: bool,
}

/// Acknowledgement of a completed rename.
#[derive(Debug, Serialize)]
pub struct Renamed {
    renamed: bool,
}

/// Raw bytes plus the headers a binary read carries.
#[derive(Debug)]
pub struct BinaryFile {
    /// File content.
    pub data: Vec<u8>,
    /// MIME type inferred from the extension.
    pub mime: &'static str,
    /// Base name used for the disposition header.
    pub file_name: String,
}

/// Stat a file or directory. Read-only, no lock.
pub fn stat(root: &Path, path: &str) -> Result<StatEntry> {
    let resolved = resolve_within_root(root, path)?;
    let metadata = fs::metadata(&resolved)
        .map_err(|err| FileGateError::from_io(err, "file or directory not found"))?;
    let modified = metadata
        .modified()
        .map_err(|err| FileGateError::Internal(err.to_string()))?;
    let stamp = format_utc_millis(modified);
    Ok(StatEntry {
        size: metadata.len(),
        is_directory: metadata.is_dir(),
        // Creation time is not portably available; report the modify time.
        created: stamp.clone(),
        modified: stamp,
    })
}

/// List a directory. Read-only, no lock.
pub fn readdir(root: &Path, path: &str) -> Result<Listing> {
    let resolved = resolve_within_root(root, path)?;
    let reader =
        fs::read_dir(&resolved).map_err(|err| FileGateError::from_io(err, "directory not found"))?;

    let mut entries = Vec::new();
    for entry in reader {
        let entry = entry.map_err(|err| FileGateError::Internal(err.to_string()))?;
        let is_directory = entry
            .file_type()
            .map(|file_type| file_type.is_dir())
            .unwrap_or(false);
        entries.push(DirEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            is_directory,
        });
    }
    Ok(Listing { entries })
}

/// Read a file as UTF-8 text. Read-only, no lock.
pub fn read(root: &Path, path: &str) -> Result<FileContent> {
    let resolved = resolve_within_root(root, path)?;
    let data =
        fs::read(&resolved).map_err(|err| FileGateError::from_io(err, "file not found"))?;
    Ok(FileContent {
        content: String::from_utf8_lossy(&data).into_owned(),
    })
}

/// Read a file as raw bytes with MIME inference. Read-only, no lock.
pub fn read_binary(root: &Path, path: &str) -> Result<BinaryFile> {
    let resolved = resolve_within_root(root, path)?;
    let data =
        fs::read(&resolved).map_err(|err| FileGateError::from_io(err, "file not found"))?;
    let file_name = resolved
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(BinaryFile {
        mime: mime_for_path(&resolved),
        file_name,
        data,
    })
}

/// Write text content to a file under an exact lock, creating parent
/// directories as needed.
pub fn write(locker: &PathLocker, root: &Path, path: &str, content: &str) -> Result<WriteReceipt> {
    let resolved = resolve_within_root(root, path)?;
    let _guard = locker.lock_exact([&resolved]);

    ensure_parent(&resolved)?;
    fs::write(&resolved, content.as_bytes())
        .map_err(|err| FileGateError::Internal(err.to_string()))?;
    Ok(WriteReceipt {
        bytes_written: content.len(),
    })
}

/// Write raw bytes to a file under an exact lock, creating parent
/// directories as needed.
pub fn write_binary(
    locker: &PathLocker,
    root: &Path,
    path: &str,
    data: &[u8],
) -> Result<WriteReceipt> {
    let resolved = resolve_within_root(root, path)?;
    let _guard = locker.lock_exact([&resolved]);

    ensure_parent(&resolved)?;
    fs::write(&resolved, data).map_err(|err| FileGateError::Internal(err.to_string()))?;
    Ok(WriteReceipt {
        bytes_written: data.len(),
    })
}

/// Create a directory (recursively) under an exact lock.
pub fn mkdir(locker: &PathLocker, root: &Path, path: &str) -> Result<Created> {
    let resolved = resolve_within_root(root, path)?;
    let _guard = locker.lock_exact([&resolved]);

    fs::create_dir_all(&resolved).map_err(|err| FileGateError::Internal(err.to_string()))?;
    Ok(Created { created: true })
}

/// Remove a file or a whole directory subtree under a subtree lock.
pub fn remove(locker: &PathLocker, root: &Path, path: &str) -> Result<Removed> {
    let resolved = resolve_within_root(root, path)?;
    let _guard = locker.lock_subtree([&resolved]);

    let metadata = fs::symlink_metadata(&resolved)
        .map_err(|err| FileGateError::from_io(err, "file or directory not found"))?;
    let outcome = if metadata.is_dir() {
        fs::remove_dir_all(&resolved)
    } else {
        fs::remove_file(&resolved)
    };
    outcome.map_err(|err| FileGateError::from_io(err, "file or directory not found"))?;
    Ok(Removed { removed: true })
}

/// Rename a file or directory under one atomic subtree acquisition covering
/// both endpoints.
///
/// A non-empty `new_path` wins; otherwise the destination is derived as
/// `dirname(src)/new_name`, which must not contain a separator of either
/// kind, and the derived path is re-resolved through the sandbox.
pub fn rename(
    locker: &PathLocker,
    root: &Path,
    path: &str,
    new_name: Option<&str>,
    new_path: Option<&str>,
) -> Result<Renamed> {
    let resolved = resolve_within_root(root, path)?;

    let destination = match new_path.map(str::trim).filter(|p| !p.is_empty()) {
        Some(explicit) => resolve_within_root(root, explicit)?,
        None => {
            let name = new_name.map(str::trim).unwrap_or("");
            if name.is_empty() || name.contains('/') || name.contains('\\') {
                return Err(FileGateError::BadRequest("invalid new name".to_string()));
            }
            let candidate = match resolved.parent() {
                Some(parent) => parent.join(name),
                None => PathBuf::from(name),
            };
            let relative = candidate
                .strip_prefix(lexical_clean(root))
                .map_err(|_| FileGateError::PathEscape(name.to_string()))?
                .to_path_buf();
            resolve_within_root(root, &relative.to_string_lossy())?
        }
    };

    let _guard = locker.lock_subtree([&resolved, &destination]);

    ensure_parent(&destination)?;
    fs::rename(&resolved, &destination)
        .map_err(|err| FileGateError::from_io(err, "file or directory not found"))?;
    Ok(Renamed { renamed: true })
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| FileGateError::Internal(err.to_string()))?;
    }
    Ok(())
}

fn format_utc_millis(time: SystemTime) -> String {
    let stamp: DateTime<Utc> = time.into();
    stamp.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn scratch() -> (TempDir, PathBuf, PathLocker) {
        let dir = TempDir::new().expect("tempdir");
        let root = dir.path().join("user00000001");
        fs::create_dir_all(&root).expect("user root");
        (dir, root, PathLocker::new())
    }

    #[test]
    fn write_then_read_round_trips() {
        let (_dir, root, locker) = scratch();
        let receipt = write(&locker, &root, "notes/today.md", "hello").unwrap();
        assert_eq!(
            serde_json::to_value(&receipt).unwrap()["bytesWritten"],
            5
        );

        let content = read(&root, "notes/today.md").unwrap();
        assert_eq!(serde_json::to_value(&content).unwrap()["content"], "hello");
    }

    #[test]
    fn write_escaping_the_root_is_rejected_before_any_io() {
        let (_dir, root, locker) = scratch();
        let err = write(&locker, &root, "../../etc/passwd", "x").unwrap_err();
        assert!(matches!(err, FileGateError::PathEscape(_)));
    }

    #[test]
    fn stat_reports_equal_created_and_modified() {
        let (_dir, root, locker) = scratch();
        write(&locker, &root, "a.txt", "abc").unwrap();

        let entry = stat(&root, "a.txt").unwrap();
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["size"], 3);
        assert_eq!(value["isDirectory"], false);
        assert_eq!(value["created"], value["modified"]);
        let stamp = value["modified"].as_str().unwrap();
        assert!(stamp.ends_with('Z') && stamp.contains('.'), "stamp {stamp}");
    }

    #[test]
    fn stat_of_missing_target_is_not_found() {
        let (_dir, root, _locker) = scratch();
        let err = stat(&root, "missing.txt").unwrap_err();
        assert!(matches!(err, FileGateError::NotFound(_)));
    }

    #[test]
    fn readdir_lists_names_and_kinds() {
        let (_dir, root, locker) = scratch();
        write(&locker, &root, "d/file.txt", "x").unwrap();
        mkdir(&locker, &root, "d/sub").unwrap();

        let listing = readdir(&root, "d").unwrap();
        let value = serde_json::to_value(&listing).unwrap();
        let mut seen: Vec<(String, bool)> = value["entries"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| {
                (
                    e["name"].as_str().unwrap().to_string(),
                    e["isDirectory"].as_bool().unwrap(),
                )
            })
            .collect();
        seen.sort();
        assert_eq!(
            seen,
            vec![("file.txt".to_string(), false), ("sub".to_string(), true)]
        );
    }

    #[test]
    fn remove_of_missing_target_is_not_found() {
        let (_dir, root, locker) = scratch();
        let err = remove(&locker, &root, "ghost").unwrap_err();
        assert!(matches!(err, FileGateError::NotFound(_)));
    }

    #[test]
    fn remove_deletes_files_and_subtrees() {
        let (_dir, root, locker) = scratch();
        write(&locker, &root, "d/a/deep.txt", "x").unwrap();
        remove(&locker, &root, "d").unwrap();
        assert!(!root.join("d").exists());

        write(&locker, &root, "single.txt", "x").unwrap();
        remove(&locker, &root, "single.txt").unwrap();
        assert!(!root.join("single.txt").exists());
    }

    #[test]
    fn rename_with_derived_name_moves_the_file() {
        let (_dir, root, locker) = scratch();
        write(&locker, &root, "a.txt", "hello").unwrap();

        rename(&locker, &root, "a.txt", Some("b.txt"), None).unwrap();
        assert!(!root.join("a.txt").exists());
        assert_eq!(fs::read_to_string(root.join("b.txt")).unwrap(), "hello");
    }

    #[test]
    fn rename_rejects_names_with_separators() {
        let (_dir, root, locker) = scratch();
        write(&locker, &root, "a.txt", "x").unwrap();

        for bad in ["", "sub/name.txt", "back\\slash"] {
            let err = rename(&locker, &root, "a.txt", Some(bad), None).unwrap_err();
            assert!(matches!(err, FileGateError::BadRequest(_)), "name {bad:?}");
        }
    }

    #[test]
    fn rename_with_explicit_path_crosses_directories() {
        let (_dir, root, locker) = scratch();
        write(&locker, &root, "a.txt", "payload").unwrap();

        rename(&locker, &root, "a.txt", None, Some("moved/here.txt")).unwrap();
        assert_eq!(
            fs::read_to_string(root.join("moved/here.txt")).unwrap(),
            "payload"
        );
    }

    #[test]
    fn rename_of_missing_source_is_not_found() {
        let (_dir, root, locker) = scratch();
        let err = rename(&locker, &root, "ghost.txt", Some("b.txt"), None).unwrap_err();
        assert!(matches!(err, FileGateError::NotFound(_)));
    }

    #[test]
    fn binary_read_infers_mime_and_name() {
        let (_dir, root, locker) = scratch();
        write_binary(&locker, &root, "img/shot.png", b"\x89PNG").unwrap();

        let file = read_binary(&root, "img/shot.png").unwrap();
        assert_eq!(file.mime, "image/png");
        assert_eq!(file.file_name, "shot.png");
        assert_eq!(file.data, b"\x89PNG");
    }
}
