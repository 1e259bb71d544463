//! Durable whole-file JSON storage.
//!
//! Documents are written to a sibling temp file, fsynced and renamed over the
//! target, so a reader sees either the previous version or the new one. A
//! crash mid-write leaves at most a stray temp file, which `read_json` ignores
//! and `discard_stale_temp` removes.

use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed document {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
    move |source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Temp file used while replacing `target`.
pub fn temp_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    target.with_file_name(format!(".{}.tmp", name))
}

/// Atomically replace `target` with `content`: temp file, fsync, rename, fsync parent.
pub fn atomic_write(target: &Path, content: &[u8]) -> Result<(), StorageError> {
    let parent = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent).map_err(io_err(&parent))?;

    let temp = temp_path(target);
    {
        let mut file = fs::File::create(&temp).map_err(io_err(&temp))?;
        file.write_all(content).map_err(io_err(&temp))?;
        file.sync_all().map_err(io_err(&temp))?;
    }

    fs::rename(&temp, target).map_err(io_err(target))?;

    // Make the rename itself durable.
    if let Ok(dir) = fs::File::open(&parent) {
        let _ = dir.sync_all();
    }
    Ok(())
}

/// Serialize `value` as pretty JSON and atomically replace `target`.
pub fn write_json<T: Serialize>(target: &Path, value: &T) -> Result<(), StorageError> {
    let mut bytes = serde_json::to_vec_pretty(value).map_err(|source| StorageError::Serialize {
        path: target.to_path_buf(),
        source,
    })?;
    bytes.push(b'\n');
    atomic_write(target, &bytes)
}

/// Read a JSON document written by `write_json`.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StorageError> {
    let bytes = fs::read(path).map_err(io_err(path))?;
    serde_json::from_slice(&bytes).map_err(|source| StorageError::Serialize {
        path: path.to_path_buf(),
        source,
    })
}

/// Remove a temp file left behind by an interrupted write. Returns true if one existed.
pub fn discard_stale_temp(target: &Path) -> bool {
    let temp = temp_path(target);
    temp.exists() && fs::remove_file(&temp).is_ok()
}

/// Recursively copy a directory tree.
pub fn copy_dir(from: &Path, to: &Path) -> Result<u64, StorageError> {
    fs::create_dir_all(to).map_err(io_err(to))?;
    let mut copied = 0;
    for entry in fs::read_dir(from).map_err(io_err(from))? {
        let entry = entry.map_err(io_err(from))?;
        let source = entry.path();
        let dest = to.join(entry.file_name());
        if entry.file_type().map_err(io_err(&source))?.is_dir() {
            copied += copy_dir(&source, &dest)?;
        } else {
            fs::copy(&source, &dest).map_err(io_err(&source))?;
            copied += 1;
        }
    }
    Ok(copied)
}
