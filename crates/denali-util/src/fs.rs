//! Filesystem utilities for Denali builds.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::UtilError;

/// Create a directory and all parent directories if they do not exist.
///
/// # Errors
/// Returns an error if the directory cannot be created.
pub fn ensure_dir(path: &Path) -> Result<(), UtilError> {
    std::fs::create_dir_all(path).map_err(|source| UtilError::io(path, source))
}

/// Copy `src` to `dest`, preferring a hard link for speed.
///
/// Falls back to a regular copy if hard linking fails (e.g. cross-device).
///
/// # Errors
/// Returns an error if both hard linking and copying fail.
pub fn materialize(src: &Path, dest: &Path) -> Result<(), UtilError> {
    if let Some(parent) = dest.parent() {
        ensure_dir(parent)?;
    }

    // Remove existing destination if present, so hard_link doesn't fail.
    if dest.symlink_metadata().is_ok() {
        std::fs::remove_file(dest).map_err(|source| UtilError::io(dest, source))?;
    }

    if std::fs::hard_link(src, dest).is_err() {
        std::fs::copy(src, dest).map_err(|source| UtilError::io(dest, source))?;
    }

    Ok(())
}

/// Remove a directory and all its contents. No error if the directory is absent.
///
/// A symlink at `path` is removed without touching its target.
///
/// # Errors
/// Returns an error if the directory exists but cannot be removed.
pub fn remove_dir_all_if_exists(path: &Path) -> Result<(), UtilError> {
    if is_symlink(path) {
        return remove_symlink(path);
    }
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(UtilError::io(path, source)),
    }
}

/// Whether `path` itself (not its target) is a symbolic link.
pub fn is_symlink(path: &Path) -> bool {
    std::fs::symlink_metadata(path).is_ok_and(|meta| meta.file_type().is_symlink())
}

/// Recursively copy `src` into `dest`, following symlinks so that `dest`
/// contains real files only.
///
/// `dest` is created if missing; existing files at the same relative paths
/// are overwritten.
///
/// # Errors
/// Returns an error if `src` cannot be walked or a file cannot be copied.
pub fn copy_dereference(src: &Path, dest: &Path) -> Result<(), UtilError> {
    ensure_dir(dest)?;
    for relative in relative_files(src)? {
        let from = src.join(&relative);
        let to = dest.join(&relative);
        if let Some(parent) = to.parent() {
            ensure_dir(parent)?;
        }
        if to.symlink_metadata().is_ok() {
            std::fs::remove_file(&to).map_err(|source| UtilError::io(&to, source))?;
        }
        std::fs::copy(&from, &to).map_err(|source| UtilError::io(&to, source))?;
    }
    Ok(())
}

/// Point `dest` at `src` with a directory symlink, falling back to a deep copy
/// on platforms without symlink support.
///
/// # Errors
/// Returns an error if neither the link nor the copy can be created.
pub fn symlink_or_copy(src: &Path, dest: &Path) -> Result<(), UtilError> {
    if let Some(parent) = dest.parent() {
        ensure_dir(parent)?;
    }
    if link_dir(src, dest).is_ok() {
        return Ok(());
    }
    copy_dereference(src, dest)
}

#[cfg(unix)]
fn link_dir(src: &Path, dest: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(src, dest)
}

#[cfg(windows)]
fn link_dir(src: &Path, dest: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_dir(src, dest)
}

#[cfg(not(any(unix, windows)))]
fn link_dir(_src: &Path, _dest: &Path) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "symlinks are not supported on this platform",
    ))
}

fn remove_symlink(path: &Path) -> Result<(), UtilError> {
    // Directory symlinks on Windows must be removed with remove_dir.
    std::fs::remove_file(path)
        .or_else(|_| std::fs::remove_dir(path))
        .map_err(|source| UtilError::io(path, source))
}

/// Collect every file below `dir` as a path relative to `dir`, following
/// symlinks, sorted by path. A missing `dir` yields an empty list.
///
/// # Errors
/// Returns an error if `dir` exists but cannot be walked.
pub fn relative_files(dir: &Path) -> Result<Vec<PathBuf>, UtilError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry.map_err(|e| UtilError::Walk {
            path: dir.display().to_string(),
            message: e.to_string(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Ok(relative) = entry.path().strip_prefix(dir) {
            files.push(relative.to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}

/// Render a relative path with forward slashes, for glob matching and for
/// paths embedded in generated files.
pub fn slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
