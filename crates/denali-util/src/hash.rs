//! Directory fingerprints, used to skip rewriting unchanged ejections.

use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::UtilError;

/// Hash all files matching `pattern` inside `dir`, sorted by relative path for determinism.
///
/// The `pattern` is a glob expression (e.g. `"**/*"`). Relative paths are part of
/// the digest so renames change the fingerprint. A missing `dir` hashes as empty.
///
/// # Errors
/// Returns an error if the glob pattern is invalid or any matched file cannot be read.
pub fn sha256_dir(dir: &Path, pattern: &str) -> Result<String, UtilError> {
    let escaped_dir = glob::Pattern::escape(&dir.display().to_string());
    let full_pattern_str = Path::new(&escaped_dir).join(pattern).display().to_string();

    let mut paths: Vec<_> = glob::glob(&full_pattern_str)
        .map_err(|e| UtilError::GlobPattern {
            pattern: full_pattern_str.clone(),
            message: e.to_string(),
        })?
        .filter_map(Result::ok)
        .filter(|p| p.is_file())
        .collect();

    paths.sort();

    let mut hasher = Sha256::new();
    for path in &paths {
        let relative = path.strip_prefix(dir).unwrap_or(path);
        let relative = relative.display().to_string();
        // Length-prefix the path so ["ab","c"] and ["a","bc"] differ.
        hasher.update(relative.len().to_le_bytes());
        hasher.update(relative.as_bytes());

        let data = std::fs::read(path).map_err(|source| UtilError::io(path, source))?;
        hasher.update(&data);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn sha256_dir_treats_dir_name_literally() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("pkg[1]");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("a.js"), "one").unwrap();
        let empty = sha256_dir(&tmp.path().join("empty"), "**/*").unwrap();
        let before = sha256_dir(&dir, "**/*").unwrap();
        assert_ne!(before, empty);
        fs::write(dir.join("a.js"), "two").unwrap();
        assert_ne!(before, sha256_dir(&dir, "**/*").unwrap());
    }

    #[test]
    fn sha256_dir_detects_content_change() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("a.js"), "one").unwrap();
        let before = sha256_dir(tmp.path(), "**/*").unwrap();
        fs::write(tmp.path().join("a.js"), "two").unwrap();
        let after = sha256_dir(tmp.path(), "**/*").unwrap();
        assert_ne!(before, after);
    }

    #[test]
    fn sha256_dir_detects_rename() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("a.js"), "same").unwrap();
        let before = sha256_dir(tmp.path(), "**/*").unwrap();
        fs::rename(tmp.path().join("a.js"), tmp.path().join("b.js")).unwrap();
        let after = sha256_dir(tmp.path(), "**/*").unwrap();
        assert_ne!(before, after);
    }

    #[test]
    fn sha256_dir_missing_dir_is_stable() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("nope");
        assert_eq!(
            sha256_dir(&missing, "**/*").unwrap(),
            sha256_dir(&missing, "**/*").unwrap()
        );
    }
}
