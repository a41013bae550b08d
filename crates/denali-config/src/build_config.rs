use serde::{Deserialize, Serialize};
use std::path::Path;

/// File name of the optional per-package build configuration.
pub const FILE_NAME: &str = "denali-build.toml";

/// Per-package build settings read from `denali-build.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildConfig {
    /// Name of a registered custom builder to use for this package.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub builder: Option<String>,
    /// Top-level files copied as-is into the build output.
    #[serde(default = "default_package_files")]
    pub package_files: Vec<String>,
    /// Top-level directories copied as-is, bypassing build hooks.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub package_dirs: Vec<String>,
    /// Dependency paths (`name@range` segments) whose vulnerabilities are ignored.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ignore_vulnerabilities: Vec<Vec<String>>,
    /// Marks this addon as under active development.
    #[serde(default)]
    pub developing: bool,
}

fn default_package_files() -> Vec<String> {
    [
        "package.json",
        "README.md",
        "CHANGELOG.md",
        "LICENSE",
        FILE_NAME,
        "yarn.lock",
    ]
    .into_iter()
    .map(str::to_owned)
    .collect()
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            builder: None,
            package_files: default_package_files(),
            package_dirs: Vec::new(),
            ignore_vulnerabilities: Vec::new(),
            developing: false,
        }
    }
}

impl BuildConfig {
    /// Read and parse a `denali-build.toml` from the given path.
    /// Returns the default configuration if the file does not exist.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or contains invalid TOML.
    pub fn from_path(path: &Path) -> Result<Self, BuildConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| BuildConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: BuildConfig = toml::from_str(&content).map_err(|e| BuildConfigError::Parse {
            path: path.display().to_string(),
            source: e,
        })?;
        Ok(config)
    }

    /// Read `denali-build.toml` from a package root, if present.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn from_dir(dir: &Path) -> Result<Self, BuildConfigError> {
        Self::from_path(&dir.join(FILE_NAME))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BuildConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid denali-build.toml at {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}
