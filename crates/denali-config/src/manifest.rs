use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Keyword that marks a package as a Denali addon.
pub const ADDON_KEYWORD: &str = "denali-addon";

/// Marker left in the `prepublish` script of freshly generated addons, which
/// blocks a plain `npm publish` from the package root.
pub const PUBLISH_BLOCKER: &str = "Use 'denali publish' instead.";

/// The subset of `package.json` the build cares about.
///
/// Fields not modelled here are preserved in `extra` so the manifest can be
/// written back out without losing data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageManifest {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    /// Entry module, marked as main when the package is bundled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main: Option<String>,
    /// Subdirectory holding the loadable module, relative to the package root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_dir: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub scripts: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dev_dependencies: BTreeMap<String, String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl PackageManifest {
    /// Read and parse a `package.json` from the given path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or contains invalid JSON.
    pub fn from_path(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path).map_err(|e| ManifestError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let manifest: PackageManifest =
            serde_json::from_str(&content).map_err(|e| ManifestError::Parse {
                path: path.display().to_string(),
                source: e,
            })?;
        Ok(manifest)
    }

    /// Read `package.json` from a package root directory.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or contains invalid JSON.
    pub fn from_dir(dir: &Path) -> Result<Self, ManifestError> {
        Self::from_path(&dir.join("package.json"))
    }

    /// Whether the manifest carries the addon keyword.
    pub fn is_addon(&self) -> bool {
        self.keywords.iter().any(|k| k == ADDON_KEYWORD)
    }

    /// Names of declared dependencies, optionally including dev dependencies.
    pub fn dependency_names(&self, include_dev: bool) -> Vec<&str> {
        let mut names: Vec<&str> = self.dependencies.keys().map(String::as_str).collect();
        if include_dev {
            names.extend(self.dev_dependencies.keys().map(String::as_str));
        }
        names.sort_unstable();
        names.dedup();
        names
    }

    /// Drop the `prepublish` script if it is the generated publish blocker.
    ///
    /// Returns `true` if the manifest was changed. A user-edited `prepublish`
    /// is left alone.
    pub fn remove_publish_blocker(&mut self) -> bool {
        let is_blocker = self
            .scripts
            .get("prepublish")
            .is_some_and(|script| script.contains(PUBLISH_BLOCKER));
        if is_blocker {
            self.scripts.remove("prepublish");
        }
        is_blocker
    }

    /// Serialize as pretty-printed JSON.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, ManifestError> {
        serde_json::to_string_pretty(self).map_err(|e| ManifestError::Serialize { source: e })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid package.json at {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
    #[error("cannot serialize package.json: {source}")]
    Serialize { source: serde_json::Error },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(json: &str) -> PackageManifest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn parses_minimal_manifest() {
        let pkg = parse(r#"{ "name": "my-app" }"#);
        assert_eq!(pkg.name, "my-app");
        assert!(pkg.version.is_empty());
        assert!(!pkg.is_addon());
    }

    #[test]
    fn detects_addon_keyword() {
        let pkg = parse(r#"{ "name": "my-addon", "version": "1.0.0", "keywords": ["denali-addon"] }"#);
        assert!(pkg.is_addon());
    }

    #[test]
    fn main_dir_is_camel_case() {
        let pkg = parse(r#"{ "name": "x", "mainDir": "dist" }"#);
        assert_eq!(pkg.main_dir.as_deref(), Some("dist"));
    }

    #[test]
    fn dependency_names_with_and_without_dev() {
        let pkg = parse(
            r#"{ "name": "x",
                 "dependencies": { "b": "^1.0.0", "a": "^1.0.0" },
                 "devDependencies": { "c": "^1.0.0", "a": "^1.0.0" } }"#,
        );
        assert_eq!(pkg.dependency_names(false), vec!["a", "b"]);
        assert_eq!(pkg.dependency_names(true), vec!["a", "b", "c"]);
    }

    #[test]
    fn removes_generated_publish_blocker_only() {
        let mut generated = parse(
            r#"{ "name": "x", "scripts": { "prepublish": "echo \"Use 'denali publish' instead.\"; exit 1", "test": "denali test" } }"#,
        );
        assert!(generated.remove_publish_blocker());
        assert!(!generated.scripts.contains_key("prepublish"));
        assert!(generated.scripts.contains_key("test"));

        let mut custom = parse(r#"{ "name": "x", "scripts": { "prepublish": "npm run lint" } }"#);
        assert!(!custom.remove_publish_blocker());
        assert!(custom.scripts.contains_key("prepublish"));
    }

    #[test]
    fn unknown_fields_survive_round_trip() {
        let pkg = parse(r#"{ "name": "x", "license": "MIT", "repository": { "type": "git" } }"#);
        let json = pkg.to_json_pretty().unwrap();
        let reparsed = parse(&json);
        assert_eq!(reparsed.extra.get("license").unwrap(), "MIT");
        assert!(reparsed.extra.contains_key("repository"));
    }

    #[test]
    fn missing_file_is_read_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = PackageManifest::from_dir(tmp.path()).unwrap_err();
        assert!(matches!(err, ManifestError::Read { .. }));
    }
}
