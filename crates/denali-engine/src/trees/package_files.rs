//! Copy top-level package files (package.json, README, ...) into the output.
//!
//! Source nodes can only address directories, and watching the package root
//! itself would also watch the build's own output. This node reads the files
//! straight from the package root instead; edits to them need a restart.

use std::path::{Path, PathBuf};

use denali_config::PackageManifest;
use denali_tree::{Plugin, PluginContext, Tree, TreeError};
use denali_util::fs::{ensure_dir, slash_path};

#[derive(Debug)]
pub struct PackageFileCopier {
    dir: PathBuf,
    patterns: Vec<String>,
    pkg: PackageManifest,
}

impl PackageFileCopier {
    pub fn new(dir: impl Into<PathBuf>, patterns: Vec<String>, pkg: PackageManifest) -> Self {
        Self {
            dir: dir.into(),
            patterns,
            pkg,
        }
    }

    pub fn tree(dir: &Path, patterns: Vec<String>, pkg: PackageManifest) -> Tree {
        let annotation = format!("package files of {}", pkg.name);
        Tree::plugin(Vec::new(), Self::new(dir, patterns, pkg)).annotated(annotation)
    }

    fn matching_files(&self) -> Result<Vec<PathBuf>, TreeError> {
        let root = glob::Pattern::escape(&self.dir.display().to_string());
        let mut files = Vec::new();
        for pattern in &self.patterns {
            let full = format!("{root}/{pattern}");
            let paths = glob::glob(&full).map_err(|e| TreeError::Pattern {
                pattern: pattern.clone(),
                message: e.to_string(),
            })?;
            for path in paths.filter_map(Result::ok).filter(|p| p.is_file()) {
                if let Ok(relative) = path.strip_prefix(&self.dir) {
                    let relative = relative.to_path_buf();
                    if !files.contains(&relative) {
                        files.push(relative);
                    }
                }
            }
        }
        Ok(files)
    }
}

impl Plugin for PackageFileCopier {
    fn build(&mut self, ctx: &PluginContext<'_>) -> Result<(), TreeError> {
        for relative in self.matching_files()? {
            let src = self.dir.join(&relative);
            let dest = ctx.output.join(&relative);
            if let Some(parent) = dest.parent() {
                ensure_dir(parent)?;
            }
            std::fs::copy(&src, &dest).map_err(|source| TreeError::io(&dest, source))?;
            tracing::trace!(file = %slash_path(&relative), "copied package file");
        }

        // Addon blueprints block `npm publish` from the package root; the
        // built package is what gets published, so it must not carry the block.
        let mut pkg = self.pkg.clone();
        if pkg.remove_publish_blocker() {
            let dest = ctx.output.join("package.json");
            let json = pkg
                .to_json_pretty()
                .map_err(|e| TreeError::plugin(ctx.annotation, e.to_string()))?;
            std::fs::write(&dest, json).map_err(|source| TreeError::io(&dest, source))?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::fs;

    use denali_tree::{LocalEngine, TreeEngine};

    use super::*;

    fn package(dir: &Path, json: &str) -> PackageManifest {
        fs::write(dir.join("package.json"), json).unwrap();
        PackageManifest::from_dir(dir).unwrap()
    }

    #[test]
    fn copies_only_existing_files() {
        let tmp = tempfile::tempdir().unwrap();
        let pkg = package(tmp.path(), r#"{ "name": "my-app", "version": "1.0.0" }"#);
        fs::write(tmp.path().join("README.md"), "readme").unwrap();

        let patterns = vec!["package.json".to_owned(), "README.md".to_owned(), "LICENSE".to_owned()];
        let mut engine = LocalEngine::new(PackageFileCopier::tree(tmp.path(), patterns, pkg));
        let out = engine.build().unwrap().directory;

        assert!(out.join("package.json").is_file());
        assert_eq!(fs::read_to_string(out.join("README.md")).unwrap(), "readme");
        assert!(!out.join("LICENSE").exists());
    }

    #[test]
    fn glob_patterns_are_expanded() {
        let tmp = tempfile::tempdir().unwrap();
        let pkg = package(tmp.path(), r#"{ "name": "my-app" }"#);
        fs::write(tmp.path().join("a.md"), "a").unwrap();
        fs::write(tmp.path().join("b.md"), "b").unwrap();

        let mut engine =
            LocalEngine::new(PackageFileCopier::tree(tmp.path(), vec!["*.md".to_owned()], pkg));
        let out = engine.build().unwrap().directory;
        assert!(out.join("a.md").is_file());
        assert!(out.join("b.md").is_file());
        assert!(!out.join("package.json").exists());
    }

    #[test]
    fn removes_publish_blocker_but_keeps_custom_prepublish() {
        let tmp = tempfile::tempdir().unwrap();
        let blocked = package(
            tmp.path(),
            r#"{ "name": "my-addon", "scripts": { "prepublish": "echo \"Use 'denali publish' instead.\"; exit 1", "test": "denali test" } }"#,
        );
        let mut engine = LocalEngine::new(PackageFileCopier::tree(
            tmp.path(),
            vec!["package.json".to_owned()],
            blocked,
        ));
        let out = engine.build().unwrap().directory;
        let written = PackageManifest::from_dir(&out).unwrap();
        assert!(!written.scripts.contains_key("prepublish"));
        assert_eq!(written.scripts.get("test").unwrap(), "denali test");

        let custom = package(
            tmp.path(),
            r#"{ "name": "my-addon", "scripts": { "prepublish": "npm run build" } }"#,
        );
        let mut engine = LocalEngine::new(PackageFileCopier::tree(
            tmp.path(),
            vec!["package.json".to_owned()],
            custom,
        ));
        let out = engine.build().unwrap().directory;
        let written = PackageManifest::from_dir(&out).unwrap();
        assert_eq!(written.scripts.get("prepublish").unwrap(), "npm run build");
    }
}
