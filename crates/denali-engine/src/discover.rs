//! Addon discovery through node-style `node_modules` lookup.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use denali_config::PackageManifest;

use crate::error::EngineError;

/// A child addon found while scanning a package's dependencies.
#[derive(Debug, Clone)]
pub struct AddonSummary {
    /// The addon's module directory, with `mainDir` applied.
    pub dir: PathBuf,
    pub pkg: PackageManifest,
}

/// Find the addons a package depends on.
///
/// # Algorithm
/// 1. Take the declared dependency names (plus dev dependencies when
///    `include_dev` is set).
/// 2. Locate each one in the nearest `node_modules` walking up from `dir`;
///    dependencies that are not installed are skipped.
/// 3. Keep packages that carry the addon keyword, plus every `preseeded`
///    directory regardless of its keywords.
/// 4. Deduplicate by real directory, sort by name, and apply `mainDir`.
///
/// # Errors
/// Returns an error if an installed package's `package.json` is unreadable.
pub fn discover_addons(
    dir: &Path,
    pkg: &PackageManifest,
    include_dev: bool,
    preseeded: &[PathBuf],
) -> Result<Vec<AddonSummary>, EngineError> {
    let mut seen: HashSet<PathBuf> = HashSet::new();
    let mut addons = Vec::new();

    for name in pkg.dependency_names(include_dev) {
        let Some(addon_dir) = locate_package(dir, name) else {
            tracing::debug!(dependency = name, from = %dir.display(), "dependency not installed, skipping");
            continue;
        };
        let addon_pkg = PackageManifest::from_dir(&addon_dir)?;
        if !addon_pkg.is_addon() {
            continue;
        }
        if seen.insert(real_path(&addon_dir)) {
            addons.push(AddonSummary {
                dir: addon_dir,
                pkg: addon_pkg,
            });
        }
    }

    for addon_dir in preseeded {
        if !addon_dir.join("package.json").is_file() {
            tracing::debug!(dir = %addon_dir.display(), "preseeded addon has no package.json, skipping");
            continue;
        }
        if !seen.insert(real_path(addon_dir)) {
            continue;
        }
        let addon_pkg = PackageManifest::from_dir(addon_dir)?;
        addons.push(AddonSummary {
            dir: addon_dir.clone(),
            pkg: addon_pkg,
        });
    }

    addons.sort_by(|a, b| a.pkg.name.cmp(&b.pkg.name));

    for addon in &mut addons {
        if let Some(main_dir) = &addon.pkg.main_dir {
            addon.dir = addon.dir.join(main_dir);
        }
    }

    for addon in &addons {
        tracing::debug!(addon = %addon.pkg.name, dir = %addon.dir.display(), "discovered child addon");
    }
    Ok(addons)
}

/// Resolve `name` the way node does: check `node_modules/<name>` in `from`
/// and then in each ancestor directory.
fn locate_package(from: &Path, name: &str) -> Option<PathBuf> {
    from.ancestors()
        .map(|ancestor| ancestor.join("node_modules").join(name))
        .find(|candidate| candidate.join("package.json").is_file())
}

/// Canonical form of `path`, or `path` itself when it cannot be resolved.
pub(crate) fn real_path(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::fs;

    use super::*;

    fn write_pkg(dir: &Path, json: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join("package.json"), json).unwrap();
    }

    fn addon_json(name: &str) -> String {
        format!(r#"{{ "name": "{name}", "version": "1.0.0", "keywords": ["denali-addon"] }}"#)
    }

    fn names(addons: &[AddonSummary]) -> Vec<&str> {
        addons.iter().map(|a| a.pkg.name.as_str()).collect()
    }

    #[test]
    fn finds_keyworded_dependencies_sorted_by_name() {
        let tmp = tempfile::tempdir().unwrap();
        let app = tmp.path().join("app");
        write_pkg(
            &app,
            r#"{ "name": "app", "dependencies": { "zeta": "*", "alpha": "*", "plain": "*" } }"#,
        );
        write_pkg(&app.join("node_modules/zeta"), &addon_json("zeta"));
        write_pkg(&app.join("node_modules/alpha"), &addon_json("alpha"));
        write_pkg(&app.join("node_modules/plain"), r#"{ "name": "plain" }"#);

        let pkg = PackageManifest::from_dir(&app).unwrap();
        let addons = discover_addons(&app, &pkg, false, &[]).unwrap();
        assert_eq!(names(&addons), vec!["alpha", "zeta"]);
    }

    #[test]
    fn dev_dependencies_only_when_requested() {
        let tmp = tempfile::tempdir().unwrap();
        let app = tmp.path().join("app");
        write_pkg(&app, r#"{ "name": "app", "devDependencies": { "dev-addon": "*" } }"#);
        write_pkg(&app.join("node_modules/dev-addon"), &addon_json("dev-addon"));

        let pkg = PackageManifest::from_dir(&app).unwrap();
        assert!(discover_addons(&app, &pkg, false, &[]).unwrap().is_empty());
        assert_eq!(names(&discover_addons(&app, &pkg, true, &[]).unwrap()), vec!["dev-addon"]);
    }

    #[test]
    fn walks_up_to_ancestor_node_modules() {
        let tmp = tempfile::tempdir().unwrap();
        let app = tmp.path().join("app");
        let nested = app.join("node_modules/outer");
        write_pkg(&app, r#"{ "name": "app" }"#);
        write_pkg(
            &nested,
            r#"{ "name": "outer", "keywords": ["denali-addon"], "dependencies": { "shared": "*" } }"#,
        );
        write_pkg(&app.join("node_modules/shared"), &addon_json("shared"));

        let pkg = PackageManifest::from_dir(&nested).unwrap();
        let addons = discover_addons(&nested, &pkg, false, &[]).unwrap();
        assert_eq!(addons.first().unwrap().dir, app.join("node_modules/shared"));
    }

    #[test]
    fn preseeded_dirs_join_regardless_of_keyword_and_dedupe() {
        let tmp = tempfile::tempdir().unwrap();
        let addon = tmp.path().join("my-addon");
        let dummy = addon.join("test/dummy");
        write_pkg(&addon, r#"{ "name": "my-addon" }"#);
        write_pkg(&dummy, r#"{ "name": "dummy" }"#);

        let pkg = PackageManifest::from_dir(&dummy).unwrap();
        let preseeded = vec![addon.clone(), dummy.join("../..")];
        let addons = discover_addons(&dummy, &pkg, true, &preseeded).unwrap();
        assert_eq!(names(&addons), vec!["my-addon"]);
    }

    #[test]
    fn main_dir_is_applied() {
        let tmp = tempfile::tempdir().unwrap();
        let app = tmp.path().join("app");
        write_pkg(&app, r#"{ "name": "app", "dependencies": { "built": "*" } }"#);
        write_pkg(
            &app.join("node_modules/built"),
            r#"{ "name": "built", "keywords": ["denali-addon"], "mainDir": "dist" }"#,
        );

        let pkg = PackageManifest::from_dir(&app).unwrap();
        let addons = discover_addons(&app, &pkg, false, &[]).unwrap();
        assert_eq!(addons.first().unwrap().dir, app.join("node_modules/built/dist"));
    }
}
