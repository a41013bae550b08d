use std::path::Path;

use denali_config::PackageManifest;
use denali_tree::{FunnelOptions, Tree};

use super::{BuilderCache, BuilderId};
use crate::error::EngineError;
use crate::trees::templates::{bundle_open, BUNDLE_CLOSE};
use crate::trees::{ConcatBundler, ConcatOptions};

/// Bundle the app's own modules together with its direct addons' fragments
/// into `<stem>.bundle.js`.
pub(super) fn bundle(
    cache: &mut BuilderCache,
    input: &Tree,
    dir: &Path,
    pkg: &PackageManifest,
    stem: &str,
    children: &[BuilderId],
) -> Result<Tree, EngineError> {
    let fragment_file = format!("{stem}.fragment.js");
    let mut own = ConcatOptions::new(fragment_file.clone());
    own.wrap_as_modules = true;
    own.base_dir = Some(dir.to_path_buf());
    let own = ConcatBundler::tree(input, own);

    let mut parts = Vec::new();
    for &child in children {
        if !cache.get(child)?.kind().is_addon() {
            continue;
        }
        let addon_tree = cache.tree_for(child)?;
        let addon = cache.get(child)?;
        let addon_stem = addon.file_stem();
        tracing::debug!(addon = addon.name(), "including addon fragment in app bundle");
        parts.push(
            Tree::funnel(
                &addon_tree,
                FunnelOptions::new()
                    .files([format!("{addon_stem}.fragment.js"), format!("{addon_stem}.fragment.map")])
                    .dest_dir(format!("addons/{addon_stem}")),
            )
            .annotated(format!("{} fragment", addon.name())),
        );
    }
    parts.push(own);
    // Distinct addons can share a file stem (`@a/b` and `a-b`); fail rather than drop one.
    let merged = Tree::merge_strict(parts).annotated("merge app and addon fragments");

    let mut options = ConcatOptions::new(format!("{stem}.bundle.js"));
    options.header = Some(bundle_open(&pkg.name, &pkg.version));
    options.footer = Some(BUNDLE_CLOSE.to_owned());
    options.input_files = vec!["addons/**/*.fragment.js".to_owned(), fragment_file];
    Ok(ConcatBundler::tree(&merged, options))
}
