use std::path::Path;

use denali_config::PackageManifest;
use denali_tree::Tree;

use super::Builder;
use crate::trees::templates::{camel_case, fragment_open, FRAGMENT_CLOSE};
use crate::trees::{ConcatBundler, ConcatOptions};

/// The addon's existing `dist/`, when it does not need compiling.
pub(super) fn precompiled_tree(builder: &Builder) -> Option<Tree> {
    if builder.needs_compilation() {
        return None;
    }
    let dist = builder.dir().join("dist");
    tracing::debug!(addon = builder.name(), dist = %dist.display(), "using precompiled addon");
    Some(Tree::source(dist).annotated(format!("{} (precompiled)", builder.name())))
}

/// Concatenate the addon's modules into `<stem>.fragment.js`.
pub(super) fn bundle(input: &Tree, dir: &Path, pkg: &PackageManifest, stem: &str) -> Tree {
    let mut options = ConcatOptions::new(format!("{stem}.fragment.js"));
    options.wrap_as_modules = true;
    options.main = pkg.main.clone();
    options.header = Some(fragment_open(&camel_case(&pkg.name), &pkg.name, &pkg.version));
    options.footer = Some(FRAGMENT_CLOSE.to_owned());
    options.base_dir = Some(dir.to_path_buf());
    ConcatBundler::tree(input, options)
}
