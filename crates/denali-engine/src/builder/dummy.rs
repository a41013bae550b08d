use denali_tree::{FunnelOptions, Tree};

use super::{BuilderCache, BuilderId};
use crate::error::EngineError;

/// Lay the addon's own tests under the dummy's compiled sources, so they are
/// wrapped against the dummy's bundle along with the dummy's tests.
pub(super) fn with_addon_tests(
    cache: &BuilderCache,
    dummy: BuilderId,
    compiled: Tree,
) -> Result<Tree, EngineError> {
    let Some(addon) = cache.get(dummy)?.addon_under_test else {
        return Ok(compiled);
    };
    let addon = cache.get(addon)?;
    let test_dir = addon.dir().join("test");
    if !test_dir.is_dir() {
        return Ok(compiled);
    }

    let tests = Tree::funnel(
        &Tree::source(test_dir),
        FunnelOptions::new().exclude(["dummy/**"]).dest_dir("test"),
    )
    .annotated(format!("{} tests", addon.name()));
    Ok(Tree::merge(vec![compiled, tests]).annotated("merge addon tests into dummy"))
}

/// Install the compiled addon under test at `node_modules/<name>` so the
/// dummy's tests can import it.
pub(super) fn install_addon_under_test(
    cache: &mut BuilderCache,
    dummy: BuilderId,
    tree: Tree,
) -> Result<Tree, EngineError> {
    let Some(addon) = cache.get(dummy)?.addon_under_test else {
        return Ok(tree);
    };
    let addon_tree = cache.tree_for(addon)?;
    let addon = cache.get(addon)?;
    let name = addon.name().to_owned();

    // Resolution needs a manifest even when the addon's package files leave it out.
    let manifest = Tree::write_file(
        format!("node_modules/{name}/package.json"),
        addon.pkg().to_json_pretty()?,
    );
    let compiled = Tree::funnel(
        &addon_tree,
        FunnelOptions::new()
            .exclude(["test/**"])
            .dest_dir(format!("node_modules/{name}")),
    )
    .annotated(format!("{name} in node_modules"));

    Ok(Tree::merge(vec![tree, manifest, compiled]).annotated("install addon under test"))
}
