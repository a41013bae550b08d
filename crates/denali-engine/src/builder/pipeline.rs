//! Tree assembly: sources, hooks, bundling, unit tests, ejection.

use denali_config::Environment;
use denali_tree::{globify, FunnelOptions, Tree};

use super::{addon, app, dummy, Builder, BuilderCache, BuilderId, BuilderKind};
use crate::error::EngineError;
use crate::hooks::{Ejections, HookContext};
use crate::trees::{EjectNode, PackageFileCopier, UnitTestBundler};

/// Top-level directories fed through the build.
const SOURCE_DIRS: [&str; 5] = ["app", "blueprints", "commands", "config", "lib"];

/// Directories whose modules end up in bundles and fragments.
const BUNDLED_DIRS: [&str; 3] = ["app", "config", "lib"];

const UNIT_TEST_DIR: &str = "test/unit";

impl BuilderCache {
    /// The finished tree for `id`, assembling it on first call.
    ///
    /// # Errors
    /// Returns an error if a hook fails, a child builder cannot be created, or
    /// the package's tree depends on itself.
    pub fn tree_for(&mut self, id: BuilderId) -> Result<Tree, EngineError> {
        let builder = self.get(id)?;
        if let Some(tree) = &builder.tree {
            return Ok(tree.clone());
        }
        if builder.assembling {
            return Err(EngineError::BuilderCycle {
                name: builder.name().to_owned(),
            });
        }

        self.get_mut(id)?.assembling = true;
        let result = self.assemble(id);
        let builder = self.get_mut(id)?;
        builder.assembling = false;
        let tree = result?;
        builder.tree = Some(tree.clone());
        Ok(tree)
    }

    fn assemble(&mut self, id: BuilderId) -> Result<Tree, EngineError> {
        let path = self.logical_dependency_path(id).join(" > ");
        let span = tracing::debug_span!("assemble", builder = %path);
        let _entered = span.enter();

        let builder = self.get(id)?;
        if builder.kind.is_addon() {
            if let Some(tree) = addon::precompiled_tree(builder) {
                return Ok(tree);
            }
        }

        let children = self.child_builders(id)?;
        let builder = self.get(id)?;
        let dir = builder.dir.clone();
        let pkg = builder.pkg.clone();
        let kind = builder.kind.clone();
        let stem = builder.file_stem();
        let environment = self.environment();
        let base = base_tree(builder, environment);

        let mut ejections = Ejections::new();
        let compiled = self.run_hooks(id, &children, base, &mut ejections)?;
        let compiled = with_package_dirs(self.get(id)?, compiled);
        let compiled = if kind.is_dummy() {
            dummy::with_addon_tests(self, id, compiled)?
        } else {
            compiled
        };

        let bundle_input = Tree::funnel(&compiled, FunnelOptions::new().include(globify(&BUNDLED_DIRS)))
            .annotated(format!("{} bundled sources", pkg.name));
        let bundled = match kind.layout() {
            BuilderKind::Addon => addon::bundle(&bundle_input, &dir, &pkg, &stem),
            _ => app::bundle(self, &bundle_input, &dir, &pkg, &stem, &children)?,
        };

        let mut outputs = vec![compiled.clone(), bundled];
        // The addon under test has its tests run by the dummy app instead.
        if environment.is_test() && !self.get(id)?.under_test() {
            tracing::debug!("including unit tests in output");
            let bundle_file = if kind.is_addon() {
                format!("{stem}.fragment.js")
            } else {
                format!("{stem}.bundle.js")
            };
            let unit_tests = Tree::funnel(&compiled, FunnelOptions::new().include([format!("{UNIT_TEST_DIR}/**")]))
                .annotated(format!("{} unit tests", pkg.name));
            outputs.push(UnitTestBundler::tree(&unit_tests, bundle_file));
        }
        let tree = Tree::merge(outputs).annotated(format!("{} output", pkg.name));

        if self.get(id)?.should_eject() {
            tracing::debug!("compiling on the fly, ejecting to dist");
            ejections.entry(dir.join("dist")).or_default().push(tree.clone());
        }
        let mut tree = flush_ejections(tree, ejections);

        if kind.is_dummy() {
            tree = dummy::install_addon_under_test(self, id, tree)?;
        }
        Ok(tree)
    }

    /// Run this package's `process_self` hook, then each child addon's
    /// `process_parent` hook in discovery order.
    fn run_hooks(
        &self,
        id: BuilderId,
        children: &[BuilderId],
        mut tree: Tree,
        ejections: &mut Ejections,
    ) -> Result<Tree, EngineError> {
        let builder = self.get(id)?;
        let mut cx = HookContext::new(&builder.dir, self.environment(), self.lint(), ejections);

        if let Some(hook) = builder.plugin.as_ref().and_then(|p| p.process_self.clone()) {
            tracing::debug!("running process_self");
            tree = hook.process_self(&mut cx, tree)?;
        }
        for &child in children {
            let child = self.get(child)?;
            if let Some(hook) = child.plugin.as_ref().and_then(|p| p.process_parent.clone()) {
                tracing::debug!(from = child.name(), "running process_parent");
                tree = hook.process_parent(&mut cx, tree)?;
            }
        }
        Ok(tree)
    }
}

/// Each existing source directory re-rooted under its own name, plus the
/// package files.
fn base_tree(builder: &Builder, environment: Environment) -> Tree {
    let mut dirs: Vec<&str> = SOURCE_DIRS.to_vec();
    if environment.is_test() {
        dirs.push("test");
    }

    let mut trees: Vec<Tree> = dirs
        .into_iter()
        .filter(|name| builder.dir.join(name).is_dir())
        .map(|name| {
            Tree::funnel(&Tree::source(builder.dir.join(name)), FunnelOptions::new().dest_dir(name))
                .annotated(name)
        })
        .collect();
    trees.push(PackageFileCopier::tree(
        &builder.dir,
        builder.config.package_files.clone(),
        builder.pkg.clone(),
    ));
    Tree::merge(trees).annotated(format!("{} base tree", builder.name()))
}

/// Lay the package's unbuilt directories under the compiled tree.
fn with_package_dirs(builder: &Builder, compiled: Tree) -> Tree {
    let mut trees: Vec<Tree> = builder
        .config
        .package_dirs
        .iter()
        .filter(|name| builder.dir.join(name).is_dir())
        .map(|name| {
            Tree::funnel(&Tree::source(builder.dir.join(name)), FunnelOptions::new().dest_dir(name))
                .annotated(name.as_str())
        })
        .collect();
    if trees.is_empty() {
        return compiled;
    }
    trees.push(compiled);
    Tree::merge(trees).annotated(format!("{} with package dirs", builder.name()))
}

/// Turn queued ejections into eject nodes.
///
/// When the only tree queued for a destination is the finished tree itself,
/// the eject node replaces it and passes the content through. Anything else
/// is merged per destination and ejected alongside the finished tree.
fn flush_ejections(tree: Tree, ejections: Ejections) -> Tree {
    let mut tree = tree;
    let mut side_effects = Vec::new();
    for (destination, mut queued) in ejections {
        let only_final = queued.len() == 1 && queued.first().is_some_and(|t| t.ptr_eq(&tree));
        if only_final {
            tree = EjectNode::tree(&tree, destination, true);
            continue;
        }
        let input = if queued.len() == 1 {
            queued.remove(0)
        } else {
            Tree::merge(queued).annotated(format!("ejections to {}", destination.display()))
        };
        side_effects.push(EjectNode::tree(&input, destination, false));
    }
    if side_effects.is_empty() {
        return tree;
    }
    let mut inputs = vec![tree];
    inputs.append(&mut side_effects);
    Tree::merge(inputs).annotated("merge ejections")
}
