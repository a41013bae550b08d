//! Build hooks contributed by packages.
//!
//! A package opts into custom build behavior by naming a registered
//! [`BuilderPlugin`] in its `denali-build.toml`, or by having one registered
//! under its package name. The plugin can rewrite the package's own tree
//! (`process_self`) and the tree of every package that depends on it
//! (`process_parent`).

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use denali_config::Environment;
use denali_tree::Tree;

use crate::error::EngineError;

/// Trees queued for ejection, keyed by destination directory.
pub type Ejections = BTreeMap<PathBuf, Vec<Tree>>;

/// What a hook can see and do while a package's tree is assembled.
pub struct HookContext<'a> {
    dir: &'a Path,
    environment: Environment,
    lint: bool,
    ejections: &'a mut Ejections,
}

impl<'a> HookContext<'a> {
    pub(crate) fn new(
        dir: &'a Path,
        environment: Environment,
        lint: bool,
        ejections: &'a mut Ejections,
    ) -> Self {
        Self {
            dir,
            environment,
            lint,
            ejections,
        }
    }

    /// Source directory of the package whose tree is being assembled.
    pub fn dir(&self) -> &Path {
        self.dir
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// Whether the build asked for linting.
    pub fn lint(&self) -> bool {
        self.lint
    }

    /// Queue `tree` to be written to `destination` when the build runs.
    ///
    /// The tree passed through the hook is not changed. All trees queued for
    /// one destination are merged before being written.
    pub fn eject(&mut self, tree: Tree, destination: impl Into<PathBuf>) {
        self.ejections.entry(destination.into()).or_default().push(tree);
    }
}

/// Rewrites a package's own tree.
pub trait SelfProcessor: Send + Sync {
    /// # Errors
    /// Returns an error to fail the build.
    fn process_self(&self, cx: &mut HookContext<'_>, tree: Tree) -> Result<Tree, EngineError>;
}

/// Rewrites the tree of a package that depends on this one.
pub trait ParentProcessor: Send + Sync {
    /// # Errors
    /// Returns an error to fail the build.
    fn process_parent(&self, cx: &mut HookContext<'_>, tree: Tree) -> Result<Tree, EngineError>;
}

impl<F> SelfProcessor for F
where
    F: Fn(&mut HookContext<'_>, Tree) -> Result<Tree, EngineError> + Send + Sync,
{
    fn process_self(&self, cx: &mut HookContext<'_>, tree: Tree) -> Result<Tree, EngineError> {
        self(cx, tree)
    }
}

impl<F> ParentProcessor for F
where
    F: Fn(&mut HookContext<'_>, Tree) -> Result<Tree, EngineError> + Send + Sync,
{
    fn process_parent(&self, cx: &mut HookContext<'_>, tree: Tree) -> Result<Tree, EngineError> {
        self(cx, tree)
    }
}

/// The hooks one package contributes.
#[derive(Clone, Default)]
pub struct BuilderPlugin {
    pub(crate) process_self: Option<Arc<dyn SelfProcessor>>,
    pub(crate) process_parent: Option<Arc<dyn ParentProcessor>>,
}

impl BuilderPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_process_self<F>(self, hook: F) -> Self
    where
        F: Fn(&mut HookContext<'_>, Tree) -> Result<Tree, EngineError> + Send + Sync + 'static,
    {
        self.with_self_processor(hook)
    }

    #[must_use]
    pub fn with_process_parent<F>(self, hook: F) -> Self
    where
        F: Fn(&mut HookContext<'_>, Tree) -> Result<Tree, EngineError> + Send + Sync + 'static,
    {
        self.with_parent_processor(hook)
    }

    #[must_use]
    pub fn with_self_processor(mut self, processor: impl SelfProcessor + 'static) -> Self {
        self.process_self = Some(Arc::new(processor));
        self
    }

    #[must_use]
    pub fn with_parent_processor(mut self, processor: impl ParentProcessor + 'static) -> Self {
        self.process_parent = Some(Arc::new(processor));
        self
    }

    pub fn has_process_self(&self) -> bool {
        self.process_self.is_some()
    }

    pub fn has_process_parent(&self) -> bool {
        self.process_parent.is_some()
    }
}

impl fmt::Debug for BuilderPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuilderPlugin")
            .field("process_self", &self.has_process_self())
            .field("process_parent", &self.has_process_parent())
            .finish()
    }
}

/// Named builder plugins available to a build.
#[derive(Debug, Clone, Default)]
pub struct BuilderRegistry {
    plugins: HashMap<String, BuilderPlugin>,
}

impl BuilderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `plugin` under `name`, replacing any earlier registration.
    pub fn register(&mut self, name: impl Into<String>, plugin: BuilderPlugin) -> &mut Self {
        self.plugins.insert(name.into(), plugin);
        self
    }

    pub fn get(&self, name: &str) -> Option<&BuilderPlugin> {
        self.plugins.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }
}
