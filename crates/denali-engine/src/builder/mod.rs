//! Per-package builds and the session cache that deduplicates them.
//!
//! Every package in the addon graph gets exactly one [`Builder`], keyed by
//! its real directory in a [`BuilderCache`]. Builders are stored in the cache
//! and refer to each other by [`BuilderId`], so cyclic addon graphs need no
//! shared ownership.

mod addon;
mod app;
mod cache;
mod dummy;
mod kind;
mod pipeline;

use std::fmt;
use std::path::{Path, PathBuf};

use denali_config::{BuildConfig, PackageManifest};
use denali_tree::Tree;
use denali_util::fs::is_symlink;

pub use cache::BuilderCache;
pub use kind::BuilderKind;

use crate::audit::IgnorePattern;
use crate::discover::AddonSummary;
use crate::hooks::BuilderPlugin;

/// Index of a builder within its [`BuilderCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BuilderId(usize);

impl BuilderId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for BuilderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The build of one package: an app, an addon, a dummy app, or a package with
/// custom hooks.
#[derive(Debug)]
pub struct Builder {
    dir: PathBuf,
    real_dir: PathBuf,
    pkg: PackageManifest,
    config: BuildConfig,
    kind: BuilderKind,
    parent: Option<BuilderId>,
    addons: Vec<AddonSummary>,
    child_builders: Option<Vec<BuilderId>>,
    ignore_vulnerabilities: Vec<Vec<IgnorePattern>>,
    under_test: bool,
    addon_under_test: Option<BuilderId>,
    plugin: Option<BuilderPlugin>,
    tree: Option<Tree>,
    assembling: bool,
}

impl Builder {
    /// Package directory as discovered; may be a symlink.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Canonical package directory; the cache key.
    pub fn real_dir(&self) -> &Path {
        &self.real_dir
    }

    pub fn pkg(&self) -> &PackageManifest {
        &self.pkg
    }

    pub fn name(&self) -> &str {
        &self.pkg.name
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn kind(&self) -> &BuilderKind {
        &self.kind
    }

    pub fn parent(&self) -> Option<BuilderId> {
        self.parent
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Child addons, sorted by name.
    pub fn addons(&self) -> &[AddonSummary] {
        &self.addons
    }

    /// Builders for [`Builder::addons`]; empty until the tree is assembled.
    pub fn child_builders(&self) -> &[BuilderId] {
        self.child_builders.as_deref().unwrap_or_default()
    }

    pub fn ignore_vulnerabilities(&self) -> &[Vec<IgnorePattern>] {
        &self.ignore_vulnerabilities
    }

    pub fn is_developing_addon(&self) -> bool {
        self.config.developing
    }

    /// Whether this addon is the one a dummy app is testing.
    pub fn under_test(&self) -> bool {
        self.under_test
    }

    /// The assembled tree, once [`BuilderCache::tree_for`] has run.
    pub fn tree(&self) -> Option<&Tree> {
        self.tree.as_ref()
    }

    /// Base name for bundle files: `@scope/name` becomes `scope-name`.
    pub fn file_stem(&self) -> String {
        file_stem(&self.pkg.name)
    }

    /// Whether the package must be built from source rather than reusing
    /// its `dist/`.
    pub fn needs_compilation(&self) -> bool {
        self.is_root()
            || self.is_developing_addon()
            || self.under_test
            || is_symlink(&self.dir)
            || !self.dir.join("dist").exists()
    }

    /// Whether this addon's finished tree is written back to its own `dist/`.
    pub fn should_eject(&self) -> bool {
        self.kind.is_addon() && !self.is_root() && !self.under_test && self.needs_compilation()
    }
}

pub(crate) fn file_stem(name: &str) -> String {
    name.trim_start_matches('@').replace('/', "-")
}
