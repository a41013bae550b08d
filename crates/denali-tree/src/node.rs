//! Tree node descriptions.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::TreeError;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identity of a node, used to build each node once per build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    fn next() -> Self {
        Self(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}", self.0)
    }
}

/// A custom build step.
///
/// The engine hands a plugin the materialized directories of its inputs and
/// an output directory it owns.
pub trait Plugin: Send {
    /// Produce the node's output.
    ///
    /// # Errors
    /// Returns an error if the output cannot be produced; the build stops.
    fn build(&mut self, ctx: &PluginContext<'_>) -> Result<(), TreeError>;

    /// When true the output directory survives between builds instead of
    /// being wiped before each `build` call.
    fn persistent_output(&self) -> bool {
        false
    }
}

/// Paths handed to a [`Plugin`] for one build.
#[derive(Debug)]
pub struct PluginContext<'a> {
    pub inputs: &'a [PathBuf],
    pub output: &'a Path,
    pub annotation: &'a str,
}

impl PluginContext<'_> {
    /// The materialized directory of the input at `index`.
    ///
    /// # Errors
    /// Returns an error if the node was declared with fewer inputs.
    pub fn input(&self, index: usize) -> Result<&Path, TreeError> {
        self.inputs.get(index).map(PathBuf::as_path).ok_or_else(|| {
            TreeError::plugin(self.annotation, format!("missing input #{index}"))
        })
    }
}

/// Selection and re-rooting of files from an input tree.
///
/// Patterns are globs over `/`-separated paths relative to `src_dir`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunnelOptions {
    pub src_dir: Option<PathBuf>,
    pub dest_dir: Option<PathBuf>,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    /// Exact relative paths to keep. Empty means no restriction.
    pub files: Vec<String>,
}

impl FunnelOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn src_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.src_dir = Some(dir.into());
        self
    }

    pub fn dest_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dest_dir = Some(dir.into());
        self
    }

    pub fn include<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include.extend(patterns.into_iter().map(Into::into));
        self
    }

    pub fn exclude<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude.extend(patterns.into_iter().map(Into::into));
        self
    }

    pub fn files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.files.extend(files.into_iter().map(Into::into));
        self
    }
}

/// Turn top-level directory names into patterns matching everything below them.
pub fn globify<S: AsRef<str>>(dirs: &[S]) -> Vec<String> {
    dirs.iter().map(|d| format!("{}/**", d.as_ref())).collect()
}

/// What a node does.
pub enum NodeKind {
    /// A directory on disk, read in place.
    Source { path: PathBuf },
    /// A filtered, re-rooted view of another tree.
    Funnel { input: Tree, options: FunnelOptions },
    /// Inputs overlaid in order.
    Merge { inputs: Vec<Tree>, overwrite: bool },
    /// A single generated file.
    WriteFile { path: PathBuf, content: Vec<u8> },
    /// A custom step.
    Plugin {
        inputs: Vec<Tree>,
        plugin: Mutex<Box<dyn Plugin>>,
    },
}

impl NodeKind {
    fn label(&self) -> &'static str {
        match self {
            Self::Source { .. } => "source",
            Self::Funnel { .. } => "funnel",
            Self::Merge { .. } => "merge",
            Self::WriteFile { .. } => "write-file",
            Self::Plugin { .. } => "plugin",
        }
    }
}

struct TreeNode {
    id: NodeId,
    annotation: String,
    kind: NodeKind,
}

/// An immutable, cheaply cloned node description.
///
/// Clones share identity: a tree referenced from several places in a graph is
/// still built once.
#[derive(Clone)]
pub struct Tree(Arc<TreeNode>);

impl Tree {
    fn new(kind: NodeKind, annotation: String) -> Self {
        Self(Arc::new(TreeNode {
            id: NodeId::next(),
            annotation,
            kind,
        }))
    }

    /// A directory on disk.
    pub fn source(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let annotation = path.display().to_string();
        Self::new(NodeKind::Source { path }, annotation)
    }

    /// Select files from `input`.
    pub fn funnel(input: &Tree, options: FunnelOptions) -> Self {
        Self::new(
            NodeKind::Funnel {
                input: input.clone(),
                options,
            },
            "funnel".to_owned(),
        )
    }

    /// Overlay `inputs` in order; later inputs win on conflicting paths.
    pub fn merge(inputs: Vec<Tree>) -> Self {
        Self::new(
            NodeKind::Merge {
                inputs,
                overwrite: true,
            },
            "merge".to_owned(),
        )
    }

    /// Overlay `inputs`, failing the build if two inputs write the same path.
    pub fn merge_strict(inputs: Vec<Tree>) -> Self {
        Self::new(
            NodeKind::Merge {
                inputs,
                overwrite: false,
            },
            "merge".to_owned(),
        )
    }

    /// A single file with fixed content.
    pub fn write_file(path: impl Into<PathBuf>, content: impl Into<Vec<u8>>) -> Self {
        let path = path.into();
        let annotation = format!("write {}", path.display());
        Self::new(
            NodeKind::WriteFile {
                path,
                content: content.into(),
            },
            annotation,
        )
    }

    /// A custom step over `inputs`.
    pub fn plugin(inputs: Vec<Tree>, plugin: impl Plugin + 'static) -> Self {
        Self::new(
            NodeKind::Plugin {
                inputs,
                plugin: Mutex::new(Box::new(plugin)),
            },
            "plugin".to_owned(),
        )
    }

    /// Replace the annotation shown in build diagnostics.
    ///
    /// Only takes effect on a tree that has not been cloned yet.
    #[must_use]
    pub fn annotated(mut self, annotation: impl Into<String>) -> Self {
        if let Some(node) = Arc::get_mut(&mut self.0) {
            node.annotation = annotation.into();
        }
        self
    }

    pub fn id(&self) -> NodeId {
        self.0.id
    }

    pub fn annotation(&self) -> &str {
        &self.0.annotation
    }

    pub fn kind(&self) -> &NodeKind {
        &self.0.kind
    }

    /// The on-disk directory, for source nodes.
    pub fn source_path(&self) -> Option<&Path> {
        match &self.0.kind {
            NodeKind::Source { path } => Some(path),
            _ => None,
        }
    }

    /// Direct inputs of this node, in declaration order.
    pub fn inputs(&self) -> Vec<&Tree> {
        match &self.0.kind {
            NodeKind::Source { .. } | NodeKind::WriteFile { .. } => Vec::new(),
            NodeKind::Funnel { input, .. } => vec![input],
            NodeKind::Merge { inputs, .. } | NodeKind::Plugin { inputs, .. } => {
                inputs.iter().collect()
            }
        }
    }

    /// Whether both handles refer to the same node.
    pub fn ptr_eq(&self, other: &Tree) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Every source directory reachable from this tree, sorted and deduplicated.
    pub fn source_dirs(&self) -> Vec<PathBuf> {
        let mut seen = std::collections::HashSet::new();
        let mut dirs = Vec::new();
        let mut stack = vec![self];
        while let Some(tree) = stack.pop() {
            if !seen.insert(tree.id()) {
                continue;
            }
            if let Some(path) = tree.source_path() {
                dirs.push(path.to_path_buf());
            }
            stack.extend(tree.inputs());
        }
        dirs.sort();
        dirs.dedup();
        dirs
    }
}

impl fmt::Debug for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tree")
            .field("id", &self.0.id)
            .field("kind", &self.0.kind.label())
            .field("annotation", &self.0.annotation)
            .finish()
    }
}
