//! Materialize a tree description into directories on disk.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use denali_util::fs::{ensure_dir, materialize, relative_files, remove_dir_all_if_exists, slash_path};

use crate::error::TreeError;
use crate::node::{FunnelOptions, NodeId, NodeKind, PluginContext, Tree};

/// The engine interface the orchestrator drives.
pub trait TreeEngine {
    /// Build the root tree, returning the materialized output directory.
    ///
    /// # Errors
    /// Returns the first node failure.
    fn build(&mut self) -> Result<BuildResults, TreeError>;

    /// Release temporary resources. Safe to call more than once.
    ///
    /// # Errors
    /// Returns an error if temporary files cannot be removed.
    fn cleanup(&mut self) -> Result<(), TreeError>;

    /// Source directories the root tree reads from.
    fn watched_dirs(&self) -> Vec<PathBuf>;
}

/// Output of one successful build.
#[derive(Debug, Clone)]
pub struct BuildResults {
    /// Materialized output of the root node. Valid until the next build or cleanup.
    pub directory: PathBuf,
    pub graph: BuildGraph,
}

/// Per-node timings recorded during a build.
#[derive(Debug, Clone, Default)]
pub struct BuildGraph {
    pub nodes: Vec<NodeTiming>,
    pub total: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeTiming {
    pub id: NodeId,
    pub label: String,
    /// Time spent in this node, excluding its inputs.
    pub self_time: Duration,
}

/// Shared ownership of the engine's temp directory, so it can be released
/// from an interrupt handler on another thread.
#[derive(Debug, Clone, Default)]
pub struct CleanupHandle(Arc<Mutex<Option<tempfile::TempDir>>>);

impl CleanupHandle {
    /// Remove the temp directory if it still exists.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be removed.
    pub fn release(&self) -> Result<(), TreeError> {
        let taken = self.0.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(dir) = taken {
            let path = dir.path().to_path_buf();
            dir.close().map_err(|source| TreeError::io(&path, source))?;
            tracing::debug!(path = %path.display(), "released build temp directory");
        }
        Ok(())
    }

    fn root(&self) -> Result<PathBuf, TreeError> {
        let mut guard = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(dir) = guard.as_ref() {
            return Ok(dir.path().to_path_buf());
        }
        let dir = tempfile::Builder::new()
            .prefix("denali-build-")
            .tempdir()
            .map_err(|source| TreeError::io(&std::env::temp_dir(), source))?;
        let path = dir.path().to_path_buf();
        *guard = Some(dir);
        Ok(path)
    }
}

/// Builds trees into a private temp directory, one subdirectory per node.
#[derive(Debug)]
pub struct LocalEngine {
    root: Tree,
    tmp: CleanupHandle,
}

impl LocalEngine {
    pub fn new(root: Tree) -> Self {
        Self {
            root,
            tmp: CleanupHandle::default(),
        }
    }

    /// Build into the temp directory owned by `handle`, so a caller holding
    /// a clone can release it.
    pub fn with_cleanup_handle(root: Tree, handle: CleanupHandle) -> Self {
        Self { root, tmp: handle }
    }

    pub fn cleanup_handle(&self) -> CleanupHandle {
        self.tmp.clone()
    }

    pub fn root(&self) -> &Tree {
        &self.root
    }
}

impl TreeEngine for LocalEngine {
    fn build(&mut self) -> Result<BuildResults, TreeError> {
        let start = Instant::now();
        let tmp_root = self.tmp.root()?;
        let mut state = BuildState {
            tmp_root: &tmp_root,
            outputs: HashMap::new(),
            graph: BuildGraph::default(),
        };
        let directory = state.build_node(&self.root)?;
        let mut graph = state.graph;
        graph.total = start.elapsed();
        Ok(BuildResults { directory, graph })
    }

    fn cleanup(&mut self) -> Result<(), TreeError> {
        self.tmp.release()
    }

    fn watched_dirs(&self) -> Vec<PathBuf> {
        self.root.source_dirs()
    }
}

struct BuildState<'a> {
    tmp_root: &'a Path,
    outputs: HashMap<NodeId, PathBuf>,
    graph: BuildGraph,
}

impl BuildState<'_> {
    fn build_node(&mut self, node: &Tree) -> Result<PathBuf, TreeError> {
        if let Some(dir) = self.outputs.get(&node.id()) {
            return Ok(dir.clone());
        }

        let input_dirs = node
            .inputs()
            .into_iter()
            .map(|input| self.build_node(input))
            .collect::<Result<Vec<_>, _>>()?;

        let start = Instant::now();
        let output = match node.kind() {
            NodeKind::Source { path } => {
                if !path.is_dir() {
                    return Err(TreeError::MissingSource {
                        path: path.display().to_string(),
                    });
                }
                path.clone()
            }
            NodeKind::Funnel { options, .. } => {
                let out = self.fresh_dir(node)?;
                if let Some(input) = input_dirs.first() {
                    funnel_into(input, options, &out)?;
                }
                out
            }
            NodeKind::Merge { overwrite, .. } => {
                let out = self.fresh_dir(node)?;
                merge_into(&input_dirs, *overwrite, &out)?;
                out
            }
            NodeKind::WriteFile { path, content } => {
                let out = self.fresh_dir(node)?;
                let dest = out.join(path);
                if let Some(parent) = dest.parent() {
                    ensure_dir(parent)?;
                }
                std::fs::write(&dest, content).map_err(|source| TreeError::io(&dest, source))?;
                out
            }
            NodeKind::Plugin { plugin, .. } => {
                let mut plugin = plugin.lock().unwrap_or_else(PoisonError::into_inner);
                let out = self.node_dir(node);
                if plugin.persistent_output() {
                    ensure_dir(&out)?;
                } else {
                    remove_dir_all_if_exists(&out)?;
                    ensure_dir(&out)?;
                }
                let ctx = PluginContext {
                    inputs: &input_dirs,
                    output: &out,
                    annotation: node.annotation(),
                };
                plugin.build(&ctx)?;
                out
            }
        };

        self.graph.nodes.push(NodeTiming {
            id: node.id(),
            label: node.annotation().to_owned(),
            self_time: start.elapsed(),
        });
        self.outputs.insert(node.id(), output.clone());
        Ok(output)
    }

    fn node_dir(&self, node: &Tree) -> PathBuf {
        let slug: String = node
            .annotation()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
            .take(40)
            .collect();
        self.tmp_root.join(format!("{}-{slug}", node.id()))
    }

    fn fresh_dir(&self, node: &Tree) -> Result<PathBuf, TreeError> {
        let dir = self.node_dir(node);
        remove_dir_all_if_exists(&dir)?;
        ensure_dir(&dir)?;
        Ok(dir)
    }
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<glob::Pattern>, TreeError> {
    patterns
        .iter()
        .map(|p| {
            glob::Pattern::new(p).map_err(|e| TreeError::Pattern {
                pattern: p.clone(),
                message: e.to_string(),
            })
        })
        .collect()
}

fn funnel_into(input: &Path, options: &FunnelOptions, out: &Path) -> Result<(), TreeError> {
    let root = match &options.src_dir {
        Some(src) => input.join(src),
        None => input.to_path_buf(),
    };
    let include = compile_patterns(&options.include)?;
    let exclude = compile_patterns(&options.exclude)?;
    let dest_root = match &options.dest_dir {
        Some(dest) => out.join(dest),
        None => out.to_path_buf(),
    };

    for relative in relative_files(&root)? {
        let rel = slash_path(&relative);
        if !options.files.is_empty() && !options.files.iter().any(|f| *f == rel) {
            continue;
        }
        if !include.is_empty() && !include.iter().any(|p| p.matches(&rel)) {
            continue;
        }
        if exclude.iter().any(|p| p.matches(&rel)) {
            continue;
        }
        materialize(&root.join(&relative), &dest_root.join(&relative))?;
    }
    Ok(())
}

fn merge_into(inputs: &[PathBuf], overwrite: bool, out: &Path) -> Result<(), TreeError> {
    let mut written = BTreeSet::new();
    for input in inputs {
        for relative in relative_files(input)? {
            if !written.insert(relative.clone()) && !overwrite {
                return Err(TreeError::MergeConflict {
                    path: slash_path(&relative),
                });
            }
            materialize(&input.join(&relative), &out.join(&relative))?;
        }
    }
    Ok(())
}
