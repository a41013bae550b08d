//! Write an intermediate build result out to a directory on disk.
//!
//! The engine gives every node a single private output directory. Ejecting
//! lets an addon compiled on the fly land in its own `dist/`, exactly where a
//! precompiled addon would be, so later builds can reuse it.

use std::path::PathBuf;

use denali_tree::{Plugin, PluginContext, Tree, TreeError};
use denali_util::fs::{copy_dereference, is_symlink, remove_dir_all_if_exists, symlink_or_copy};
use denali_util::hash::sha256_dir;

#[derive(Debug)]
pub struct EjectNode {
    destination: PathBuf,
    /// Also pass the input through as this node's output.
    tee: bool,
    /// Fingerprint of the input last written to `destination`.
    ejected: Option<String>,
}

impl EjectNode {
    pub fn new(destination: impl Into<PathBuf>, tee: bool) -> Self {
        Self {
            destination: destination.into(),
            tee,
            ejected: None,
        }
    }

    /// Eject `input` to `destination`. With `tee` the node's output mirrors
    /// its input; without it the output is empty.
    pub fn tree(input: &Tree, destination: impl Into<PathBuf>, tee: bool) -> Tree {
        let node = Self::new(destination, tee);
        let annotation = format!("eject to {}", node.destination.display());
        Tree::plugin(vec![input.clone()], node).annotated(annotation)
    }
}

impl Plugin for EjectNode {
    fn build(&mut self, ctx: &PluginContext<'_>) -> Result<(), TreeError> {
        let input = ctx.input(0)?;
        let fingerprint = sha256_dir(input, "**/*")?;
        if self.ejected.as_ref() == Some(&fingerprint) && self.destination.is_dir() {
            tracing::debug!(destination = %self.destination.display(), "ejection unchanged");
        } else {
            tracing::debug!(destination = %self.destination.display(), "ejecting build result");
            remove_dir_all_if_exists(&self.destination)?;
            copy_dereference(input, &self.destination)?;
            self.ejected = Some(fingerprint);
        }

        // The input directory keeps its path across rebuilds, so the link
        // only needs to be made once.
        if self.tee && !is_symlink(ctx.output) {
            remove_dir_all_if_exists(ctx.output)?;
            symlink_or_copy(input, ctx.output)?;
        }
        Ok(())
    }

    fn persistent_output(&self) -> bool {
        self.tee
    }
}
