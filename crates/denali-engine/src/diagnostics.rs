//! Human-readable build reports.

use std::error::Error;

use denali_tree::{BuildGraph, TreeError};

use crate::error::EngineError;

/// Number of nodes listed by [`slow_trees`].
pub const SLOW_TREE_LIMIT: usize = 10;

/// The slowest nodes of a build by self time, with their share of the total.
pub fn slow_trees(graph: &BuildGraph, limit: usize) -> String {
    let mut nodes: Vec<_> = graph.nodes.iter().collect();
    nodes.sort_by(|a, b| b.self_time.cmp(&a.self_time).then_with(|| a.label.cmp(&b.label)));

    let total = graph.total.as_secs_f64();
    let mut out = String::new();
    out.push_str(&format!("{:<50} {:>10} {:>7}\n", "Slowest Nodes", "Self Time", "%"));
    out.push_str(&"-".repeat(69));
    out.push('\n');
    for node in nodes.into_iter().take(limit) {
        let secs = node.self_time.as_secs_f64();
        let percent = if total > 0.0 { secs / total * 100.0 } else { 0.0 };
        out.push_str(&format!(
            "{:<50} {:>8.1}ms {:>6.1}%\n",
            truncate(&node.label, 50),
            secs * 1000.0,
            percent
        ));
    }
    out
}

fn truncate(label: &str, width: usize) -> String {
    if label.chars().count() <= width {
        return label.to_owned();
    }
    let kept: String = label.chars().take(width.saturating_sub(3)).collect();
    format!("{kept}...")
}

/// Describe a build failure for watch mode: the source location when known,
/// the message, and the chain of causes.
pub fn describe_build_error(error: &EngineError) -> String {
    let mut out = String::new();
    let tree_error: Option<&TreeError> = match error {
        EngineError::BuildFailed { source, .. } | EngineError::Tree(source) => Some(source),
        _ => None,
    };
    if let Some(location) = tree_error.and_then(TreeError::location) {
        out.push_str(&format!("File: {location}\n"));
    } else if let Some(file) = tree_error.and_then(TreeError::file) {
        out.push_str(&format!("File: {file}\n"));
    }
    out.push_str(&format!("Error: {error}\n"));

    let mut cause = error.source();
    if cause.is_some() {
        out.push_str("Stack trace:\n");
    }
    while let Some(err) = cause {
        for line in err.to_string().lines() {
            out.push_str(&format!("  {line}\n"));
        }
        cause = err.source();
    }
    out
}
