#![forbid(unsafe_code)]
//! Tree descriptions and the local engine that materializes them.
//!
//! A [`Tree`] only describes work. Nothing touches the filesystem until a
//! [`TreeEngine`] builds it, so a package's whole pipeline can be assembled
//! up front and rebuilt repeatedly by the watcher.

pub mod engine;
pub mod error;
pub mod node;
pub mod watch;

pub use engine::{BuildGraph, BuildResults, CleanupHandle, LocalEngine, NodeTiming, TreeEngine};
pub use error::{ErrorLocation, TreeError};
pub use node::{globify, FunnelOptions, NodeId, NodeKind, Plugin, PluginContext, Tree};
pub use watch::{ChangeDetector, NotifyDetector};
