#![forbid(unsafe_code)]
//! Build orchestration for Denali apps and addons: addon discovery, per-package
//! builders and their hooks, bundling, ejection, watch mode, and audits.

pub mod audit;
pub mod builder;
pub mod diagnostics;
pub mod discover;
pub mod error;
pub mod hooks;
pub mod project;
pub mod trees;
pub mod watcher;

pub use audit::{IgnorePattern, RemoteScanner, ScanError, Vulnerability, VulnerabilityScanner};
pub use builder::{Builder, BuilderCache, BuilderId, BuilderKind};
pub use discover::{discover_addons, AddonSummary};
pub use error::EngineError;
pub use hooks::{BuilderPlugin, BuilderRegistry, HookContext, ParentProcessor, SelfProcessor};
pub use project::{Assembly, BuildOutcome, Project, ProjectOptions, WatchOptions};
pub use watcher::{PausingWatcher, Prebuild};
