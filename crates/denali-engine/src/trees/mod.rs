//! Tree nodes specific to package builds.

pub mod concat;
pub mod eject;
pub mod package_files;
pub mod sourcemap;
pub mod templates;
pub mod unit_tests;

pub use concat::{ConcatBundler, ConcatOptions};
pub use eject::EjectNode;
pub use package_files::PackageFileCopier;
pub use unit_tests::UnitTestBundler;
