//! Parse `package.json`, `denali-build.toml`, and build environment settings.

pub mod build_config;
pub mod environment;
pub mod manifest;

pub use build_config::BuildConfig;
pub use environment::Environment;
pub use manifest::PackageManifest;
