//! Error types for denali-engine.

use denali_tree::TreeError;

/// Errors produced by engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A utility operation failed.
    #[error("{0}")]
    Util(#[from] denali_util::error::UtilError),

    /// A package manifest could not be loaded.
    #[error("{0}")]
    Manifest(#[from] denali_config::manifest::ManifestError),

    /// A `denali-build.toml` could not be loaded.
    #[error("{0}")]
    BuildConfig(#[from] denali_config::build_config::BuildConfigError),

    /// The tree engine failed outside of a package build.
    #[error("{0}")]
    Tree(#[from] TreeError),

    /// Building a package's tree failed.
    #[error("{package} failed to build{location}")]
    BuildFailed {
        package: String,
        /// Either empty or ` (<file>)`.
        location: String,
        #[source]
        source: TreeError,
    },

    /// A dummy app could not find the addon two directories above it.
    #[error("unable to find the builder for the addon under test at {dir}")]
    AddonUnderTestMissing { dir: String },

    /// `denali-build.toml` names a builder nobody registered.
    #[error("{dir} asks for builder `{name}`, but no builder with that name is registered")]
    UnknownBuilder { name: String, dir: String },

    /// A package's tree was requested while it was still being assembled.
    #[error("{name} depends on its own build output")]
    BuilderCycle { name: String },

    /// A build hook rejected the tree it was given.
    #[error("{builder} build hook failed: {message}")]
    Hook { builder: String, message: String },

    /// An ignore pattern in `ignore_vulnerabilities` is malformed.
    #[error("invalid vulnerability ignore pattern `{pattern}`: {message}")]
    IgnorePattern { pattern: String, message: String },

    /// A builder id did not belong to this cache.
    #[error("no builder with id {id}")]
    UnknownBuilderId { id: usize },
}

impl EngineError {
    /// Wrap a tree failure as a package build failure, naming the file
    /// involved when the failure carries one.
    pub fn build_failed(package: &str, source: TreeError) -> Self {
        let location = source.file().map(|f| format!(" ({f})")).unwrap_or_default();
        Self::BuildFailed {
            package: package.to_owned(),
            location,
            source,
        }
    }

    /// A hook failure attributed to `builder`.
    pub fn hook(builder: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Hook {
            builder: builder.into(),
            message: message.into(),
        }
    }
}
