use std::path::Path;

use denali_config::{BuildConfig, PackageManifest};

use crate::error::EngineError;
use crate::hooks::BuilderRegistry;

/// How a package is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuilderKind {
    /// An application: bundles itself and its direct addons' fragments.
    App,
    /// An addon: produces a fragment, or reuses a precompiled `dist/`.
    Addon,
    /// An addon's test app under `test/dummy`.
    Dummy,
    /// A package with registered hooks, laid out like `base`.
    Custom { name: String, base: Box<BuilderKind> },
}

impl BuilderKind {
    /// Pick the variant for a package.
    ///
    /// A builder named in `denali-build.toml`, or registered under the
    /// package's own name, wins; otherwise a `dummy` directory is a dummy
    /// app, a package with the addon keyword is an addon, and anything else
    /// is an app.
    ///
    /// # Errors
    /// Returns an error if `denali-build.toml` names an unregistered builder.
    pub fn resolve(
        dir: &Path,
        pkg: &PackageManifest,
        config: &BuildConfig,
        registry: &BuilderRegistry,
    ) -> Result<Self, EngineError> {
        let base = if dir.file_name().is_some_and(|n| n == "dummy") {
            Self::Dummy
        } else if pkg.is_addon() {
            Self::Addon
        } else {
            Self::App
        };

        if let Some(name) = &config.builder {
            if !registry.contains(name) {
                return Err(EngineError::UnknownBuilder {
                    name: name.clone(),
                    dir: dir.display().to_string(),
                });
            }
            return Ok(Self::Custom {
                name: name.clone(),
                base: Box::new(base),
            });
        }
        if registry.contains(&pkg.name) {
            return Ok(Self::Custom {
                name: pkg.name.clone(),
                base: Box::new(base),
            });
        }
        Ok(base)
    }

    /// The built-in variant that decides layout and bundling.
    pub fn layout(&self) -> &BuilderKind {
        match self {
            Self::Custom { base, .. } => base.layout(),
            other => other,
        }
    }

    /// Name of the registered plugin supplying hooks, if any.
    pub fn plugin_name(&self) -> Option<&str> {
        match self {
            Self::Custom { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn is_addon(&self) -> bool {
        matches!(self.layout(), Self::Addon)
    }

    pub fn is_dummy(&self) -> bool {
        matches!(self.layout(), Self::Dummy)
    }
}
