use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use denali_config::{BuildConfig, Environment, PackageManifest};

use super::{Builder, BuilderId, BuilderKind};
use crate::audit::IgnorePattern;
use crate::discover::{discover_addons, real_path, AddonSummary};
use crate::error::EngineError;
use crate::hooks::BuilderRegistry;

/// All builders of one build session, keyed by real directory.
///
/// The first request for a directory creates its builder; every later
/// request, from any parent, gets the same one back.
#[derive(Debug)]
pub struct BuilderCache {
    builders: Vec<Builder>,
    index: HashMap<PathBuf, BuilderId>,
    project_dir: PathBuf,
    environment: Environment,
    lint: bool,
    registry: Arc<BuilderRegistry>,
}

impl BuilderCache {
    pub fn new(
        project_dir: impl Into<PathBuf>,
        environment: Environment,
        lint: bool,
        registry: Arc<BuilderRegistry>,
    ) -> Self {
        Self {
            builders: Vec::new(),
            index: HashMap::new(),
            project_dir: project_dir.into(),
            environment,
            lint,
            registry,
        }
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn lint(&self) -> bool {
        self.lint
    }

    pub fn registry(&self) -> &BuilderRegistry {
        &self.registry
    }

    /// Return the builder for `dir`, creating it on first request.
    ///
    /// `preseeded` directories are added to the new builder's child addons
    /// whether or not they are declared dependencies. On a cache hit both
    /// `parent` and `preseeded` are ignored.
    ///
    /// # Errors
    /// Returns an error if the package cannot be loaded, names an unknown
    /// builder, or is a dummy app whose addon cannot be found.
    pub fn create_for(
        &mut self,
        dir: &Path,
        parent: Option<BuilderId>,
        preseeded: &[PathBuf],
    ) -> Result<BuilderId, EngineError> {
        self.insert(dir, None, parent, preseeded)
    }

    /// Return the builder for a discovered child addon.
    pub(crate) fn create_child(
        &mut self,
        summary: &AddonSummary,
        parent: BuilderId,
    ) -> Result<BuilderId, EngineError> {
        self.insert(&summary.dir, Some(&summary.pkg), Some(parent), &[])
    }

    fn insert(
        &mut self,
        dir: &Path,
        summary_pkg: Option<&PackageManifest>,
        parent: Option<BuilderId>,
        preseeded: &[PathBuf],
    ) -> Result<BuilderId, EngineError> {
        let real_dir = real_path(dir);
        if let Some(id) = self.index.get(&real_dir) {
            return Ok(*id);
        }

        // A `mainDir` may point below the directory holding package.json.
        let pkg = match summary_pkg {
            Some(pkg) if !dir.join("package.json").is_file() => pkg.clone(),
            _ => PackageManifest::from_dir(dir)?,
        };
        let config = BuildConfig::from_dir(dir)?;
        let kind = BuilderKind::resolve(dir, &pkg, &config, &self.registry)?;
        let plugin = kind
            .plugin_name()
            .and_then(|name| self.registry.get(name))
            .cloned();

        let mut preseeded = preseeded.to_vec();
        let addon_dir_under_test = if kind.is_dummy() {
            dir.parent().and_then(Path::parent).map(Path::to_path_buf)
        } else {
            None
        };
        if let Some(addon_dir) = &addon_dir_under_test {
            preseeded.push(addon_dir.clone());
        }

        let addons = discover_addons(dir, &pkg, parent.is_none(), &preseeded)?;
        let ignore_vulnerabilities = config
            .ignore_vulnerabilities
            .iter()
            .map(|pattern| IgnorePattern::parse_path(pattern))
            .collect::<Result<Vec<_>, _>>()?;

        let id = BuilderId(self.builders.len());
        tracing::debug!(
            builder = %id,
            package = %pkg.name,
            version = %pkg.version,
            kind = ?kind,
            dir = %display_relative(dir, &self.project_dir),
            "created builder"
        );
        self.builders.push(Builder {
            dir: dir.to_path_buf(),
            real_dir: real_dir.clone(),
            pkg,
            config,
            kind,
            parent,
            addons,
            child_builders: None,
            ignore_vulnerabilities,
            under_test: false,
            addon_under_test: None,
            plugin,
            tree: None,
            assembling: false,
        });
        self.index.insert(real_dir, id);

        if let Some(addon_dir) = addon_dir_under_test {
            self.flag_addon_under_test(id, &addon_dir)?;
        }
        Ok(id)
    }

    /// Find the dummy app's addon (two directories up) among its child
    /// addons and mark it as under test.
    fn flag_addon_under_test(&mut self, dummy: BuilderId, addon_dir: &Path) -> Result<(), EngineError> {
        let wanted = real_path(addon_dir);
        let summary = self
            .get(dummy)?
            .addons
            .iter()
            .find(|addon| real_path(&addon.dir) == wanted)
            .cloned()
            .ok_or_else(|| EngineError::AddonUnderTestMissing {
                dir: addon_dir.display().to_string(),
            })?;
        let addon = self.create_child(&summary, dummy)?;
        self.get_mut(addon)?.under_test = true;
        self.get_mut(dummy)?.addon_under_test = Some(addon);
        tracing::debug!(addon = %summary.pkg.name, "flagged addon under test");
        Ok(())
    }

    /// # Errors
    /// Returns an error if `id` was issued by a different cache.
    pub fn get(&self, id: BuilderId) -> Result<&Builder, EngineError> {
        self.builders
            .get(id.0)
            .ok_or(EngineError::UnknownBuilderId { id: id.0 })
    }

    pub(crate) fn get_mut(&mut self, id: BuilderId) -> Result<&mut Builder, EngineError> {
        self.builders
            .get_mut(id.0)
            .ok_or(EngineError::UnknownBuilderId { id: id.0 })
    }

    /// The builder already created for `dir`, if any.
    pub fn find(&self, dir: &Path) -> Option<BuilderId> {
        self.index.get(&real_path(dir)).copied()
    }

    pub fn len(&self) -> usize {
        self.builders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.builders.is_empty()
    }

    /// Builders in creation order.
    pub fn iter(&self) -> impl Iterator<Item = (BuilderId, &Builder)> {
        self.builders.iter().enumerate().map(|(i, b)| (BuilderId(i), b))
    }

    /// Builders for the child addons of `id`, created on first call.
    ///
    /// # Errors
    /// Returns an error if a child builder cannot be created.
    pub fn child_builders(&mut self, id: BuilderId) -> Result<Vec<BuilderId>, EngineError> {
        if let Some(children) = &self.get(id)?.child_builders {
            return Ok(children.clone());
        }
        let addons = self.get(id)?.addons.clone();
        let children = addons
            .iter()
            .map(|summary| self.create_child(summary, id))
            .collect::<Result<Vec<_>, _>>()?;
        self.get_mut(id)?.child_builders = Some(children.clone());
        Ok(children)
    }

    /// Package names from the root down to `id`.
    pub fn logical_dependency_path(&self, id: BuilderId) -> Vec<&str> {
        let mut path = Vec::new();
        let mut current = self.builders.get(id.0);
        while let Some(builder) = current {
            path.push(builder.name());
            current = builder.parent.and_then(|parent| self.builders.get(parent.0));
        }
        path.reverse();
        path
    }

    /// `my-app (including my-addon, other on the fly)`, naming the addons
    /// compiled from source during this build.
    pub fn build_description(&self, root: BuilderId) -> String {
        let name = self.builders.get(root.0).map_or("", Builder::name);
        let mut on_the_fly: Vec<&str> = Vec::new();
        for (id, builder) in self.iter() {
            if id != root && builder.should_eject() && !on_the_fly.contains(&builder.name()) {
                on_the_fly.push(builder.name());
            }
        }
        if on_the_fly.is_empty() {
            name.to_owned()
        } else {
            format!("{name} (including {} on the fly)", on_the_fly.join(", "))
        }
    }
}

fn display_relative(dir: &Path, base: &Path) -> String {
    match dir.strip_prefix(base) {
        Ok(relative) if relative.as_os_str().is_empty() => ".".to_owned(),
        Ok(relative) => format!("./{}", relative.display()),
        Err(_) => dir.display().to_string(),
    }
}
