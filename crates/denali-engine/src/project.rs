//! The project being built: one-shot builds, watch mode, and audits.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use denali_config::{Environment, PackageManifest};
use denali_tree::{
    BuildGraph, BuildResults, ChangeDetector, CleanupHandle, LocalEngine, NotifyDetector, Tree, TreeEngine,
    TreeError,
};
use denali_util::fs::{copy_dereference, remove_dir_all_if_exists};

use crate::audit::{audit_package, IgnorePattern, RemoteScanner, Vulnerability, VulnerabilityScanner};
use crate::builder::{BuilderCache, BuilderId};
use crate::diagnostics::{describe_build_error, slow_trees, SLOW_TREE_LIMIT};
use crate::error::EngineError;
use crate::hooks::BuilderRegistry;
use crate::watcher::{PausingWatcher, Prebuild};

/// Where the dummy app of an addon lives, relative to the addon.
const DUMMY_DIR: &str = "test/dummy";

/// Options for a build session.
#[derive(Debug, Clone)]
pub struct ProjectOptions {
    pub dir: PathBuf,
    pub environment: Environment,
    /// Print the slowest nodes after each build.
    pub print_slow_trees: bool,
    /// Passed through to build hooks.
    pub lint: bool,
    /// Scan dependencies for vulnerabilities after each build.
    pub audit: bool,
    /// For an addon, build its dummy app instead of the addon itself.
    pub build_dummy: bool,
}

impl ProjectOptions {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            environment: Environment::Development,
            print_slow_trees: false,
            lint: false,
            audit: false,
            build_dummy: false,
        }
    }
}

/// The assembled tree of a project, with the builders that produced it.
#[derive(Debug)]
pub struct Assembly {
    pub cache: BuilderCache,
    pub root: BuilderId,
    pub tree: Tree,
}

/// Result of a successful one-shot build.
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub output_dir: PathBuf,
    pub elapsed: Duration,
    pub graph: BuildGraph,
}

/// Settings for [`Project::watch`].
pub struct WatchOptions {
    pub output_dir: PathBuf,
    /// How long to sleep between checks for changes.
    pub interval: Duration,
    /// Runs when changes are first seen; the rebuild waits for it to resolve.
    pub before_rebuild: Box<dyn FnMut() -> Prebuild>,
    /// Runs after every successful build, with the output directory.
    pub on_build: Box<dyn FnMut(&Path)>,
    /// Set to end the watch loop.
    pub stop: Arc<AtomicBool>,
}

impl WatchOptions {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            interval: Duration::from_millis(100),
            before_rebuild: Box::new(|| Prebuild::Ready),
            on_build: Box::new(|_: &Path| {}),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// A package being built, plus everything one build session needs.
pub struct Project {
    options: ProjectOptions,
    pkg: PackageManifest,
    registry: Arc<BuilderRegistry>,
    scanner: Box<dyn VulnerabilityScanner>,
    cleanup: CleanupHandle,
}

impl Project {
    /// Load the project at `options.dir`.
    ///
    /// # Errors
    /// Returns an error if `package.json` cannot be loaded.
    pub fn new(options: ProjectOptions) -> Result<Self, EngineError> {
        let pkg = PackageManifest::from_dir(&options.dir)?;
        Ok(Self {
            options,
            pkg,
            registry: Arc::new(BuilderRegistry::new()),
            scanner: Box::new(RemoteScanner::default()),
            cleanup: CleanupHandle::default(),
        })
    }

    /// Use `registry` to resolve custom builders.
    pub fn with_registry(mut self, registry: BuilderRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    pub fn with_scanner(mut self, scanner: impl VulnerabilityScanner + 'static) -> Self {
        self.scanner = Box::new(scanner);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.options.dir
    }

    pub fn pkg(&self) -> &PackageManifest {
        &self.pkg
    }

    pub fn options(&self) -> &ProjectOptions {
        &self.options
    }

    pub fn is_addon(&self) -> bool {
        self.pkg.is_addon()
    }

    /// A handle that releases the engine's temp directory, for interrupt
    /// handlers.
    pub fn cleanup_handle(&self) -> CleanupHandle {
        self.cleanup.clone()
    }

    /// Discover every builder and assemble the root tree.
    ///
    /// # Errors
    /// Returns an error if a package cannot be loaded or a hook fails.
    pub fn assemble(&self) -> Result<Assembly, EngineError> {
        let (mut cache, root) = self.root_builder()?;
        let tree = cache.tree_for(root)?;
        tracing::debug!(builders = cache.len(), "assembled project tree");
        Ok(Assembly { cache, root, tree })
    }

    /// The directory of the package whose builder roots the build: the dummy
    /// app when building an addon's dummy, otherwise the project itself.
    pub fn root_dir(&self) -> PathBuf {
        if self.options.build_dummy && self.is_addon() {
            self.options.dir.join(DUMMY_DIR)
        } else {
            self.options.dir.clone()
        }
    }

    fn root_builder(&self) -> Result<(BuilderCache, BuilderId), EngineError> {
        let mut cache = BuilderCache::new(
            &self.options.dir,
            self.options.environment,
            self.options.lint,
            Arc::clone(&self.registry),
        );
        let root = cache.create_for(&self.root_dir(), None, &[])?;
        Ok((cache, root))
    }

    /// Build once into `output_dir`, relative to the project directory.
    ///
    /// # Errors
    /// Returns an error if assembly or the build fails. Build failures name
    /// the package and, when known, the file involved.
    pub fn build(&self, output_dir: &Path) -> Result<BuildOutcome, EngineError> {
        let started = Instant::now();
        let Assembly { cache, root, tree } = self.assemble()?;
        let name = cache.get(root)?.name().to_owned();
        let ignored = cache.get(root)?.ignore_vulnerabilities().to_vec();
        let output_dir = self.options.dir.join(output_dir);

        eprintln!("    Building {}", cache.build_description(root));
        let mut engine = LocalEngine::with_cleanup_handle(tree, self.cleanup.clone());
        let result = engine
            .build()
            .map_err(|e| EngineError::build_failed(&name, e))
            .and_then(|results| {
                self.finish_build(&results, &output_dir, &ignored)?;
                Ok(results.graph)
            });
        let cleaned = engine.cleanup();
        let graph = result?;
        cleaned?;

        let elapsed = started.elapsed();
        eprintln!("    Finished {name} in {:.2}s", elapsed.as_secs_f64());
        Ok(BuildOutcome {
            output_dir,
            elapsed,
            graph,
        })
    }

    /// Build, then rebuild whenever sources change until `options.stop` is
    /// set. Build failures are reported and watching continues.
    ///
    /// # Errors
    /// Returns an error if the project cannot be assembled or its sources
    /// cannot be watched.
    pub fn watch(&self, options: WatchOptions) -> Result<(), EngineError> {
        self.watch_with(options, NotifyDetector::new)
    }

    /// [`Project::watch`] with changes reported by the detector that
    /// `make_detector` creates for the build's source directories.
    ///
    /// # Errors
    /// Returns an error if the project cannot be assembled or the detector
    /// cannot be created.
    pub fn watch_with<D, F>(&self, options: WatchOptions, make_detector: F) -> Result<(), EngineError>
    where
        D: ChangeDetector,
        F: FnOnce(Vec<PathBuf>) -> Result<D, TreeError>,
    {
        let WatchOptions {
            output_dir,
            interval,
            before_rebuild,
            mut on_build,
            stop,
        } = options;
        let Assembly { cache, root, tree } = self.assemble()?;
        let name = cache.get(root)?.name().to_owned();
        let ignored = cache.get(root)?.ignore_vulnerabilities().to_vec();
        let description = cache.build_description(root);
        let output_dir = self.options.dir.join(output_dir);

        let mut engine = LocalEngine::with_cleanup_handle(tree, self.cleanup.clone());
        let detector = make_detector(engine.watched_dirs())?;
        let mut watcher = PausingWatcher::new(detector, before_rebuild);

        let mut rebuild = |engine: &mut LocalEngine| {
            eprintln!("    Building {description}");
            let started = Instant::now();
            let result = engine
                .build()
                .map_err(|e| EngineError::build_failed(&name, e))
                .and_then(|results| self.finish_build(&results, &output_dir, &ignored));
            match result {
                Ok(()) => {
                    eprintln!("    Finished {name} in {:.2}s", started.elapsed().as_secs_f64());
                    on_build(&output_dir);
                }
                Err(e) => {
                    eprintln!("error: build failed");
                    eprint!("{}", describe_build_error(&e));
                }
            }
        };

        rebuild(&mut engine);
        while !stop.load(Ordering::SeqCst) {
            std::thread::sleep(interval);
            match watcher.poll() {
                Ok(Some(changed)) => {
                    tracing::info!(dirs = changed.len(), "sources changed, rebuilding");
                    rebuild(&mut engine);
                }
                Ok(None) => {}
                Err(e) => eprintln!("warning: cannot check for changes: {e}"),
            }
        }
        engine.cleanup()?;
        Ok(())
    }

    /// Scan this package's dependencies and print any findings that the
    /// root builder's `ignore_vulnerabilities` does not cover. Scanner
    /// failures are printed as warnings.
    ///
    /// # Errors
    /// Returns an error if the root builder cannot be loaded, including a
    /// malformed ignore pattern.
    pub fn audit_package(&self) -> Result<Vec<Vulnerability>, EngineError> {
        let (cache, root) = self.root_builder()?;
        Ok(self.scan(cache.get(root)?.ignore_vulnerabilities()))
    }

    fn scan(&self, ignored: &[Vec<IgnorePattern>]) -> Vec<Vulnerability> {
        audit_package(self.scanner.as_ref(), &self.options.dir.join("package.json"), ignored)
    }

    fn finish_build(
        &self,
        results: &BuildResults,
        output_dir: &Path,
        ignored: &[Vec<IgnorePattern>],
    ) -> Result<(), EngineError> {
        remove_dir_all_if_exists(output_dir)?;
        copy_dereference(&results.directory, output_dir)?;
        if self.options.print_slow_trees {
            eprint!("{}", slow_trees(&results.graph, SLOW_TREE_LIMIT));
        }
        if self.options.audit {
            self.scan(ignored);
        }
        Ok(())
    }
}

impl std::fmt::Debug for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Project")
            .field("options", &self.options)
            .field("name", &self.pkg.name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::VecDeque;
    use std::fs;
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::audit::ScanError;
    use crate::hooks::BuilderPlugin;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    /// `my-app` depending on an uncompiled `my-addon`.
    fn app_with_addon(root: &Path) -> PathBuf {
        let app = root.join("my-app");
        write(
            &app.join("package.json"),
            r#"{ "name": "my-app", "version": "1.0.0", "dependencies": { "my-addon": "^0.1.0" } }"#,
        );
        write(&app.join("app/index.js"), "exports.app = true;\n");
        let addon = app.join("node_modules/my-addon");
        write(
            &addon.join("package.json"),
            r#"{ "name": "my-addon", "version": "0.1.0", "keywords": ["denali-addon"] }"#,
        );
        write(&addon.join("app/service.js"), "exports.service = true;\n");
        app
    }

    #[test]
    fn builds_app_and_ejects_addon() {
        let tmp = tempfile::tempdir().unwrap();
        let app = app_with_addon(tmp.path());
        let project = Project::new(ProjectOptions::new(&app)).unwrap();
        let outcome = project.build(Path::new("dist")).unwrap();

        let bundle = fs::read_to_string(app.join("dist/my-app.bundle.js")).unwrap();
        assert!(bundle.contains("exports.app = true;"));
        assert!(bundle.contains("exports.service = true;"));
        assert!(app.join("dist/my-app.bundle.map").is_file());
        assert!(app.join("dist/package.json").is_file());
        assert!(app.join("node_modules/my-addon/dist/my-addon.fragment.js").is_file());
        assert_eq!(outcome.output_dir, app.join("dist"));
        assert!(!outcome.graph.nodes.is_empty());
    }

    #[test]
    fn second_build_reuses_ejected_addon() {
        let tmp = tempfile::tempdir().unwrap();
        let app = app_with_addon(tmp.path());
        let project = Project::new(ProjectOptions::new(&app)).unwrap();
        project.build(Path::new("dist")).unwrap();

        let assembly = project.assemble().unwrap();
        let addon = assembly.cache.find(&app.join("node_modules/my-addon")).unwrap();
        assert!(!assembly.cache.get(addon).unwrap().needs_compilation());
        assert_eq!(assembly.cache.build_description(assembly.root), "my-app");

        project.build(Path::new("dist")).unwrap();
        let bundle = fs::read_to_string(app.join("dist/my-app.bundle.js")).unwrap();
        assert!(bundle.contains("exports.service = true;"));
    }

    #[test]
    fn dummy_app_includes_addon_tests() {
        let tmp = tempfile::tempdir().unwrap();
        let addon = tmp.path().join("my-addon");
        write(
            &addon.join("package.json"),
            r#"{ "name": "my-addon", "version": "0.1.0", "keywords": ["denali-addon"] }"#,
        );
        write(&addon.join("app/service.js"), "exports.service = true;\n");
        write(&addon.join("test/unit/service-test.js"), "require('my-addon');\n");
        write(&addon.join("test/dummy/package.json"), r#"{ "name": "dummy", "version": "0.0.0" }"#);
        write(&addon.join("test/dummy/app/index.js"), "exports.dummy = true;\n");

        let mut options = ProjectOptions::new(&addon);
        options.environment = Environment::Test;
        options.build_dummy = true;
        let project = Project::new(options).unwrap();
        assert!(project.is_addon());
        project.build(Path::new("tmp/test")).unwrap();

        let out = addon.join("tmp/test");
        assert!(out.join("dummy.bundle.js").is_file());
        assert!(out.join("node_modules/my-addon/my-addon.fragment.js").is_file());
        assert!(!out.join("node_modules/my-addon/test").exists());
        assert!(!out.join("test/dummy").exists());
        let test = fs::read_to_string(out.join("test/unit/service-test.js")).unwrap();
        assert!(test.contains("require('my-addon');"));
        let loader = test
            .lines()
            .find_map(|line| line.strip_prefix("var loader = require(\"")?.strip_suffix("\");"))
            .unwrap();
        assert_eq!(loader, "../../dummy.bundle.js");
        assert!(out.join("test/unit").join(loader).is_file());
        // The addon under test is never ejected.
        assert!(!addon.join("dist").exists());
    }

    #[test]
    fn dummy_app_installs_addon_manifest() {
        let tmp = tempfile::tempdir().unwrap();
        let addon = tmp.path().join("my-addon");
        write(
            &addon.join("package.json"),
            r#"{ "name": "my-addon", "version": "0.1.0", "main": "index.js", "keywords": ["denali-addon"] }"#,
        );
        write(&addon.join("denali-build.toml"), "package_files = [\"README.md\"]\n");
        write(&addon.join("app/service.js"), "exports.service = true;\n");
        write(&addon.join("test/dummy/package.json"), r#"{ "name": "dummy", "version": "0.0.0" }"#);

        let mut options = ProjectOptions::new(&addon);
        options.build_dummy = true;
        Project::new(options).unwrap().build(Path::new("tmp/dev")).unwrap();

        let manifest = addon.join("tmp/dev/node_modules/my-addon/package.json");
        let pkg = PackageManifest::from_dir(manifest.parent().unwrap()).unwrap();
        assert_eq!(pkg.name, "my-addon");
        assert_eq!(pkg.version, "0.1.0");
    }

    #[test]
    fn addons_sharing_a_file_stem_fail_the_build() {
        let tmp = tempfile::tempdir().unwrap();
        let app = tmp.path().join("my-app");
        write(
            &app.join("package.json"),
            r#"{ "name": "my-app", "version": "1.0.0", "dependencies": { "@acme/util": "1", "acme-util": "1" } }"#,
        );
        for name in ["@acme/util", "acme-util"] {
            let dir = app.join("node_modules").join(name);
            write(
                &dir.join("package.json"),
                &format!(r#"{{ "name": "{name}", "version": "1.0.0", "keywords": ["denali-addon"] }}"#),
            );
            write(&dir.join("app/util.js"), "exports.util = true;\n");
        }

        let err = Project::new(ProjectOptions::new(&app))
            .unwrap()
            .build(Path::new("dist"))
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::BuildFailed { source: TreeError::MergeConflict { .. }, .. }
        ));
    }

    #[test]
    fn build_failure_names_package_and_file() {
        let tmp = tempfile::tempdir().unwrap();
        write(&tmp.path().join("package.json"), r#"{ "name": "my-app", "version": "1.0.0" }"#);
        write(&tmp.path().join("denali-build.toml"), "builder = \"broken\"\n");
        let missing = tmp.path().join("missing");
        let hook_target = missing.clone();
        let mut registry = BuilderRegistry::new();
        registry.register(
            "broken",
            BuilderPlugin::new().with_process_self(move |_: &mut crate::hooks::HookContext<'_>, _: Tree| {
                Ok(Tree::source(hook_target.clone()))
            }),
        );
        let project = Project::new(ProjectOptions::new(tmp.path()))
            .unwrap()
            .with_registry(registry);

        let err = project.build(Path::new("dist")).unwrap_err();
        assert!(matches!(
            &err,
            EngineError::BuildFailed { source: TreeError::MissingSource { .. }, .. }
        ));
        assert_eq!(err.to_string(), format!("my-app failed to build ({})", missing.display()));
        assert!(!tmp.path().join("dist").exists());
    }

    #[test]
    fn watch_builds_until_stopped() {
        let tmp = tempfile::tempdir().unwrap();
        let app = app_with_addon(tmp.path());
        let project = Project::new(ProjectOptions::new(&app)).unwrap();

        let builds = Arc::new(AtomicUsize::new(0));
        let mut options = WatchOptions::new("dist");
        options.interval = Duration::from_millis(5);
        let stop = Arc::clone(&options.stop);
        let counter = Arc::clone(&builds);
        options.on_build = Box::new(move |out: &Path| {
            assert!(out.join("my-app.bundle.js").is_file());
            counter.fetch_add(1, Ordering::SeqCst);
            stop.store(true, Ordering::SeqCst);
        });
        project.watch(options).unwrap();
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    /// Replays change batches, then stops the watch loop.
    struct Script {
        batches: VecDeque<Vec<PathBuf>>,
        stop: Arc<AtomicBool>,
    }

    impl Script {
        fn new(batches: usize, dir: &Path, stop: &Arc<AtomicBool>) -> Self {
            Self {
                batches: (0..batches).map(|_| vec![dir.to_path_buf()]).collect(),
                stop: Arc::clone(stop),
            }
        }
    }

    impl ChangeDetector for Script {
        fn detect_changes(&mut self) -> Result<Vec<PathBuf>, TreeError> {
            let batch = self.batches.pop_front();
            if batch.is_none() {
                self.stop.store(true, Ordering::SeqCst);
            }
            Ok(batch.unwrap_or_default())
        }
    }

    #[test]
    fn watch_rebuilds_with_changed_sources() {
        let tmp = tempfile::tempdir().unwrap();
        let app = app_with_addon(tmp.path());
        let project = Project::new(ProjectOptions::new(&app)).unwrap();

        let bundles = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut options = WatchOptions::new("dist");
        options.interval = Duration::from_millis(1);
        let script = Script::new(2, &app.join("app"), &options.stop);
        let seen = Arc::clone(&bundles);
        let index = app.join("app/index.js");
        options.on_build = Box::new(move |out: &Path| {
            seen.lock().unwrap().push(fs::read_to_string(out.join("my-app.bundle.js")).unwrap());
            fs::write(&index, "exports.app = 'edited';\n").unwrap();
        });
        project.watch_with(options, |_| Ok(script)).unwrap();

        let bundles = bundles.lock().unwrap();
        assert_eq!(bundles.len(), 2);
        assert!(bundles.first().unwrap().contains("exports.app = true;"));
        assert!(bundles.get(1).unwrap().contains("exports.app = 'edited';"));
    }

    #[test]
    fn watch_survives_a_failed_rebuild() {
        let tmp = tempfile::tempdir().unwrap();
        let app = app_with_addon(tmp.path());
        let project = Project::new(ProjectOptions::new(&app)).unwrap();

        let builds = Arc::new(AtomicUsize::new(0));
        let prebuilds = Arc::new(AtomicUsize::new(0));
        let mut options = WatchOptions::new("dist");
        options.interval = Duration::from_millis(1);
        let app_dir = app.join("app");
        let script = Script::new(4, &app_dir, &options.stop);

        let counter = Arc::clone(&builds);
        let removed = app_dir.clone();
        options.on_build = Box::new(move |_: &Path| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                fs::remove_dir_all(&removed).unwrap();
            }
        });
        let calls = Arc::clone(&prebuilds);
        options.before_rebuild = Box::new(move || {
            if calls.fetch_add(1, Ordering::SeqCst) == 1 {
                write(&app_dir.join("index.js"), "exports.app = 'restored';\n");
            }
            Prebuild::Ready
        });
        project.watch_with(options, |_| Ok(script)).unwrap();

        assert_eq!(builds.load(Ordering::SeqCst), 2);
        assert_eq!(prebuilds.load(Ordering::SeqCst), 2);
        let bundle = fs::read_to_string(app.join("dist/my-app.bundle.js")).unwrap();
        assert!(bundle.contains("exports.app = 'restored';"));
    }

    struct Findings(Vec<Vulnerability>);

    impl VulnerabilityScanner for Findings {
        fn scan(&self, manifest: &Path) -> Result<Vec<Vulnerability>, ScanError> {
            assert!(manifest.ends_with("package.json"));
            Ok(self.0.clone())
        }
    }

    fn vuln(path: &[&str]) -> Vulnerability {
        Vulnerability {
            path: path.iter().map(|s| (*s).to_owned()).collect(),
            module: "c".to_owned(),
            version: "3.0.0".to_owned(),
            recommendation: String::new(),
        }
    }

    #[test]
    fn audit_applies_configured_ignore_patterns() {
        let tmp = tempfile::tempdir().unwrap();
        write(&tmp.path().join("package.json"), r#"{ "name": "my-app", "version": "1.0.0" }"#);
        write(
            &tmp.path().join("denali-build.toml"),
            "ignore_vulnerabilities = [[\"b@^2.0.0\"]]\n",
        );
        let project = Project::new(ProjectOptions::new(tmp.path()))
            .unwrap()
            .with_scanner(Findings(vec![
                vuln(&["a@1.0.0", "b@2.0.0", "c@3.0.0"]),
                vuln(&["a@1.0.0", "x@9.9.9", "c@3.0.0"]),
            ]));
        assert_eq!(
            project.audit_package().unwrap(),
            vec![vuln(&["a@1.0.0", "x@9.9.9", "c@3.0.0"])]
        );
    }

    #[test]
    fn dummy_audit_uses_the_dummy_ignore_list() {
        let tmp = tempfile::tempdir().unwrap();
        let addon = tmp.path().join("my-addon");
        write(
            &addon.join("package.json"),
            r#"{ "name": "my-addon", "version": "0.1.0", "keywords": ["denali-addon"] }"#,
        );
        write(&addon.join("test/dummy/package.json"), r#"{ "name": "dummy", "version": "0.0.0" }"#);
        write(
            &addon.join("test/dummy/denali-build.toml"),
            "ignore_vulnerabilities = [[\"b@^2.0.0\"]]\n",
        );

        let findings = vec![
            vuln(&["a@1.0.0", "b@2.0.0", "c@3.0.0"]),
            vuln(&["a@1.0.0", "x@9.9.9", "c@3.0.0"]),
        ];
        let addon_only = Project::new(ProjectOptions::new(&addon))
            .unwrap()
            .with_scanner(Findings(findings.clone()));
        assert_eq!(addon_only.audit_package().unwrap(), findings);

        let mut options = ProjectOptions::new(&addon);
        options.build_dummy = true;
        let dummy = Project::new(options).unwrap().with_scanner(Findings(findings));
        assert_eq!(dummy.root_dir(), addon.join("test/dummy"));
        assert_eq!(
            dummy.audit_package().unwrap(),
            vec![vuln(&["a@1.0.0", "x@9.9.9", "c@3.0.0"])]
        );
    }

    #[test]
    fn malformed_ignore_pattern_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        write(&tmp.path().join("package.json"), r#"{ "name": "my-app" }"#);
        write(&tmp.path().join("denali-build.toml"), "ignore_vulnerabilities = [[\"b@!!\"]]\n");
        let project = Project::new(ProjectOptions::new(tmp.path())).unwrap();
        assert!(matches!(project.audit_package().unwrap_err(), EngineError::IgnorePattern { .. }));
        assert!(matches!(project.assemble().unwrap_err(), EngineError::IgnorePattern { .. }));
    }
}
