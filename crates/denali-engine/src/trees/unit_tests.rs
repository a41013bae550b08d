//! Wrap unit test files so each one loads the compiled bundle before running.

use std::path::Path;

use denali_tree::{Plugin, PluginContext, Tree, TreeError};
use denali_util::fs::{ensure_dir, relative_files, slash_path};

use super::templates;

#[derive(Debug)]
pub struct UnitTestBundler {
    /// Bundle file name at the root of the build output.
    bundle_file: String,
}

impl UnitTestBundler {
    pub fn new(bundle_file: impl Into<String>) -> Self {
        Self {
            bundle_file: bundle_file.into(),
        }
    }

    pub fn tree(input: &Tree, bundle_file: impl Into<String>) -> Tree {
        Tree::plugin(vec![input.clone()], Self::new(bundle_file)).annotated("unit tests")
    }

    /// Path from the directory containing `test_file` back to the bundle.
    fn bundle_path_from(&self, test_file: &Path) -> String {
        let depth = test_file.components().count().saturating_sub(1);
        let mut path = "../".repeat(depth);
        if depth == 0 {
            path.push_str("./");
        }
        path.push_str(&self.bundle_file);
        path
    }
}

impl Plugin for UnitTestBundler {
    fn build(&mut self, ctx: &PluginContext<'_>) -> Result<(), TreeError> {
        let input = ctx.input(0)?;
        for relative in relative_files(input)? {
            if relative.extension().is_none_or(|ext| ext != "js") {
                continue;
            }
            let src = input.join(&relative);
            let content =
                std::fs::read_to_string(&src).map_err(|source| TreeError::io(&src, source))?;
            let test_path = slash_path(&relative);
            let mut wrapped = templates::unit_test_open(&self.bundle_path_from(&relative), &test_path);
            wrapped.push_str(&content);
            if !content.ends_with('\n') {
                wrapped.push('\n');
            }
            wrapped.push_str(templates::UNIT_TEST_CLOSE);

            let dest = ctx.output.join(&relative);
            if let Some(parent) = dest.parent() {
                ensure_dir(parent)?;
            }
            std::fs::write(&dest, wrapped).map_err(|source| TreeError::io(&dest, source))?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::fs;

    use denali_tree::{LocalEngine, TreeEngine};

    use super::*;

    #[test]
    fn bundle_path_climbs_to_output_root() {
        let bundler = UnitTestBundler::new("my-app.bundle.js");
        assert_eq!(
            bundler.bundle_path_from(Path::new("test/unit/services/foo-test.js")),
            "../../../my-app.bundle.js"
        );
        assert_eq!(bundler.bundle_path_from(Path::new("top-test.js")), "./my-app.bundle.js");
    }

    #[test]
    fn wraps_each_test_file() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("test/unit")).unwrap();
        fs::write(tmp.path().join("test/unit/a-test.js"), "test('a');").unwrap();
        fs::write(tmp.path().join("test/unit/fixture.json"), "{}").unwrap();

        let tree = UnitTestBundler::tree(&Tree::source(tmp.path()), "my-app.bundle.js");
        let mut engine = LocalEngine::new(tree);
        let out = engine.build().unwrap().directory;

        let wrapped = fs::read_to_string(out.join("test/unit/a-test.js")).unwrap();
        assert!(wrapped.starts_with("// test/unit/a-test.js\n"));
        assert!(wrapped.contains(r#"require("../../my-app.bundle.js")"#));
        assert!(wrapped.contains("test('a');\n"));
        assert!(wrapped.ends_with(templates::UNIT_TEST_CLOSE));
        assert!(!out.join("test/unit/fixture.json").exists());
    }
}
