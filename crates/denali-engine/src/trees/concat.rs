//! Concatenate module files into a single bundle with a sourcemap.

use std::path::{Path, PathBuf};

use denali_tree::{Plugin, PluginContext, Tree, TreeError};
use denali_util::fs::{ensure_dir, relative_files, slash_path};

use super::sourcemap::SourceMapConcat;
use super::templates;

/// What to concatenate and how to frame it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcatOptions {
    /// Output path relative to the node's output; its `.map` sibling holds the sourcemap.
    pub output_file: String,
    pub header: Option<String>,
    pub footer: Option<String>,
    /// Wrap each input in module open/close fragments.
    pub wrap_as_modules: bool,
    /// Input that is marked as the package's entry module.
    pub main: Option<String>,
    /// Glob patterns selecting inputs. Files are ordered by pattern, then by path.
    pub input_files: Vec<String>,
    /// Prefix for the `sources` listed in the sourcemap.
    pub base_dir: Option<PathBuf>,
}

impl ConcatOptions {
    pub fn new(output_file: impl Into<String>) -> Self {
        Self {
            output_file: output_file.into(),
            header: None,
            footer: None,
            wrap_as_modules: false,
            main: None,
            input_files: vec!["**/*.js".to_owned()],
            base_dir: None,
        }
    }

    /// Path of the sourcemap written next to the bundle.
    pub fn map_file(&self) -> String {
        match self.output_file.strip_suffix(".js") {
            Some(stem) => format!("{stem}.map"),
            None => format!("{}.map", self.output_file),
        }
    }
}

/// Tree node that produces `output_file` (and its map) from the matched inputs.
#[derive(Debug)]
pub struct ConcatBundler {
    options: ConcatOptions,
}

impl ConcatBundler {
    pub fn new(options: ConcatOptions) -> Self {
        Self { options }
    }

    /// Wrap `input` in a concat node.
    pub fn tree(input: &Tree, options: ConcatOptions) -> Tree {
        let annotation = format!("concat {}", options.output_file);
        Tree::plugin(vec![input.clone()], Self::new(options)).annotated(annotation)
    }

    fn select_inputs(&self, input: &Path, annotation: &str) -> Result<Vec<String>, TreeError> {
        let files: Vec<String> = relative_files(input)?.iter().map(|p| slash_path(p)).collect();
        let mut selected: Vec<String> = Vec::new();
        for raw in &self.options.input_files {
            let pattern = glob::Pattern::new(raw).map_err(|e| TreeError::Pattern {
                pattern: raw.clone(),
                message: e.to_string(),
            })?;
            for file in &files {
                if *file != self.options.output_file
                    && pattern.matches(file)
                    && !selected.contains(file)
                {
                    selected.push(file.clone());
                }
            }
        }
        tracing::debug!(node = annotation, count = selected.len(), "concatenating inputs");
        Ok(selected)
    }

    fn is_main(&self, file: &str) -> bool {
        let Some(main) = &self.options.main else {
            return false;
        };
        let main = main.trim_start_matches("./");
        file == main || module_name(file) == module_name(main)
    }
}

/// Module id for a file: its relative path without the `.js` extension.
fn module_name(file: &str) -> &str {
    file.strip_suffix(".js").unwrap_or(file)
}

impl Plugin for ConcatBundler {
    fn build(&mut self, ctx: &PluginContext<'_>) -> Result<(), TreeError> {
        let input = ctx.input(0)?;
        let files = self.select_inputs(input, ctx.annotation)?;

        let mut concat = SourceMapConcat::new();
        if let Some(header) = &self.options.header {
            concat.push_text(header);
        }
        for file in &files {
            let path = input.join(file);
            let content =
                std::fs::read_to_string(&path).map_err(|source| TreeError::io(&path, source))?;
            if self.options.wrap_as_modules {
                concat.push_text(&templates::module_open(module_name(file), self.is_main(file)));
            }
            let source_name = match &self.options.base_dir {
                Some(base) => slash_path(&base.join(file)),
                None => file.clone(),
            };
            concat.push_source(source_name, &content);
            if self.options.wrap_as_modules {
                concat.push_text(templates::MODULE_CLOSE);
            }
        }
        if let Some(footer) = &self.options.footer {
            concat.push_text(footer);
        }

        let map_file = self.options.map_file();
        let map_name = Path::new(&map_file)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| map_file.clone());
        let (mut text, map) = concat.finish(self.options.output_file.clone());
        text.push_str(&format!("//# sourceMappingURL={map_name}\n"));

        let output = ctx.output.join(&self.options.output_file);
        if let Some(parent) = output.parent() {
            ensure_dir(parent)?;
        }
        std::fs::write(&output, text).map_err(|source| TreeError::io(&output, source))?;

        let map_path = ctx.output.join(&map_file);
        let json = map
            .to_json()
            .map_err(|e| TreeError::plugin(ctx.annotation, format!("cannot serialize sourcemap: {e}")))?;
        std::fs::write(&map_path, json).map_err(|source| TreeError::io(&map_path, source))?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::fs;

    use denali_tree::{LocalEngine, TreeEngine};

    use super::*;

    fn fixture() -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("app")).unwrap();
        fs::create_dir_all(tmp.path().join("lib")).unwrap();
        fs::write(tmp.path().join("app/index.js"), "export default 1;\n").unwrap();
        fs::write(tmp.path().join("lib/util.js"), "export const x = 2;\n").unwrap();
        fs::write(tmp.path().join("lib/notes.txt"), "skip me\n").unwrap();
        tmp
    }

    #[test]
    fn wraps_modules_and_marks_main() {
        let tmp = fixture();
        let mut options = ConcatOptions::new("my-addon.fragment.js");
        options.wrap_as_modules = true;
        options.main = Some("app/index.js".to_owned());
        options.header = Some("// open\n".to_owned());
        options.footer = Some("// close\n".to_owned());

        let mut engine = LocalEngine::new(ConcatBundler::tree(&Tree::source(tmp.path()), options));
        let out = engine.build().unwrap().directory;
        let bundle = fs::read_to_string(out.join("my-addon.fragment.js")).unwrap();

        assert!(bundle.starts_with("// open\n"));
        assert!(bundle.contains(r#"loader.add("app/index", { isMain: true }"#));
        assert!(bundle.contains(r#"loader.add("lib/util", { isMain: false }"#));
        assert!(!bundle.contains("skip me"));
        assert!(bundle.find("app/index").unwrap() < bundle.find("lib/util").unwrap());
        assert!(bundle.ends_with("// close\n//# sourceMappingURL=my-addon.fragment.map\n"));
        assert!(out.join("my-addon.fragment.map").is_file());
    }

    #[test]
    fn pattern_order_controls_file_order() {
        let tmp = fixture();
        let mut options = ConcatOptions::new("out.js");
        options.input_files = vec!["lib/**/*.js".to_owned(), "**/*.js".to_owned()];
        options.base_dir = Some(PathBuf::from("/src/pkg"));

        let mut engine = LocalEngine::new(ConcatBundler::tree(&Tree::source(tmp.path()), options));
        let out = engine.build().unwrap().directory;
        let bundle = fs::read_to_string(out.join("out.js")).unwrap();
        assert!(bundle.find("x = 2").unwrap() < bundle.find("default 1").unwrap());

        let map: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(out.join("out.map")).unwrap()).unwrap();
        assert_eq!(map["sources"][0], "/src/pkg/lib/util.js");
        assert_eq!(map["sources"][1], "/src/pkg/app/index.js");
    }

    #[test]
    fn no_inputs_still_writes_bundle() {
        let tmp = tempfile::tempdir().unwrap();
        let mut options = ConcatOptions::new("empty.bundle.js");
        options.header = Some("// h\n".to_owned());
        let mut engine = LocalEngine::new(ConcatBundler::tree(&Tree::source(tmp.path()), options));
        let out = engine.build().unwrap().directory;
        assert_eq!(
            fs::read_to_string(out.join("empty.bundle.js")).unwrap(),
            "// h\n//# sourceMappingURL=empty.bundle.map\n"
        );
    }

    #[test]
    fn map_file_replaces_js_extension() {
        assert_eq!(ConcatOptions::new("a.bundle.js").map_file(), "a.bundle.map");
        assert_eq!(ConcatOptions::new("a.css").map_file(), "a.css.map");
    }
}
