//! JavaScript wrappers emitted around bundles, fragments, modules, and unit tests.

/// Quote `value` as a JavaScript string literal.
fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("\"{value}\""))
}

pub fn module_open(module: &str, is_main: bool) -> String {
    format!(
        "loader.add({}, {{ isMain: {is_main} }}, function(exports, module, require) {{\n",
        js_string(module)
    )
}

pub const MODULE_CLOSE: &str = "});\n";

pub fn bundle_open(name: &str, version: &str) -> String {
    format!(
        "(function denaliBundle() {{\n  var loader = new Loader({}, {});\n",
        js_string(name),
        js_string(version)
    )
}

pub const BUNDLE_CLOSE: &str = "  return loader;\n})();\n";

pub fn fragment_open(fragment: &str, name: &str, version: &str) -> String {
    format!(
        "loader.scope({}, {}, function {fragment}(loader) {{\n",
        js_string(name),
        js_string(version)
    )
}

pub const FRAGMENT_CLOSE: &str = "});\n";

pub fn unit_test_open(bundle_path: &str, unit_test_path: &str) -> String {
    format!(
        "// {unit_test_path}\nvar loader = require({});\n(function(require) {{\n",
        js_string(bundle_path)
    )
}

pub const UNIT_TEST_CLOSE: &str = "})(loader.require.bind(loader));\n";

/// A JavaScript identifier for a package name: `@denali-js/my-addon` becomes
/// `denaliJsMyAddon`.
pub fn camel_case(name: &str) -> String {
    let mut out = String::new();
    for word in name.split(|c: char| !c.is_ascii_alphanumeric()).filter(|w| !w.is_empty()) {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            if out.is_empty() {
                out.push(first.to_ascii_lowercase());
            } else {
                out.push(first.to_ascii_uppercase());
            }
            out.extend(chars);
        }
    }
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}
