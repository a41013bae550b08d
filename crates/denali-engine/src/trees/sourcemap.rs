//! Line-level Source Map v3 output for concatenated files.
//!
//! Each line copied from an input file maps to column 0 of the same line in
//! that file. Lines contributed by headers, footers, and module wrappers have
//! no mapping.

use serde::Serialize;

const BASE64: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// A Source Map v3 document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMap {
    pub version: u8,
    pub file: String,
    pub sources: Vec<String>,
    pub names: Vec<String>,
    pub mappings: String,
}

impl SourceMap {
    /// Serialize as JSON.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, Copy)]
struct LineOrigin {
    source: usize,
    line: usize,
}

/// Accumulates concatenated output and the origin of each output line.
#[derive(Debug, Default)]
pub struct SourceMapConcat {
    output: String,
    sources: Vec<String>,
    lines: Vec<Option<LineOrigin>>,
}

impl SourceMapConcat {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append generated text with no source mapping.
    pub fn push_text(&mut self, text: &str) {
        for line in text.lines() {
            self.output.push_str(line);
            self.output.push('\n');
            self.lines.push(None);
        }
    }

    /// Append the contents of a source file, mapping each line back to it.
    pub fn push_source(&mut self, name: impl Into<String>, content: &str) {
        let source = self.sources.len();
        self.sources.push(name.into());
        for (line, text) in content.lines().enumerate() {
            self.output.push_str(text);
            self.output.push('\n');
            self.lines.push(Some(LineOrigin { source, line }));
        }
    }

    /// The concatenated text and its source map.
    pub fn finish(self, file: impl Into<String>) -> (String, SourceMap) {
        let mappings = encode_mappings(&self.lines);
        let map = SourceMap {
            version: 3,
            file: file.into(),
            sources: self.sources,
            names: Vec::new(),
            mappings,
        };
        (self.output, map)
    }
}

fn encode_mappings(lines: &[Option<LineOrigin>]) -> String {
    let mut out = String::new();
    let mut prev_source: i64 = 0;
    let mut prev_line: i64 = 0;
    for (i, origin) in lines.iter().enumerate() {
        if i > 0 {
            out.push(';');
        }
        let Some(origin) = origin else {
            continue;
        };
        let source = to_i64(origin.source);
        let line = to_i64(origin.line);
        encode_vlq(0, &mut out);
        encode_vlq(source - prev_source, &mut out);
        encode_vlq(line - prev_line, &mut out);
        encode_vlq(0, &mut out);
        prev_source = source;
        prev_line = line;
    }
    out
}

fn to_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Append the Base64 VLQ encoding of `value`.
pub fn encode_vlq(value: i64, out: &mut String) {
    let magnitude = value.unsigned_abs() << 1;
    let mut vlq = if value < 0 { magnitude | 1 } else { magnitude };
    loop {
        let mut digit = u8::try_from(vlq & 0b1_1111).unwrap_or(0);
        vlq >>= 5;
        if vlq > 0 {
            digit |= 0b10_0000;
        }
        if let Some(&c) = BASE64.get(usize::from(digit)) {
            out.push(char::from(c));
        }
        if vlq == 0 {
            break;
        }
    }
}
