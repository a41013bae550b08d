//! Error types for denali-tree.

use std::fmt;

/// Where in a source file a node failure originated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorLocation {
    pub file: String,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

impl fmt::Display for ErrorLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.line, self.column) {
            (Some(line), Some(column)) => write!(f, "{}:{line}:{column}", self.file),
            (Some(line), None) => write!(f, "{}:{line}", self.file),
            _ => f.write_str(&self.file),
        }
    }
}

/// Errors produced while building a tree.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    /// A filesystem operation failed.
    #[error("cannot access {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// A utility operation failed.
    #[error("{0}")]
    Util(#[from] denali_util::error::UtilError),

    /// A source node points at a directory that does not exist.
    #[error("source directory {path} does not exist")]
    MissingSource { path: String },

    /// Two merge inputs produced the same path and overwriting was not allowed.
    #[error("merge conflict at {path}; pass overwrite to let later inputs win")]
    MergeConflict { path: String },

    /// A funnel include/exclude pattern was invalid.
    #[error("invalid pattern `{pattern}`: {message}")]
    Pattern { pattern: String, message: String },

    /// The filesystem watcher could not be started or stopped reporting.
    #[error("cannot watch sources: {message}")]
    Watch { message: String },

    /// A plugin node failed.
    #[error("{node}: {message}")]
    Plugin {
        node: String,
        message: String,
        location: Option<ErrorLocation>,
    },
}

impl TreeError {
    /// Build a plugin failure without a source location.
    pub fn plugin(node: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Plugin {
            node: node.into(),
            message: message.into(),
            location: None,
        }
    }

    /// Wrap an I/O failure with the path it concerned.
    pub fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }

    /// The source location associated with the failure, if any.
    pub fn location(&self) -> Option<&ErrorLocation> {
        match self {
            Self::Plugin { location, .. } => location.as_ref(),
            _ => None,
        }
    }

    /// The source file associated with the failure, if any.
    pub fn file(&self) -> Option<&str> {
        match self {
            Self::Plugin {
                location: Some(location),
                ..
            } => Some(location.file.as_str()),
            Self::Io { path, .. } | Self::MissingSource { path } | Self::MergeConflict { path } => {
                Some(path.as_str())
            }
            _ => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn location_display_variants() {
        let mut loc = ErrorLocation {
            file: "app/index.js".to_owned(),
            line: Some(3),
            column: Some(7),
        };
        assert_eq!(loc.to_string(), "app/index.js:3:7");
        loc.column = None;
        assert_eq!(loc.to_string(), "app/index.js:3");
        loc.line = None;
        assert_eq!(loc.to_string(), "app/index.js");
    }

    #[test]
    fn file_prefers_plugin_location() {
        let err = TreeError::Plugin {
            node: "concat".to_owned(),
            message: "boom".to_owned(),
            location: Some(ErrorLocation {
                file: "lib/a.js".to_owned(),
                line: None,
                column: None,
            }),
        };
        assert_eq!(err.file(), Some("lib/a.js"));
        assert!(TreeError::plugin("x", "y").file().is_none());
    }
}
