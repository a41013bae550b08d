//! Dependency vulnerability scanning and ignore-pattern filtering.
//!
//! An ignore pattern is a path through the dependency graph, written as
//! `name@range` segments. `["foo", "bar@~4.2.1"]` ignores any vulnerability
//! whose dependency path passes through `foo` and then directly into a `bar`
//! satisfying `~4.2.1`, including everything below that `bar`.

use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Endpoint the remote scanner submits `package.json` to by default.
pub const DEFAULT_ENDPOINT: &str = "https://api.nodesecurity.io/check";

/// One finding reported by a scanner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vulnerability {
    /// Dependency chain from the root package, as `name@version` entries.
    pub path: Vec<String>,
    pub module: String,
    pub version: String,
    #[serde(default)]
    pub recommendation: String,
}

/// Errors produced while scanning.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    /// The scanning service could not be reached.
    #[error("unable to reach {endpoint}: {message}")]
    Unreachable { endpoint: String, message: String },

    #[error("vulnerability scan failed: {message}")]
    Failed { message: String },

    #[error("cannot parse vulnerability scan results: {source}")]
    Parse { source: serde_json::Error },
}

/// A service that reports known vulnerabilities in a package's dependencies.
pub trait VulnerabilityScanner {
    /// # Errors
    /// Returns an error if the manifest cannot be read or the scan fails.
    fn scan(&self, manifest: &Path) -> Result<Vec<Vulnerability>, ScanError>;
}

/// Submits `package.json` to an HTTP scanning service.
#[derive(Debug)]
pub struct RemoteScanner {
    endpoint: String,
    agent: ureq::Agent,
}

impl RemoteScanner {
    pub fn new(endpoint: impl Into<String>) -> Self {
        let agent = ureq::Agent::new_with_config(
            ureq::config::Config::builder()
                .timeout_connect(Some(Duration::from_secs(10)))
                .timeout_global(Some(Duration::from_secs(60)))
                .build(),
        );
        Self {
            endpoint: endpoint.into(),
            agent,
        }
    }

    fn classify(&self, error: ureq::Error) -> ScanError {
        let unreachable = match &error {
            ureq::Error::HostNotFound | ureq::Error::ConnectionFailed | ureq::Error::Timeout(_) => true,
            ureq::Error::Io(io) => matches!(
                io.kind(),
                ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionRefused
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::TimedOut
            ),
            _ => false,
        };
        if unreachable {
            ScanError::Unreachable {
                endpoint: self.endpoint.clone(),
                message: error.to_string(),
            }
        } else {
            ScanError::Failed {
                message: error.to_string(),
            }
        }
    }
}

impl Default for RemoteScanner {
    fn default() -> Self {
        Self::new(DEFAULT_ENDPOINT)
    }
}

impl VulnerabilityScanner for RemoteScanner {
    fn scan(&self, manifest: &Path) -> Result<Vec<Vulnerability>, ScanError> {
        let content = std::fs::read_to_string(manifest).map_err(|source| ScanError::Read {
            path: manifest.display().to_string(),
            source,
        })?;
        let package: serde_json::Value =
            serde_json::from_str(&content).map_err(|source| ScanError::Parse { source })?;
        let body = serde_json::json!({ "package": package }).to_string();

        tracing::debug!(endpoint = %self.endpoint, "submitting package for vulnerability scan");
        let mut response = self
            .agent
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .send(body)
            .map_err(|e| self.classify(e))?;
        let text = response
            .body_mut()
            .read_to_string()
            .map_err(|e| self.classify(e))?;
        serde_json::from_str(&text).map_err(|source| ScanError::Parse { source })
    }
}

/// A version range in npm syntax: comparators separated by whitespace,
/// alternatives separated by `||`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct VersionRange {
    alternatives: Vec<VersionReq>,
}

impl VersionRange {
    fn parse(raw: &str) -> Result<Self, semver::Error> {
        let raw = raw.trim();
        if raw.is_empty() || raw == "latest" {
            return Ok(Self {
                alternatives: vec![VersionReq::STAR],
            });
        }
        let alternatives = raw
            .split("||")
            .map(|alt| VersionReq::parse(&comma_separated(alt)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { alternatives })
    }

    fn matches(&self, version: &Version) -> bool {
        self.alternatives.iter().any(|req| req.matches(version))
    }
}

/// `>= 1.2.0 <2` becomes `>=1.2.0, <2`.
fn comma_separated(range: &str) -> String {
    let mut comparators: Vec<String> = Vec::new();
    let mut pending_op = String::new();
    for token in range.split_whitespace() {
        if token.chars().all(|c| matches!(c, '<' | '>' | '=' | '~' | '^')) {
            pending_op.push_str(token);
            continue;
        }
        comparators.push(format!("{pending_op}{token}"));
        pending_op.clear();
    }
    comparators.join(", ")
}

/// Split `name@version`, keeping a leading `@` as part of a scoped name.
fn split_versioned(entry: &str) -> (&str, Option<&str>) {
    match entry.rfind('@') {
        Some(at) if at > 0 => {
            let (name, version) = entry.split_at(at);
            (name, version.strip_prefix('@'))
        }
        _ => (entry, None),
    }
}

/// One `name@range` segment of an ignore pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnorePattern {
    name: String,
    range: VersionRange,
}

impl IgnorePattern {
    /// Parse `name@range`; a missing range matches any version.
    ///
    /// # Errors
    /// Returns an error if the range is not valid semver range syntax.
    pub fn parse(segment: &str) -> Result<Self, EngineError> {
        let (name, range) = split_versioned(segment.trim());
        let range = VersionRange::parse(range.unwrap_or("*")).map_err(|e| EngineError::IgnorePattern {
            pattern: segment.to_owned(),
            message: e.to_string(),
        })?;
        Ok(Self {
            name: name.to_owned(),
            range,
        })
    }

    /// Parse every segment of one ignore path.
    ///
    /// # Errors
    /// Returns an error if any segment is invalid.
    pub fn parse_path(segments: &[String]) -> Result<Vec<Self>, EngineError> {
        segments.iter().map(|s| Self::parse(s)).collect()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether a `name@version` dependency entry satisfies this segment.
    pub fn matches(&self, dependency: &str) -> bool {
        let (name, version) = split_versioned(dependency);
        if name != self.name {
            return false;
        }
        version
            .and_then(|v| Version::parse(v).ok())
            .is_some_and(|v| self.range.matches(&v))
    }
}

/// Whether `pattern` matches `path`.
///
/// The match is anchored at the first entry satisfying the pattern's first
/// segment; from there every segment must match the following entries in
/// order.
pub fn pattern_matches(path: &[String], pattern: &[IgnorePattern]) -> bool {
    let Some(first) = pattern.first() else {
        return false;
    };
    let Some(start) = path.iter().position(|dep| first.matches(dep)) else {
        return false;
    };
    let rest = path.get(start..).unwrap_or_default();
    rest.len() >= pattern.len()
        && pattern
            .iter()
            .zip(rest)
            .all(|(segment, dep)| segment.matches(dep))
}

/// Drop vulnerabilities matched by any ignore pattern.
pub fn filter_ignored(
    vulnerabilities: Vec<Vulnerability>,
    patterns: &[Vec<IgnorePattern>],
) -> Vec<Vulnerability> {
    vulnerabilities
        .into_iter()
        .filter(|v| !patterns.iter().any(|p| pattern_matches(&v.path, p)))
        .collect()
}

/// Scan `manifest`, filter the findings, and print what remains as warnings.
///
/// Scan failures are reported as warnings; auditing never fails a build.
pub fn audit_package(
    scanner: &dyn VulnerabilityScanner,
    manifest: &Path,
    patterns: &[Vec<IgnorePattern>],
) -> Vec<Vulnerability> {
    let found = match scanner.scan(manifest) {
        Ok(found) => found,
        Err(e @ ScanError::Unreachable { .. }) => {
            eprintln!("warning: unable to reach the vulnerability scanning server, skipping scan");
            eprintln!("warning: {e}");
            return Vec::new();
        }
        Err(e) => {
            eprintln!("warning: {e}");
            return Vec::new();
        }
    };
    let remaining = filter_ignored(found, patterns);
    print_vulnerabilities(&remaining);
    remaining
}

fn print_vulnerabilities(vulnerabilities: &[Vulnerability]) {
    if vulnerabilities.is_empty() {
        return;
    }
    eprintln!("warning: some packages in your package.json may have security vulnerabilities:");
    for v in vulnerabilities {
        eprintln!("*** {}@{} ***", v.module, v.version);
        eprintln!("Found in: {}", v.path.join(" => "));
        eprintln!("Recommendation: {}", v.recommendation.replace('\n', " "));
    }
}
