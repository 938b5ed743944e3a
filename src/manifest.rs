//! Formula manifest parsing
//!
//! A manifest lists one requirement per line:
//!
//! ```text
//! git@github.com:org/ntp-formula.git==v1.2.3
//! git@github.com:org/repos-formula.git==my_branch
//! git@github.com:org/users-formula.git   # defaults to the primary branch
//! ```

use crate::error::{Result, ShakerError};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const REVISION_SEPARATOR: &str = "==";
const FORMULA_SUFFIX: &str = "-formula";
const VCS_SUFFIX: &str = ".git";

/// Why a single manifest line was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyntaxError {
    #[error("clone URL is empty")]
    EmptyUrl,
    #[error("clone URL has no '/' path separator")]
    MissingPathSeparator,
    #[error("cannot derive a formula name from the last path segment")]
    EmptyName,
    #[error("unexpected whitespace in {0}")]
    Whitespace(&'static str),
}

/// One requirement line, before it is tied to a manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequirementLine {
    pub url: String,
    pub name: String,
    /// `None` when no revision (or an empty one) follows `==`
    pub revision: Option<String>,
}

impl RequirementLine {
    /// Parse `<clone-url>[==<revision>]`. Comments must already be stripped.
    pub fn parse(line: &str) -> std::result::Result<Self, SyntaxError> {
        let line = line.trim();

        let (url, revision) = match line.split_once(REVISION_SEPARATOR) {
            Some((url, rev)) => (url.trim(), Some(rev.trim())),
            None => (line, None),
        };

        if url.is_empty() {
            return Err(SyntaxError::EmptyUrl);
        }
        if url.contains(char::is_whitespace) {
            return Err(SyntaxError::Whitespace("clone URL"));
        }

        let revision = revision.filter(|r| !r.is_empty());
        if revision.is_some_and(|r| r.contains(char::is_whitespace)) {
            return Err(SyntaxError::Whitespace("revision"));
        }

        let name = formula_name(url)?;

        Ok(Self {
            url: url.to_string(),
            name,
            revision: revision.map(str::to_string),
        })
    }
}

/// Derive the formula name from a clone URL
///
/// `git@host:org/ntp-formula.git` → `ntp`
pub fn formula_name(url: &str) -> std::result::Result<String, SyntaxError> {
    let (_, segment) = url
        .rsplit_once('/')
        .ok_or(SyntaxError::MissingPathSeparator)?;

    let segment = segment.strip_suffix(VCS_SUFFIX).unwrap_or(segment);
    let segment = segment.strip_suffix(FORMULA_SUFFIX).unwrap_or(segment);

    if segment.is_empty() {
        return Err(SyntaxError::EmptyName);
    }
    Ok(segment.to_string())
}

/// A requirement as declared by a specific manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Requirement {
    pub url: String,
    pub name: String,
    pub revision: String,
    /// The revision was written out in the manifest line
    pub explicit_revision: bool,
    /// Manifest that declared this requirement
    pub declared_in: PathBuf,
    /// Declared in the root manifest of the run
    pub top_level: bool,
}

/// Turns manifest files into requirements for one run
#[derive(Debug, Clone)]
pub struct ManifestParser {
    root_manifest: PathBuf,
    default_revision: String,
}

impl ManifestParser {
    pub fn new(root_manifest: impl Into<PathBuf>, default_revision: impl Into<String>) -> Self {
        Self {
            root_manifest: root_manifest.into(),
            default_revision: default_revision.into(),
        }
    }

    pub fn parse_file(&self, path: &Path) -> Result<Vec<Requirement>> {
        let contents = fs::read_to_string(path).map_err(|error| ShakerError::ManifestRead {
            path: path.to_path_buf(),
            error,
        })?;
        self.parse_str(&contents, path)
    }

    /// Parse manifest text, using `path` as the declaring source
    pub fn parse_str(&self, contents: &str, path: &Path) -> Result<Vec<Requirement>> {
        let top_level = path == self.root_manifest;
        let mut requirements = Vec::new();

        for (index, raw) in contents.lines().enumerate() {
            let line = strip_comment(raw).trim();
            if line.is_empty() {
                continue;
            }

            let parsed = RequirementLine::parse(line).map_err(|reason| {
                ShakerError::ManifestParse {
                    declared_in: path.to_path_buf(),
                    line_number: index + 1,
                    line: line.to_string(),
                    reason: reason.to_string(),
                }
            })?;

            requirements.push(Requirement {
                url: parsed.url,
                name: parsed.name,
                explicit_revision: parsed.revision.is_some(),
                revision: parsed
                    .revision
                    .unwrap_or_else(|| self.default_revision.clone()),
                declared_in: path.to_path_buf(),
                top_level,
            });
        }

        Ok(requirements)
    }
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(pos) => &line[..pos],
        None => line,
    }
}
