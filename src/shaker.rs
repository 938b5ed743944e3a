//! Resolution driver
//!
//! Walks the root manifest and every manifest discovered inside resolved
//! formulas, resolving each requirement and materialising it into the
//! namespace directory. The first error aborts the run. Mirrors and any
//! namespace entries created so far are left as they are; the namespace
//! directory is rebuilt from empty by the next run.

use crate::config::ShakerConfig;
use crate::error::Result;
use crate::manifest::{ManifestParser, Requirement};
use crate::mirror::{self, Mirror};
use crate::namespace::Namespace;
use crate::registry::{Registration, Registry, ResolvedFormula};
use crate::resolver::{self, RevisionKind};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Manifests still to process (most recently discovered first) and the
/// ones already processed
#[derive(Debug, Default)]
struct Worklist {
    pending: Vec<PathBuf>,
    visited: HashSet<PathBuf>,
}

impl Worklist {
    fn new(root: PathBuf) -> Self {
        Self {
            pending: vec![root],
            visited: HashSet::new(),
        }
    }

    /// Queue a manifest. Returns `false` if it was already seen.
    fn push(&mut self, manifest: PathBuf) -> bool {
        if self.visited.contains(&manifest) || self.pending.contains(&manifest) {
            return false;
        }
        self.pending.push(manifest);
        true
    }

    /// Next unvisited manifest, marked visited
    fn next(&mut self) -> Option<PathBuf> {
        while let Some(manifest) = self.pending.pop() {
            if self.visited.insert(manifest.clone()) {
                return Some(manifest);
            }
        }
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Resolved, checked out and placed in the namespace
    Installed,
    /// Resolved to the same hash an earlier requirement already installed
    AlreadySatisfied,
    /// Replaced by an explicit pin in the root manifest
    Overridden,
}

/// What happened to one manifest line
#[derive(Debug, Clone, Serialize)]
pub struct FormulaOutcome {
    pub name: String,
    pub url: String,
    pub revision: String,
    pub hash: String,
    pub declared_in: PathBuf,
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<RevisionKind>,
    pub fetched: bool,
    /// The mirror's working tree was moved
    pub checked_out: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct InstallReport {
    pub namespace_dir: PathBuf,
    /// Manifests in the order they were processed
    pub manifests: Vec<PathBuf>,
    pub formulas: Vec<FormulaOutcome>,
    /// Final resolution per formula name
    pub resolved: BTreeMap<String, ResolvedFormula>,
}

impl InstallReport {
    pub fn fetch_count(&self) -> usize {
        self.formulas.iter().filter(|f| f.fetched).count()
    }

    pub fn checkout_count(&self) -> usize {
        self.formulas.iter().filter(|f| f.checked_out).count()
    }

    pub fn outcome_for<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a FormulaOutcome> {
        self.formulas.iter().filter(move |f| f.name == name)
    }
}

/// Resolves and installs the formulas a project requires
#[derive(Debug, Clone)]
pub struct Shaker {
    config: ShakerConfig,
}

impl Shaker {
    pub fn new(config: ShakerConfig) -> Self {
        Self { config }
    }

    /// Run one full installation
    pub fn install(&self) -> Result<InstallReport> {
        let mut config = self.config.clone();
        // Symlink targets must not depend on the working directory
        config.root_dir = std::path::absolute(&config.root_dir)?;

        let namespace = Namespace::prepare(config.namespace_path(), config.link_mode)?;
        fs::create_dir_all(config.mirrors_path())?;

        let run = Run {
            parser: ManifestParser::new(config.root_manifest(), config.default_revision.clone()),
            worklist: Worklist::new(config.root_manifest()),
            registry: Registry::default(),
            namespace,
            config: &config,
            manifests: Vec::new(),
            formulas: Vec::new(),
        };
        run.execute()
    }
}

/// State of a single installation
struct Run<'a> {
    config: &'a ShakerConfig,
    parser: ManifestParser,
    worklist: Worklist,
    registry: Registry,
    namespace: Namespace,
    manifests: Vec<PathBuf>,
    formulas: Vec<FormulaOutcome>,
}

impl Run<'_> {
    fn execute(mut self) -> Result<InstallReport> {
        while let Some(manifest) = self.worklist.next() {
            info!("Checking {}", manifest.display());

            for requirement in self.parser.parse_file(&manifest)? {
                let outcome = self.install_requirement(&requirement)?;
                self.formulas.push(outcome);
                self.discover_nested(&requirement, &manifest);
            }
            self.manifests.push(manifest);
        }

        Ok(InstallReport {
            namespace_dir: self.namespace.dir().to_path_buf(),
            manifests: self.manifests,
            formulas: self.formulas,
            resolved: self
                .registry
                .iter()
                .map(|f| (f.requirement.name.clone(), f.clone()))
                .collect(),
        })
    }

    fn install_requirement(&mut self, requirement: &Requirement) -> Result<FormulaOutcome> {
        self.registry.check_url(requirement)?;

        if let Some(existing) = resolver::top_level_override(
            &self.registry,
            requirement,
            self.config.override_from_top_level,
        ) {
            info!(
                "Overriding {} version of {} to {} from project formula requirements",
                requirement.name, requirement.revision, existing.requirement.revision
            );
            return Ok(outcome(
                requirement,
                existing.hash.clone(),
                Outcome::Overridden,
                None,
                false,
                false,
            ));
        }

        let mirror_dir = self.config.mirror_path(&requirement.name);
        let mirror = Mirror::ensure(
            &requirement.name,
            &mirror_dir,
            &requirement.url,
            self.config.git_ssh_command.as_deref(),
        )?;
        mirror::check_origin(&mirror, &requirement.url, &requirement.declared_in)?;

        let resolved = resolver::resolve_revision(requirement, &mirror)?;
        debug!(
            "{} {} resolved to {}",
            requirement.name, requirement.revision, resolved.hash
        );

        match self.registry.check_and_register(requirement, &resolved.hash)? {
            Registration::Confirmed => Ok(outcome(
                requirement,
                resolved.hash,
                Outcome::AlreadySatisfied,
                Some(resolved.kind),
                resolved.fetched,
                false,
            )),
            Registration::Added => {
                let checked_out = mirror.checkout(&resolved.hash)?;
                self.namespace
                    .materialize(&requirement.name, &mirror.payload_dir())?;
                Ok(outcome(
                    requirement,
                    resolved.hash,
                    Outcome::Installed,
                    Some(resolved.kind),
                    resolved.fetched,
                    checked_out,
                ))
            }
        }
    }

    fn discover_nested(&mut self, requirement: &Requirement, from: &Path) {
        let mirror_dir = self.config.mirror_path(&requirement.name);
        for candidate in self
            .config
            .nested_manifest_candidates(&mirror_dir, &requirement.name)
        {
            if candidate.is_file() && self.worklist.push(candidate.clone()) {
                info!(
                    "Adding {} to check from {} {}",
                    candidate.display(),
                    from.display(),
                    requirement.revision
                );
            }
        }
    }
}

fn outcome(
    requirement: &Requirement,
    hash: String,
    outcome: Outcome,
    kind: Option<RevisionKind>,
    fetched: bool,
    checked_out: bool,
) -> FormulaOutcome {
    FormulaOutcome {
        name: requirement.name.clone(),
        url: requirement.url.clone(),
        revision: requirement.revision.clone(),
        hash,
        declared_in: requirement.declared_in.clone(),
        outcome,
        kind,
        fetched,
        checked_out,
    }
}

/// Install the formulas required by `<root_dir>/formula-requirements.txt`
/// with the default layout, returning the namespace directory.
pub fn install(root_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let report = Shaker::new(ShakerConfig::new(root_dir.as_ref())).install()?;
    Ok(report.namespace_dir)
}
