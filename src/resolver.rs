//! Revision resolution
//!
//! Turns the symbolic revision of a requirement into a commit hash using the
//! formula's mirror. Tags are trusted as immutable and never cause a fetch.
//! Branches move, so a branch tip is only trusted after fetching. Anything
//! else is handed to `git rev-parse`. At most one fetch happens per
//! requirement.

use crate::error::{Result, ShakerError};
use crate::manifest::Requirement;
use crate::mirror::Mirror;
use crate::registry::{Registry, ResolvedFormula};
use serde::Serialize;
use tracing::{debug, info};

/// What kind of reference a revision turned out to be
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RevisionKind {
    Tag,
    Branch,
    Direct,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRevision {
    pub hash: String,
    pub kind: RevisionKind,
    /// The mirror was fetched while resolving
    pub fetched: bool,
}

/// The existing resolution that satisfies `requirement` through the
/// top-level override: an explicit pin from the root manifest wins over
/// any requirement for the same name found further down.
pub fn top_level_override<'a>(
    registry: &'a Registry,
    requirement: &Requirement,
    enabled: bool,
) -> Option<&'a ResolvedFormula> {
    if !enabled || requirement.top_level {
        return None;
    }

    registry.get(&requirement.name).filter(|existing| {
        existing.requirement.top_level && existing.requirement.explicit_revision
    })
}

/// Resolve `requirement.revision` against `mirror`
pub fn resolve_revision(requirement: &Requirement, mirror: &Mirror) -> Result<ResolvedRevision> {
    let revision = requirement.revision.as_str();
    debug!("Resolving {} for {}", revision, requirement.name);

    let mut fetched = false;
    let mut is_branch = false;

    loop {
        if let Some(hash) = mirror.tag_commit(revision)? {
            return Ok(ResolvedRevision {
                hash,
                kind: RevisionKind::Tag,
                fetched,
            });
        }

        if let Some(tip) = mirror.remote_branch_commit(revision)? {
            is_branch = true;
            // A local branch tip is stale until origin has been fetched
            if fetched {
                return Ok(ResolvedRevision {
                    hash: tip,
                    kind: RevisionKind::Branch,
                    fetched,
                });
            }
        }

        // rev-parse would hand back the stale tip of a known branch
        if !is_branch && let Some(hash) = mirror.rev_parse(revision)? {
            return Ok(ResolvedRevision {
                hash,
                kind: RevisionKind::Direct,
                fetched,
            });
        }

        if fetched {
            return Err(ShakerError::RevisionResolution {
                revision: revision.to_string(),
                url: requirement.url.clone(),
                declared_in: requirement.declared_in.clone(),
            });
        }

        if is_branch {
            info!(
                "Fetching {} to see if {} has changed",
                mirror.url(),
                revision
            );
        } else {
            info!("Fetching {}", mirror.url());
        }
        mirror.fetch()?;
        fetched = true;
    }
}
