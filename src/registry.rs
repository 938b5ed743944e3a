//! Run-scoped registry of resolved formulas and clash detection

use crate::error::{Result, ShakerError};
use crate::manifest::Requirement;
use serde::Serialize;
use std::collections::BTreeMap;

/// A requirement pinned to the commit it resolved to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedFormula {
    #[serde(flatten)]
    pub requirement: Requirement,
    pub hash: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// First resolution for this name
    Added,
    /// Name already resolved to the same hash
    Confirmed,
}

/// At most one resolution per formula name. Entries are never replaced.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Registry {
    formulas: BTreeMap<String, ResolvedFormula>,
}

impl Registry {
    pub fn get(&self, name: &str) -> Option<&ResolvedFormula> {
        self.formulas.get(name)
    }

    pub fn len(&self) -> usize {
        self.formulas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formulas.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResolvedFormula> {
        self.formulas.values()
    }

    /// Reject a requirement citing a different URL than the existing resolution
    pub fn check_url(&self, requirement: &Requirement) -> Result<Option<&ResolvedFormula>> {
        let Some(existing) = self.formulas.get(&requirement.name) else {
            return Ok(None);
        };

        if existing.requirement.url != requirement.url {
            return Err(ShakerError::UrlClash {
                name: requirement.name.clone(),
                previous_url: existing.requirement.url.clone(),
                previous_declared_in: existing.requirement.declared_in.clone(),
                url: requirement.url.clone(),
                declared_in: requirement.declared_in.clone(),
            });
        }
        Ok(Some(existing))
    }

    /// Record `requirement` as resolved to `hash`, or confirm an identical
    /// earlier resolution. Any mismatch is a clash.
    pub fn check_and_register(
        &mut self,
        requirement: &Requirement,
        hash: &str,
    ) -> Result<Registration> {
        if let Some(existing) = self.check_url(requirement)? {
            if existing.hash != hash {
                return Err(ShakerError::RevisionClash {
                    name: requirement.name.clone(),
                    previous_revision: existing.requirement.revision.clone(),
                    previous_hash: existing.hash.clone(),
                    previous_declared_in: existing.requirement.declared_in.clone(),
                    revision: requirement.revision.clone(),
                    hash: hash.to_string(),
                    declared_in: requirement.declared_in.clone(),
                });
            }
            return Ok(Registration::Confirmed);
        }

        self.formulas.insert(
            requirement.name.clone(),
            ResolvedFormula {
                requirement: requirement.clone(),
                hash: hash.to_string(),
            },
        );
        Ok(Registration::Added)
    }
}
