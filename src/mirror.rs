//! Local formula mirrors
//!
//! Each formula name owns one persistent clone under the mirrors directory.
//! A mirror is created lazily, bound to an `origin` remote once, and then
//! fetched and checked out in place by later runs.

use crate::error::{Result, ShakerError};
use crate::git::Git;
use std::cell::Cell;
use std::path::{Path, PathBuf};
use tracing::debug;

const ORIGIN: &str = "origin";

#[derive(Debug, Clone)]
pub struct Mirror {
    name: String,
    url: String,
    git: Git,
    fetches: Cell<usize>,
}

impl Mirror {
    /// Open the mirror at `path`, initialising it and adding `origin -> url`
    /// if either is missing. An existing origin is never rewritten.
    pub fn ensure(name: &str, path: &Path, url: &str, ssh_command: Option<&str>) -> Result<Self> {
        let git = Git::new(path, ssh_command);

        // Kept as separate steps so an interrupted run can be resumed
        if !path.join(".git").exists() {
            debug!("Initialising mirror for {} at {}", name, path.display());
            git.init()?;
        }

        let origin_key = format!("remote.{}.url", ORIGIN);
        let url = match git.query(&["config", "--get", &origin_key])? {
            Some(existing) => existing,
            None => {
                git.run(&["remote", "add", ORIGIN, url])?;
                url.to_string()
            }
        };

        Ok(Self {
            name: name.to_string(),
            url,
            git,
            fetches: Cell::new(0),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// URL the `origin` remote points at
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn path(&self) -> &Path {
        self.git.dir()
    }

    /// Subdirectory carrying the formula itself: `<mirror>/<name>`
    pub fn payload_dir(&self) -> PathBuf {
        self.path().join(&self.name)
    }

    /// Pull all tags and the default branch refs from origin
    ///
    /// Not `--quiet`: rejected ref updates are only reported on stderr.
    pub fn fetch(&self) -> Result<()> {
        self.fetches.set(self.fetches.get() + 1);
        self.git
            .run_remote(&self.url, &["fetch", ORIGIN, "refs/tags/*:refs/tags/*"])?;
        self.git.run_remote(&self.url, &["fetch", ORIGIN])?;
        Ok(())
    }

    /// Number of times `fetch` was attempted on this handle
    pub fn fetch_count(&self) -> usize {
        self.fetches.get()
    }

    /// Commit the working tree is currently at, if any
    pub fn head(&self) -> Result<Option<String>> {
        self.git
            .query(&["rev-parse", "--verify", "--quiet", "HEAD^{commit}"])
    }

    /// Force the working tree to `hash`. Returns `false` when already there.
    pub fn checkout(&self, hash: &str) -> Result<bool> {
        if self.head()?.as_deref() == Some(hash) {
            debug!("{} already at {}", self.name, hash);
            return Ok(false);
        }

        debug!("Checking out {} at {}", self.name, hash);
        self.git
            .run(&["checkout", "--quiet", "--force", "--detach", hash])?;
        Ok(true)
    }

    /// Commit a local tag points at
    pub fn tag_commit(&self, tag: &str) -> Result<Option<String>> {
        self.lookup(&format!("refs/tags/{}", tag))
    }

    /// Tip of an origin branch as of the last fetch
    pub fn remote_branch_commit(&self, branch: &str) -> Result<Option<String>> {
        self.lookup(&format!("refs/remotes/{}/{}", ORIGIN, branch))
    }

    /// Anything git can dereference to a commit directly (full or short hash, ...)
    pub fn rev_parse(&self, revision: &str) -> Result<Option<String>> {
        self.lookup(revision)
    }

    fn lookup(&self, revision: &str) -> Result<Option<String>> {
        if revision.is_empty() || revision.starts_with('-') {
            return Ok(None);
        }
        let spec = format!("{}^{{commit}}", revision);
        self.git.query(&["rev-parse", "--verify", "--quiet", &spec])
    }
}

/// Fail if a persisted mirror is bound to a different URL than requested
pub fn check_origin(mirror: &Mirror, requested_url: &str, declared_in: &Path) -> Result<()> {
    if mirror.url() != requested_url {
        return Err(ShakerError::UrlClash {
            name: mirror.name().to_string(),
            previous_url: mirror.url().to_string(),
            previous_declared_in: mirror.path().to_path_buf(),
            url: requested_url.to_string(),
            declared_in: declared_in.to_path_buf(),
        });
    }
    Ok(())
}
