//! Flat namespace directory of resolved formulas
//!
//! Every resolved formula appears as `<namespace>/<name>`, either a symlink
//! to the payload directory inside its mirror or a copy of it. The directory
//! is wiped and rebuilt on every run.

use crate::config::LinkMode;
use crate::error::{Result, ShakerError};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct Namespace {
    dir: PathBuf,
    mode: LinkMode,
}

impl Namespace {
    /// Remove whatever a previous run left at `dir` and recreate it empty
    pub fn prepare(dir: impl Into<PathBuf>, mode: LinkMode) -> Result<Self> {
        let dir = dir.into();

        // Symlinked entries are removed, their targets are not followed
        if dir.symlink_metadata().is_ok() {
            if dir.is_dir() && !dir.is_symlink() {
                fs::remove_dir_all(&dir)?;
            } else {
                fs::remove_file(&dir)?;
            }
        }
        fs::create_dir_all(&dir)?;

        Ok(Self { dir, mode })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn entry_path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Place `payload` at `<namespace>/<name>`. The entry must not exist yet.
    pub fn materialize(&self, name: &str, payload: &Path) -> Result<PathBuf> {
        if !payload.is_dir() {
            return Err(ShakerError::PayloadMissing {
                name: name.to_string(),
                payload: payload.to_path_buf(),
            });
        }

        let target = self.entry_path(name);
        if target.symlink_metadata().is_ok() {
            return Err(ShakerError::NamespaceConflict {
                name: name.to_string(),
                target,
            });
        }

        match self.mode {
            LinkMode::Symlink => link_dir(payload, &target)?,
            LinkMode::Copy => copy_tree(payload, &target)?,
        }
        debug!("{} -> {}", target.display(), payload.display());

        Ok(target)
    }
}

#[cfg(unix)]
fn link_dir(source: &Path, target: &Path) -> Result<()> {
    std::os::unix::fs::symlink(source, target)?;
    Ok(())
}

#[cfg(not(unix))]
fn link_dir(source: &Path, target: &Path) -> Result<()> {
    copy_tree(source, target)
}

/// Recursively copy `source` to `target`, recreating symlinks as symlinks
fn copy_tree(source: &Path, target: &Path) -> Result<()> {
    for entry in WalkDir::new(source).follow_links(false) {
        let entry = entry.map_err(|e| match e.into_io_error() {
            Some(io) => ShakerError::Io(io),
            None => ShakerError::Io(std::io::Error::other("filesystem loop while copying")),
        })?;

        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| ShakerError::Io(std::io::Error::other(e)))?;
        let dest = target.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&dest)?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &dest)?;
        } else {
            fs::copy(entry.path(), &dest)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(source: &Path, dest: &Path) -> Result<()> {
    let link = fs::read_link(source)?;
    std::os::unix::fs::symlink(link, dest)?;
    Ok(())
}

#[cfg(not(unix))]
fn copy_symlink(source: &Path, dest: &Path) -> Result<()> {
    fs::copy(source, dest)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn payload(root: &Path) -> PathBuf {
        let payload = root.join("mirrors/foo-formula/foo");
        fs::create_dir_all(payload.join("files")).unwrap();
        fs::write(payload.join("init.sls"), "foo: pkg.installed").unwrap();
        fs::write(payload.join("files/foo.conf"), "setting = 1").unwrap();
        payload
    }

    #[test]
    fn test_prepare_clears_previous_run() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("_root");
        fs::create_dir_all(dir.join("stale")).unwrap();

        let ns = Namespace::prepare(&dir, LinkMode::Symlink).unwrap();
        assert!(ns.dir().is_dir());
        assert_eq!(fs::read_dir(&dir).unwrap().count(), 0);
    }

    #[test]
    fn test_prepare_keeps_link_targets() {
        let temp = TempDir::new().unwrap();
        let source = payload(temp.path());
        let dir = temp.path().join("_root");

        let ns = Namespace::prepare(&dir, LinkMode::Symlink).unwrap();
        ns.materialize("foo", &source).unwrap();

        Namespace::prepare(&dir, LinkMode::Symlink).unwrap();
        assert!(source.join("init.sls").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_materialize_symlink() {
        let temp = TempDir::new().unwrap();
        let source = payload(temp.path());
        let ns = Namespace::prepare(temp.path().join("_root"), LinkMode::Symlink).unwrap();

        let target = ns.materialize("foo", &source).unwrap();
        assert!(target.symlink_metadata().unwrap().is_symlink());
        assert_eq!(fs::read_link(&target).unwrap(), source);
        assert!(target.join("init.sls").is_file());
    }

    #[test]
    fn test_materialize_copy() {
        let temp = TempDir::new().unwrap();
        let source = payload(temp.path());
        let ns = Namespace::prepare(temp.path().join("_root"), LinkMode::Copy).unwrap();

        let target = ns.materialize("foo", &source).unwrap();
        assert!(!target.symlink_metadata().unwrap().is_symlink());
        assert_eq!(
            fs::read_to_string(target.join("files/foo.conf")).unwrap(),
            "setting = 1"
        );
    }

    #[test]
    fn test_materialize_conflict() {
        let temp = TempDir::new().unwrap();
        let source = payload(temp.path());
        let ns = Namespace::prepare(temp.path().join("_root"), LinkMode::Symlink).unwrap();

        ns.materialize("foo", &source).unwrap();
        let err = ns.materialize("foo", &source).unwrap_err();
        assert!(matches!(err, ShakerError::NamespaceConflict { .. }));
    }

    #[test]
    fn test_materialize_missing_payload() {
        let temp = TempDir::new().unwrap();
        let ns = Namespace::prepare(temp.path().join("_root"), LinkMode::Symlink).unwrap();

        let err = ns
            .materialize("foo", &temp.path().join("mirrors/foo-formula/foo"))
            .unwrap_err();
        assert!(matches!(err, ShakerError::PayloadMissing { .. }));
    }
}
