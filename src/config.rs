//! Run configuration and on-disk layout
//!
//! Paths are derived from a project root:
//!
//! - `<root>/formula-requirements.txt` - the root manifest
//! - `<root>/vendor/formula-repos/<name>-formula/` - persistent mirrors
//! - `<root>/vendor/_root/<name>` - namespace links, rebuilt each run

use crate::error::{Result, ShakerError};
use std::path::{Path, PathBuf};

pub const DEFAULT_VENDOR_DIR: &str = "vendor";
pub const DEFAULT_MIRRORS_DIR: &str = "formula-repos";
pub const DEFAULT_NAMESPACE_DIR: &str = "_root";
pub const DEFAULT_MANIFEST_NAME: &str = "formula-requirements.txt";
pub const DEFAULT_REVISION: &str = "master";
pub const DEFAULT_SSH_COMMAND: &str = "ssh -o VisualHostKey=no";

/// How resolved formulas are placed into the namespace directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkMode {
    /// `<namespace>/<name>` is a symlink into the mirror
    #[default]
    Symlink,
    /// `<namespace>/<name>` is a copy of the payload tree
    Copy,
}

impl LinkMode {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "symlink" | "link" => Ok(LinkMode::Symlink),
            "copy" => Ok(LinkMode::Copy),
            other => Err(ShakerError::Config(format!(
                "unknown link mode '{}' (expected 'symlink' or 'copy')",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ShakerConfig {
    pub root_dir: PathBuf,
    pub vendor_dir: PathBuf,
    pub mirrors_dir: PathBuf,
    pub namespace_dir: PathBuf,
    pub manifest_name: String,
    pub default_revision: String,
    /// Explicit pins in the root manifest win over nested requirements
    pub override_from_top_level: bool,
    pub link_mode: LinkMode,
    /// Exported as `GIT_SSH_COMMAND` unless the environment already picks an ssh
    pub git_ssh_command: Option<String>,
}

impl ShakerConfig {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            vendor_dir: PathBuf::from(DEFAULT_VENDOR_DIR),
            mirrors_dir: PathBuf::from(DEFAULT_MIRRORS_DIR),
            namespace_dir: PathBuf::from(DEFAULT_NAMESPACE_DIR),
            manifest_name: DEFAULT_MANIFEST_NAME.to_string(),
            default_revision: DEFAULT_REVISION.to_string(),
            override_from_top_level: true,
            link_mode: LinkMode::Symlink,
            git_ssh_command: Some(DEFAULT_SSH_COMMAND.to_string()),
        }
    }

    /// Build a config for `root_dir`, applying `SHAKER_*` environment overrides
    pub fn from_env(root_dir: impl Into<PathBuf>) -> Result<Self> {
        Self::from_lookup(root_dir, |key| std::env::var(key).ok())
    }

    /// Same as [`ShakerConfig::from_env`] with an explicit variable lookup
    pub fn from_lookup<F>(root_dir: impl Into<PathBuf>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new(root_dir);

        if let Some(vendor) = lookup("SHAKER_VENDOR_DIR").filter(|v| !v.is_empty()) {
            config.vendor_dir = PathBuf::from(vendor);
        }
        if let Some(revision) = lookup("SHAKER_DEFAULT_REVISION").filter(|v| !v.is_empty()) {
            config.default_revision = revision;
        }
        if let Some(mode) = lookup("SHAKER_LINK_MODE") {
            config.link_mode = LinkMode::parse(&mode)?;
        }
        if lookup("SHAKER_NO_OVERRIDE").is_some_and(|v| v != "0") {
            config.override_from_top_level = false;
        }

        Ok(config)
    }

    pub fn root_manifest(&self) -> PathBuf {
        self.root_dir.join(&self.manifest_name)
    }

    pub fn mirrors_path(&self) -> PathBuf {
        self.root_dir.join(&self.vendor_dir).join(&self.mirrors_dir)
    }

    pub fn namespace_path(&self) -> PathBuf {
        self.root_dir.join(&self.vendor_dir).join(&self.namespace_dir)
    }

    /// Mirror directory for a formula: `<mirrors>/<name>-formula`
    pub fn mirror_path(&self, name: &str) -> PathBuf {
        self.mirrors_path().join(format!("{}-formula", name))
    }

    /// Manifest files a formula may carry, in lookup order
    pub fn nested_manifest_candidates(&self, mirror_dir: &Path, name: &str) -> [PathBuf; 2] {
        [
            mirror_dir.join(&self.manifest_name),
            mirror_dir.join(name).join(&self.manifest_name),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_layout() {
        let config = ShakerConfig::new("/srv/project");
        assert_eq!(
            config.root_manifest(),
            PathBuf::from("/srv/project/formula-requirements.txt")
        );
        assert_eq!(
            config.mirrors_path(),
            PathBuf::from("/srv/project/vendor/formula-repos")
        );
        assert_eq!(
            config.namespace_path(),
            PathBuf::from("/srv/project/vendor/_root")
        );
        assert_eq!(
            config.mirror_path("ntp"),
            PathBuf::from("/srv/project/vendor/formula-repos/ntp-formula")
        );
        assert!(config.override_from_top_level);
        assert_eq!(config.link_mode, LinkMode::Symlink);
    }

    #[test]
    fn test_env_overrides() {
        let config = ShakerConfig::from_lookup(
            "/p",
            lookup_from(&[
                ("SHAKER_VENDOR_DIR", "third_party"),
                ("SHAKER_DEFAULT_REVISION", "main"),
                ("SHAKER_LINK_MODE", "Copy"),
                ("SHAKER_NO_OVERRIDE", "1"),
            ]),
        )
        .unwrap();

        assert_eq!(config.namespace_path(), PathBuf::from("/p/third_party/_root"));
        assert_eq!(config.default_revision, "main");
        assert_eq!(config.link_mode, LinkMode::Copy);
        assert!(!config.override_from_top_level);
    }

    #[test]
    fn test_no_override_zero_keeps_default() {
        let config =
            ShakerConfig::from_lookup("/p", lookup_from(&[("SHAKER_NO_OVERRIDE", "0")])).unwrap();
        assert!(config.override_from_top_level);
    }

    #[test]
    fn test_invalid_link_mode() {
        let err = ShakerConfig::from_lookup("/p", lookup_from(&[("SHAKER_LINK_MODE", "hardlink")]))
            .unwrap_err();
        assert!(matches!(err, ShakerError::Config(_)));
    }

    #[test]
    fn test_nested_manifest_candidates() {
        let config = ShakerConfig::new("/p");
        let mirror = config.mirror_path("bar");
        let [root, payload] = config.nested_manifest_candidates(&mirror, "bar");
        assert!(root.ends_with("bar-formula/formula-requirements.txt"));
        assert!(payload.ends_with("bar-formula/bar/formula-requirements.txt"));
    }
}
