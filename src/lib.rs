//! Formula dependency resolver and installer
//!
//! Reads `formula-requirements.txt` manifests naming formulas hosted in git
//! repositories, resolves each to a concrete commit across the transitively
//! discovered requirement graph, keeps a local mirror per formula, and links
//! every resolved formula into one flat namespace directory.
//!
//! ```no_run
//! let namespace = shaker::install("/srv/project")?;
//! println!("add {} to file_roots", namespace.display());
//! # Ok::<(), shaker::ShakerError>(())
//! ```

pub mod config;
pub mod error;
pub mod git;
pub mod manifest;
pub mod mirror;
pub mod namespace;
pub mod registry;
pub mod resolver;
pub mod shaker;

pub use config::{LinkMode, ShakerConfig};
pub use error::{Result, ShakerError};
pub use manifest::{ManifestParser, Requirement};
pub use shaker::{install, FormulaOutcome, InstallReport, Outcome, Shaker};
