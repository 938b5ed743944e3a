use std::path::PathBuf;
use thiserror::Error;

/// Every way a run can fail. All of them abort the run.
#[derive(Error, Debug)]
pub enum ShakerError {
    #[error("{}:{line_number}: invalid requirement '{line}': {reason}", .declared_in.display())]
    ManifestParse {
        declared_in: PathBuf,
        line_number: usize,
        line: String,
        reason: String,
    },

    #[error("Failed to read manifest {}", .path.display())]
    ManifestRead {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    #[error(
        "Formula URL clash for {name}:\n- {previous_url} (defined in {})\n+ {url} (defined in {})",
        .previous_declared_in.display(),
        .declared_in.display()
    )]
    UrlClash {
        name: String,
        previous_url: String,
        previous_declared_in: PathBuf,
        url: String,
        declared_in: PathBuf,
    },

    #[error(
        "Formula revision clash for {name}:\n- {previous_revision} <{}> (defined in {})\n+ {revision} <{}> (defined in {})",
        short_hash(.previous_hash),
        .previous_declared_in.display(),
        short_hash(.hash),
        .declared_in.display()
    )]
    RevisionClash {
        name: String,
        previous_revision: String,
        previous_hash: String,
        previous_declared_in: PathBuf,
        revision: String,
        hash: String,
        declared_in: PathBuf,
    },

    #[error(
        "Could not find out what revision '{revision}' was for {url} (defined in {})",
        .declared_in.display()
    )]
    RevisionResolution {
        revision: String,
        url: String,
        declared_in: PathBuf,
    },

    #[error("{name}: target '{}' conflicts with something else", .target.display())]
    NamespaceConflict { name: String, target: PathBuf },

    #[error("{name}: source '{}' does not exist", .payload.display())]
    PayloadMissing { name: String, payload: PathBuf },

    #[error("Failed to fetch {url}: {stderr}")]
    Transport { url: String, stderr: String },

    #[error("git {command} failed: {stderr}")]
    Git { command: String, stderr: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ShakerError>;

/// First seven characters of a commit hash, for messages.
pub fn short_hash(hash: &str) -> &str {
    hash.get(..7).unwrap_or(hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_hash() {
        assert_eq!(short_hash("0123456789abcdef"), "0123456");
        assert_eq!(short_hash("abc"), "abc");
    }

    #[test]
    fn test_revision_clash_message_shortens_hashes() {
        let err = ShakerError::RevisionClash {
            name: "foo".to_string(),
            previous_revision: "v1.0.0".to_string(),
            previous_hash: "1111111aaaaaaa".to_string(),
            previous_declared_in: PathBuf::from("/p/formula-requirements.txt"),
            revision: "dev".to_string(),
            hash: "2222222bbbbbbb".to_string(),
            declared_in: PathBuf::from("/m/bar-formula/formula-requirements.txt"),
        };
        let msg = err.to_string();
        assert!(msg.contains("- v1.0.0 <1111111> (defined in /p/formula-requirements.txt)"));
        assert!(
            msg.contains("+ dev <2222222> (defined in /m/bar-formula/formula-requirements.txt)")
        );
        assert!(!msg.contains("aaaaaaa"));
    }
}
