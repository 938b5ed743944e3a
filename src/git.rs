//! Thin wrapper around the system `git` binary

use crate::error::{Result, ShakerError};
use std::env;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

const NOT_FOUND_STATUS: i32 = 1;

/// Runs git commands inside one working directory
#[derive(Debug, Clone)]
pub struct Git {
    dir: PathBuf,
    ssh_command: Option<String>,
}

impl Git {
    /// `ssh_command` is exported as `GIT_SSH_COMMAND` unless the caller's
    /// environment already configures `GIT_SSH_COMMAND` or `GIT_SSH`.
    pub fn new(dir: impl Into<PathBuf>, ssh_command: Option<&str>) -> Self {
        let ssh_command = ssh_command
            .filter(|_| {
                env::var_os("GIT_SSH_COMMAND").is_none() && env::var_os("GIT_SSH").is_none()
            })
            .map(str::to_string);

        Self {
            dir: dir.into(),
            ssh_command,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `git init` the working directory, creating it if needed
    pub fn init(&self) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        self.run(&["init", "--quiet"])?;
        Ok(())
    }

    /// Run a command that must succeed, returning trimmed stdout
    pub fn run(&self, args: &[&str]) -> Result<String> {
        let output = self.output(args)?;
        if !output.status.success() {
            return Err(git_error(args, &output));
        }
        Ok(stdout_of(&output))
    }

    /// Run a lookup-style command (`rev-parse --verify --quiet`, `config --get`).
    /// Exit status 1 means "not found"; any other failure is an error.
    pub fn query(&self, args: &[&str]) -> Result<Option<String>> {
        let output = self.output(args)?;
        match output.status.code() {
            Some(0) => {}
            Some(NOT_FOUND_STATUS) => return Ok(None),
            _ => return Err(git_error(args, &output)),
        }
        let stdout = stdout_of(&output);
        Ok((!stdout.is_empty()).then_some(stdout))
    }

    /// Run a command against a remote; failures become transport errors
    pub fn run_remote(&self, url: &str, args: &[&str]) -> Result<()> {
        let output = self.output(args)?;
        if !output.status.success() {
            return Err(ShakerError::Transport {
                url: url.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }

    fn output(&self, args: &[&str]) -> Result<Output> {
        tracing::trace!("git {} (in {})", args.join(" "), self.dir.display());

        let mut cmd = Command::new("git");
        // Repository discovery must start from `dir`, not an inherited GIT_DIR
        cmd.args(args)
            .current_dir(&self.dir)
            .env_remove("GIT_DIR")
            .env_remove("GIT_WORK_TREE")
            .env_remove("GIT_INDEX_FILE");
        if let Some(ssh) = &self.ssh_command {
            cmd.env("GIT_SSH_COMMAND", ssh);
        }

        cmd.output().map_err(|e| ShakerError::Git {
            command: args.join(" "),
            stderr: format!("failed to execute git: {}", e),
        })
    }
}

fn git_error(args: &[&str], output: &Output) -> ShakerError {
    ShakerError::Git {
        command: args.join(" "),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    }
}

fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}
