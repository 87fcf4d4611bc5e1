use std::path::PathBuf;
use thiserror::Error;

/// The structured failure of an external command invocation (btrfs, ssh, rsync).
///
/// Mirrors the exit-code/stdout/stderr triple spec'd for the subvolume facade: callers
/// that need to recover (the send path's full-resend fallback) inspect `stderr` directly
/// rather than re-parsing a formatted message.
#[derive(Debug, Error)]
#[error("command `{command}` failed with {status}: {stderr}")]
pub struct CommandFailure {
    pub command: String,
    pub status: String,
    pub stdout: String,
    pub stderr: String,
}

impl CommandFailure {
    pub fn from_output(command: String, output: &std::process::Output) -> Self {
        Self {
            command,
            status: output
                .status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string()),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }

    pub fn from_spawn_error(command: String, error: std::io::Error) -> Self {
        Self {
            command,
            status: "spawn-failed".to_string(),
            stdout: String::new(),
            stderr: error.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("{0}: no such volume")]
    NoSuchVolume(String),

    #[error("No such snapshot")]
    NoSuchSnapshot,

    #[error("volume names must not contain '@'")]
    InvalidVolumeName,

    #[error("Invalid purge pattern")]
    InvalidPurgePattern,

    #[error(transparent)]
    Command(#[from] CommandFailure),

    #[error("{0}")]
    Other(String),
}

impl DriverError {
    /// The message the §6 wire protocol puts in the `Err` field of a response.
    pub fn wire_message(&self) -> String {
        match self {
            DriverError::Command(c) => c.stderr.clone(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DriverError>;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to read registry file {path:?}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("failed to write registry file {path:?}: {source}")]
    Write { path: PathBuf, source: std::io::Error },
    #[error("malformed registry row {line_no} in {path:?}: {line:?}")]
    Malformed { path: PathBuf, line_no: usize, line: String },
}
