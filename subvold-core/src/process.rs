//! Thin wrapper around external command execution.
//!
//! Every external tool (`btrfs`, `ssh`, `rsync`, `chattr`) is invoked here as an argv
//! vector, never through a shell (spec.md §9 "Shelling out"). The `double` module follows
//! the teacher's mockall pattern so `Subvolume` et al. can be unit tested without a real
//! btrfs binary on the test host.
use crate::error::CommandFailure;
use std::process::{Command, Output, Stdio};

pub fn command_repr(command: &Command) -> String {
    std::iter::once(command.get_program())
        .chain(command.get_args())
        .map(|a| a.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Runs `command` to completion and returns its stdout as UTF-8 on success, or a
/// [`CommandFailure`] carrying exit code/stdout/stderr on a non-zero exit.
pub fn run_as_result(command: Command) -> Result<String, CommandFailure> {
    double::run(command)
}

/// Like [`run_as_result`] but collapses an error satisfying `recoverable` into `Ok(None)`
/// — used by `delete(path, must_succeed = false)` to treat "no such subvolume" as success.
pub fn run_as_result_or<F>(command: Command, recoverable: F) -> Result<Option<String>, CommandFailure>
where
    F: FnOnce(&CommandFailure) -> bool,
{
    match run_as_result(command) {
        Ok(out) => Ok(Some(out)),
        Err(e) if recoverable(&e) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Pipes `upstream`'s stdout into `downstream`'s stdin, the way a shell's `|` would, but
/// without a shell in between (spec.md §9). Used for `btrfs send ... | ssh ... receive`.
/// Both legs are waited on; either side failing fails the whole pipeline.
pub fn run_piped(upstream: Command, downstream: Command) -> Result<String, CommandFailure> {
    double::run_piped(upstream, downstream)
}

#[cfg_attr(test, mockall::automock)]
pub mod double {
    use super::*;

    pub fn run(mut command: Command) -> Result<String, CommandFailure> {
        let repr = command_repr(&command);
        let output: Output = command
            .output()
            .map_err(|e| CommandFailure::from_spawn_error(repr.clone(), e))?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(CommandFailure::from_output(repr, &output))
        }
    }

    pub fn run_piped(mut upstream: Command, mut downstream: Command) -> Result<String, CommandFailure> {
        let upstream_repr = command_repr(&upstream);
        let downstream_repr = command_repr(&downstream);
        let pipeline_repr = format!("{} | {}", upstream_repr, downstream_repr);

        upstream.stdout(Stdio::piped());
        let mut upstream_child = upstream
            .spawn()
            .map_err(|e| CommandFailure::from_spawn_error(pipeline_repr.clone(), e))?;
        let upstream_stdout = upstream_child
            .stdout
            .take()
            .expect("upstream spawned with a piped stdout");

        downstream.stdin(Stdio::from(upstream_stdout));
        let downstream_output = downstream
            .output()
            .map_err(|e| CommandFailure::from_spawn_error(pipeline_repr.clone(), e))?;
        let upstream_status = upstream_child
            .wait()
            .map_err(|e| CommandFailure::from_spawn_error(pipeline_repr.clone(), e))?;

        if !upstream_status.success() {
            return Err(CommandFailure {
                command: pipeline_repr,
                status: upstream_status
                    .code()
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "signal".to_string()),
                stdout: String::new(),
                stderr: format!("upstream `{}` exited non-zero", upstream_repr),
            });
        }
        if !downstream_output.status.success() {
            return Err(CommandFailure::from_output(pipeline_repr, &downstream_output));
        }
        Ok(String::from_utf8_lossy(&downstream_output.stdout).into_owned())
    }
}
