//! Sync engine (C5): pulls remote volumes into the local volume tree over `rsync` run
//! through a remote shell (spec.md §4.5).
use crate::error::{DriverError, Result};
use crate::process::run_as_result;
use std::path::Path;
use std::process::Command;

pub struct SyncPair<'a> {
    pub volume: &'a str,
    pub host: &'a str,
}

fn rsync_command(pair: &SyncPair<'_>, remote_volume_path: &str, local_volumes_root: &Path, ssh_port: u16) -> Command {
    let mut command = Command::new("rsync");
    command
        .args(["-az", "--update", "-e"])
        .arg(format!("ssh -p {}", ssh_port))
        .arg(format!("{}:{}/", pair.host, remote_volume_path))
        .arg(local_volumes_root.join(pair.volume));
    command
}

/// Pulls every `(volume, host)` pair. Errors per pair are collected and returned joined by
/// newline; a failure on one pair does not abort the remaining pairs (spec.md §4.5).
pub fn synchronize(
    pairs: &[SyncPair<'_>],
    remote_volume_path_for: impl Fn(&str) -> String,
    local_volumes_root: &Path,
    ssh_port: u16,
) -> Result<()> {
    let mut errors = Vec::new();
    for pair in pairs {
        let remote_volume_path = remote_volume_path_for(pair.volume);
        let command = rsync_command(pair, &remote_volume_path, local_volumes_root, ssh_port);
        if let Err(failure) = run_as_result(command) {
            errors.push(format!("{}@{}: {}", pair.volume, pair.host, failure.stderr));
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(DriverError::Other(errors.join("\n")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CommandFailure;
    use crate::process::double;
    use serial_test::serial;
    use std::path::PathBuf;

    #[test]
    fn builds_archive_update_compress_command_over_configured_port() {
        let pair = SyncPair { volume: "web", host: "backup-host" };
        let command = rsync_command(&pair, "/var/lib/docker/volumes/web", Path::new("/volumes"), 2222);
        let repr = crate::process::command_repr(&command);
        assert!(repr.contains("-az"));
        assert!(repr.contains("--update"));
        assert!(repr.contains("ssh -p 2222"));
        assert!(repr.contains("backup-host:/var/lib/docker/volumes/web/"));
    }

    #[test]
    #[serial(fakecmd)]
    fn partial_failure_does_not_abort_remaining_pairs_and_joins_errors() {
        let ctx = double::run_context();
        let mut seen = 0;
        ctx.expect().returning(move |_| {
            seen += 1;
            if seen == 1 {
                Err(CommandFailure {
                    command: "rsync".into(),
                    status: "1".into(),
                    stdout: String::new(),
                    stderr: "connection refused".into(),
                })
            } else {
                Ok(String::new())
            }
        });

        let pairs = vec![
            SyncPair { volume: "web", host: "host1" },
            SyncPair { volume: "db", host: "host2" },
        ];
        let result = synchronize(
            &pairs,
            |v| format!("/var/lib/docker/volumes/{}", v),
            &PathBuf::from("/volumes"),
            22,
        );
        let err = result.unwrap_err();
        assert!(err.to_string().contains("web@host1"));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    #[serial(fakecmd)]
    fn all_pairs_succeeding_is_ok() {
        let ctx = double::run_context();
        ctx.expect().returning(|_| Ok(String::new()));
        let pairs = vec![SyncPair { volume: "web", host: "host1" }];
        let result = synchronize(&pairs, |v| format!("/remote/{}", v), &PathBuf::from("/volumes"), 22);
        assert!(result.is_ok());
    }
}
