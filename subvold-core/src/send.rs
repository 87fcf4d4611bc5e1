//! Send engine (C4): incremental snapshot replication to a remote host, falling back to a
//! full resend when the parent-based incremental fails (spec.md §4.4).
use crate::error::{DriverError, Result};
use crate::paths::split_stamp;
use crate::process::{run_as_result, run_piped};
use crate::subvolume;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Where a send lands: a trusted remote host/port/root (from configuration, not from the
/// request), distinct from the snapshot name, which is untrusted and validated separately.
pub struct SendTarget<'a> {
    pub host: &'a str,
    pub port: u16,
    pub remote_root: &'a str,
}

/// Characters allowed in a value interpolated into the remote command string run over
/// `ssh` (spec.md §9: the snapshot name must be validated to exclude shell metacharacters
/// since the remote side has no argv boundary to protect it).
fn validate_remote_safe(value: &str) -> Result<()> {
    let ok = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'));
    if ok {
        Ok(())
    } else {
        Err(DriverError::Other(format!(
            "`{}` is not safe to interpolate into a remote command",
            value
        )))
    }
}

/// Enumerates `Base@Ts'@Host` markers under `snapshots_root`, ascending by `Ts'`.
fn markers_for(snapshots_root: &Path, base: &str, host: &str) -> Result<Vec<String>> {
    let mut names: Vec<String> = std::fs::read_dir(snapshots_root)
        .map_err(|e| DriverError::Other(e.to_string()))?
        .filter_map(|e| e.ok())
        .filter_map(|e| e.file_name().into_string().ok())
        .filter(|name| {
            split_stamp(name)
                .map(|s| s.base == base && s.host == Some(host))
                .unwrap_or(false)
        })
        .collect();
    names.sort_by_key(|name| split_stamp(name).map(|s| s.timestamp.to_string()).unwrap_or_default());
    Ok(names)
}

fn marker_parent_ts(markers: &[String]) -> Option<&str> {
    markers.last().and_then(|m| split_stamp(m)).map(|s| s.timestamp)
}

fn receive_command_string(target: &SendTarget<'_>) -> String {
    format!("btrfs receive {}", target.remote_root)
}

fn delete_command_string(target: &SendTarget<'_>, remote_name: &str) -> String {
    format!("btrfs subvolume delete {}/{}", target.remote_root, remote_name)
}

fn ssh_command(target: &SendTarget<'_>, remote_command: String) -> Command {
    let mut command = Command::new("ssh");
    command
        .args(["-p", &target.port.to_string()])
        .arg(target.host)
        .arg(remote_command);
    command
}

fn btrfs_send_command(snapshot_path: &Path, parent_path: Option<&Path>) -> Command {
    let mut command = Command::new("btrfs");
    command.arg("send");
    if let Some(parent) = parent_path {
        command.arg("-p").arg(parent);
    }
    command.arg(snapshot_path);
    command
}

/// Runs the full send procedure for `base@ts` against `target`.
///
/// `snapshots_root` holds both plain snapshots and host-tagged markers side by side. On
/// success this creates the new `base@ts@host` marker and deletes the markers it
/// supersedes; on failure the local snapshot tree is left untouched.
pub fn send(snapshots_root: &Path, base: &str, ts: &str, target: &SendTarget<'_>) -> Result<()> {
    validate_remote_safe(base)?;
    validate_remote_safe(ts)?;
    validate_remote_safe(target.host)?;

    let snapshot_name = format!("{}@{}", base, ts);
    let snapshot_path = snapshots_root.join(&snapshot_name);
    let marker_name = format!("{}@{}", snapshot_name, target.host);

    let superseded_markers = markers_for(snapshots_root, base, target.host)?;
    let parent_path: Option<PathBuf> =
        marker_parent_ts(&superseded_markers).map(|parent_ts| snapshots_root.join(format!("{}@{}", base, parent_ts)));

    subvolume::sync_filesystem(snapshots_root)?;

    let attempt = run_piped(
        btrfs_send_command(&snapshot_path, parent_path.as_deref()),
        ssh_command(target, receive_command_string(target)),
    );

    if let Err(failure) = attempt {
        slog_scope::warn!(
            "incremental send failed, attempting full resend";
            "base" => base, "ts" => ts, "host" => target.host,
            "stdout" => %failure.stdout, "stderr" => %failure.stderr,
        );

        // Best-effort: the partial receive may not have left anything behind at all.
        let _ = run_as_result(ssh_command(target, delete_command_string(target, &snapshot_name)));

        run_piped(
            btrfs_send_command(&snapshot_path, None),
            ssh_command(target, receive_command_string(target)),
        )
        .map_err(DriverError::Command)?;
    }

    subvolume::snapshot(&snapshot_path, &snapshots_root.join(&marker_name), true)?;
    for old_marker in &superseded_markers {
        subvolume::delete(&snapshots_root.join(old_marker), false)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CommandFailure;
    use crate::process::double;
    use serial_test::serial;
    use tempfile::tempdir;

    #[test]
    fn rejects_shell_metacharacters_in_host() {
        let dir = tempdir().unwrap();
        let target = SendTarget {
            host: "evil; rm -rf /",
            port: 22,
            remote_root: "/remote",
        };
        assert!(send(dir.path(), "web", "2021-01-01T00:00:00.000000", &target).is_err());
    }

    #[test]
    fn no_markers_means_no_parent() {
        let dir = tempdir().unwrap();
        let markers = markers_for(dir.path(), "web", "backup-host").unwrap();
        assert!(markers.is_empty());
        assert!(marker_parent_ts(&markers).is_none());
    }

    #[test]
    fn markers_for_filters_by_base_and_host_ascending() {
        let dir = tempdir().unwrap();
        for name in [
            "web@2021-01-02T00:00:00.000000@backup-host",
            "web@2021-01-01T00:00:00.000000@backup-host",
            "web@2021-01-01T00:00:00.000000@other-host",
            "db@2021-01-03T00:00:00.000000@backup-host",
            "web@2021-01-03T00:00:00.000000", // plain snapshot, not a marker
        ] {
            std::fs::create_dir(dir.path().join(name)).unwrap();
        }
        let markers = markers_for(dir.path(), "web", "backup-host").unwrap();
        assert_eq!(
            markers,
            vec![
                "web@2021-01-01T00:00:00.000000@backup-host".to_string(),
                "web@2021-01-02T00:00:00.000000@backup-host".to_string(),
            ]
        );
        assert_eq!(marker_parent_ts(&markers), Some("2021-01-02T00:00:00.000000"));
    }

    #[test]
    #[serial(fakecmd)]
    fn successful_incremental_send_creates_marker_and_drops_old_ones() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("web@2021-01-02T00:00:00.000000")).unwrap();
        std::fs::create_dir(dir.path().join("web@2021-01-01T00:00:00.000000@backup-host")).unwrap();

        let run_ctx = double::run_context();
        run_ctx.expect().returning(|_| Ok(String::new()));
        let piped_ctx = double::run_piped_context();
        piped_ctx.expect().returning(|_, _| Ok(String::new()));

        let target = SendTarget {
            host: "backup-host",
            port: 22,
            remote_root: "/remote/volumes",
        };
        let result = send(dir.path(), "web", "2021-01-02T00:00:00.000000", &target);
        assert!(result.is_ok());
    }

    #[test]
    #[serial(fakecmd)]
    fn full_resend_fallback_runs_when_incremental_fails() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("web@2021-01-02T00:00:00.000000")).unwrap();

        let run_ctx = double::run_context();
        run_ctx.expect().returning(|_| Ok(String::new()));

        let piped_ctx = double::run_piped_context();
        let mut call_count = 0;
        piped_ctx.expect().returning(move |_, _| {
            call_count += 1;
            if call_count == 1 {
                Err(CommandFailure {
                    command: "btrfs send | ssh".into(),
                    status: "1".into(),
                    stdout: String::new(),
                    stderr: "ERROR: parent subvol missing".into(),
                })
            } else {
                Ok(String::new())
            }
        });

        let target = SendTarget {
            host: "backup-host",
            port: 22,
            remote_root: "/remote/volumes",
        };
        let result = send(dir.path(), "web", "2021-01-02T00:00:00.000000", &target);
        assert!(result.is_ok());
    }
}
