//! Subvolume facade (C1): the only code in this crate that knows the `btrfs` argv syntax.
use crate::error::{CommandFailure, DriverError, Result};
use crate::process::run_as_result_or;
use std::collections::HashMap;
use std::path::Path;
use std::process::Command;

fn btrfs() -> Command {
    Command::new("btrfs")
}

/// `exists(path) -> bool`. Follows the original's contract exactly: run
/// `btrfs subvolume show` and treat a non-zero exit as "not a subvolume", rather than a
/// bare `Path::exists`, so a plain directory is correctly reported as not-a-volume.
pub fn exists(path: &Path) -> bool {
    let mut command = btrfs();
    command.args(["subvolume", "show"]).arg(path);
    run_as_result_or(command, |_| true).map(|o| o.is_some()).unwrap_or(false)
}

/// `create(path, disable_cow)`. Sets `chattr +C` immediately after creation when
/// `disable_cow` is true (spec.md §4.1).
pub fn create(path: &Path, disable_cow: bool) -> Result<()> {
    let mut command = btrfs();
    command.args(["subvolume", "create"]).arg(path);
    crate::process::run_as_result(command).map_err(DriverError::Command)?;

    if disable_cow {
        let mut chattr = Command::new("chattr");
        chattr.arg("+C").arg(path);
        crate::process::run_as_result(chattr).map_err(DriverError::Command)?;
    }
    Ok(())
}

/// `snapshot(src, dst, readonly)`.
pub fn snapshot(src: &Path, dst: &Path, readonly: bool) -> Result<()> {
    let mut command = btrfs();
    command.args(["subvolume", "snapshot"]);
    if readonly {
        command.arg("-r");
    }
    command.arg(src).arg(dst);
    crate::process::run_as_result(command)
        .map(|_| ())
        .map_err(DriverError::Command)
}

/// `delete(path, must_succeed)`. When `must_succeed` is false, an error whose stderr
/// indicates the path is simply not a subvolume collapses into `Ok(())` — the idempotent
/// cleanup path used for globbed/stale-marker removal (spec.md §4.1, §4.4 step 5).
pub fn delete(path: &Path, must_succeed: bool) -> Result<()> {
    let mut command = btrfs();
    command.args(["subvolume", "delete"]).arg(path);
    let recoverable = |failure: &CommandFailure| {
        !must_succeed
            && (failure.stderr.contains("not a btrfs subvolume") || !path.exists())
    };
    run_as_result_or(command, recoverable)
        .map(|_| ())
        .map_err(DriverError::Command)
}

/// `show(path) -> map`. Parses the `key: value` header lines `btrfs subvolume show`
/// prints before the `Snapshot(s):` footer.
pub fn show(path: &Path) -> Result<HashMap<String, String>> {
    let mut command = btrfs();
    command.args(["subvolume", "show"]).arg(path);
    let output = crate::process::run_as_result(command).map_err(DriverError::Command)?;
    Ok(output
        .lines()
        .skip(1)
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .take_while(|(k, _)| k != "Snapshot(s)")
        .collect())
}

/// `label(fs_path) -> String`.
pub fn label(fs_path: &Path) -> Result<String> {
    let mut command = btrfs();
    command.args(["filesystem", "label"]).arg(fs_path);
    crate::process::run_as_result(command)
        .map(|s| s.trim().to_string())
        .map_err(DriverError::Command)
}

/// Forces a filesystem sync, used by the send engine (C4) as a workaround for a
/// known send/receive race (spec.md §4.4 step 2).
pub fn sync_filesystem(path: &Path) -> Result<()> {
    let mut command = btrfs();
    command.args(["filesystem", "sync"]).arg(path);
    crate::process::run_as_result(command)
        .map(|_| ())
        .map_err(DriverError::Command)
}

/// Lists entries directly under `root` that are themselves valid subvolumes.
pub fn list_subvolumes(root: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    let entries = std::fs::read_dir(root).map_err(|e| DriverError::Other(e.to_string()))?;
    for entry in entries {
        let entry = entry.map_err(|e| DriverError::Other(e.to_string()))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name == crate::paths::METADATA_DB {
            continue;
        }
        if exists(&entry.path()) {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::double;
    use serial_test::serial;

    #[test]
    #[serial(fakecmd)]
    fn show_parses_header_lines() {
        let ctx = double::run_context();
        ctx.expect().returning(|_| {
            Ok(indoc::indoc!(
                r#"
                /data/web
                	Name: 			web
                	UUID: 			0c61d287-c754-2944-a71e-ee6f0cbfb40e
                	Parent UUID: 		-
                Snapshot(s):
                "#
            )
            .to_string())
        });
        let parsed = show(Path::new("/data/web")).unwrap();
        assert_eq!(parsed.get("UUID").unwrap(), "0c61d287-c754-2944-a71e-ee6f0cbfb40e");
    }

    #[test]
    #[serial(fakecmd)]
    fn delete_not_must_succeed_swallows_missing_subvolume() {
        let ctx = double::run_context();
        ctx.expect().returning(|_| {
            Err(CommandFailure {
                command: "btrfs subvolume delete /tmp/nope".into(),
                status: "1".into(),
                stdout: String::new(),
                stderr: "ERROR: cannot delete '/tmp/nope' - not a btrfs subvolume".into(),
            })
        });
        assert!(delete(Path::new("/tmp/nope"), false).is_ok());
    }

    #[test]
    #[serial(fakecmd)]
    fn delete_must_succeed_propagates_error() {
        let ctx = double::run_context();
        ctx.expect().returning(|_| {
            Err(CommandFailure {
                command: "btrfs subvolume delete /tmp/nope".into(),
                status: "1".into(),
                stdout: String::new(),
                stderr: "ERROR: cannot delete '/tmp/nope' - not a btrfs subvolume".into(),
            })
        });
        assert!(delete(Path::new("/tmp/nope"), true).is_err());
    }
}
