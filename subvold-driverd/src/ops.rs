//! Binds the config-free operations in `subvold_core` to a loaded [`DriverConfig`]. Both
//! the HTTP handlers (on-demand calls) and the scheduler (timer-driven calls) go through
//! this module so behavior is identical regardless of who triggered the action
//! (spec.md §2).
use chrono::Local;
use slog::Logger;
use std::path::{Path, PathBuf};
use subvold_core::config::DriverConfig;
use subvold_core::error::{DriverError, RegistryError, Result};
use subvold_core::paths::{self, split_stamp};
use subvold_core::pause::PauseMarker;
use subvold_core::purge;
use subvold_core::registry::{Registry, ScheduledJob};
use subvold_core::send::{send, SendTarget};
use subvold_core::subvolume;
use subvold_core::sync::{synchronize, SyncPair};

pub struct Ops {
    pub config: DriverConfig,
    pub log: Logger,
}

impl Ops {
    pub fn new(config: DriverConfig, log: Logger) -> Self {
        Self { config, log }
    }

    fn volume_path(&self, name: &str) -> PathBuf {
        paths::volume_path(&self.config.volumes_path, name)
    }

    fn snapshot_path(&self, name: &str) -> PathBuf {
        paths::snapshot_path(&self.config.snapshots_path, name)
    }

    /// The root a `Test`-flagged operation (`Send`, `Purge`, `Sync`) reads/writes instead
    /// of the real volumes/snapshots tree (spec.md §6 `Test?`, §8 scenarios 2/5).
    fn root_for(&self, test: bool) -> &Path {
        if test {
            &self.config.test_remote_path
        } else {
            &self.config.snapshots_path
        }
    }

    fn no_such_volume(&self, name: &str) -> DriverError {
        DriverError::NoSuchVolume(name.to_string())
    }

    pub fn create_volume(&self, name: &str) -> Result<()> {
        paths::validate_volume_name(name)?;
        let path = self.volume_path(name);
        if subvolume::exists(&path) {
            return Ok(());
        }
        subvolume::create(&path, true)
    }

    pub fn remove_volume(&self, name: &str) -> Result<()> {
        let path = self.volume_path(name);
        subvolume::delete(&path, true).map_err(|_| self.no_such_volume(name))
    }

    pub fn mountpoint(&self, name: &str) -> Result<PathBuf> {
        let path = self.volume_path(name);
        if subvolume::exists(&path) {
            Ok(path)
        } else {
            Err(self.no_such_volume(name))
        }
    }

    pub fn list_volumes(&self) -> Result<Vec<String>> {
        subvolume::list_subvolumes(&self.config.volumes_path)
    }

    /// Creates a read-only snapshot of `name` stamped with the current time; returns the
    /// stamped name (spec.md §4.7 `Snapshot`).
    pub fn snapshot(&self, name: &str) -> Result<String> {
        let source = self.volume_path(name);
        if !subvolume::exists(&source) {
            return Err(self.no_such_volume(name));
        }
        let stamped = paths::stamped_snapshot_name(name, Local::now(), &self.config.dtformat);
        let dest = self.snapshot_path(&stamped);
        subvolume::snapshot(&source, &dest, true)?;
        Ok(stamped)
    }

    /// Lists entries under `<SnapshotsRoot>`, optionally filtered to `base@...` names.
    pub fn list_snapshots(&self, base: Option<&str>) -> Result<Vec<String>> {
        Self::list_snapshots_in(&self.config.snapshots_path, base)
    }

    fn list_snapshots_in(root: &Path, base: Option<&str>) -> Result<Vec<String>> {
        let mut names: Vec<String> = std::fs::read_dir(root)
            .map_err(|e| DriverError::Other(e.to_string()))?
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|name| match base {
                Some(base) => name.starts_with(&format!("{}@", base)),
                None => true,
            })
            .collect();
        names.sort();
        Ok(names)
    }

    pub fn remove_snapshot(&self, name: &str) -> Result<()> {
        let path = self.snapshot_path(name);
        subvolume::delete(&path, true).map_err(|_| DriverError::NoSuchSnapshot)
    }

    fn latest_snapshot_for(&self, base: &str) -> Result<Option<String>> {
        let mut matching = self.list_snapshots(Some(base))?;
        matching.retain(|n| split_stamp(n).map(|s| !s.is_marker()).unwrap_or(false));
        matching.sort();
        Ok(matching.into_iter().next_back())
    }

    /// `Snapshot.Restore`: returns the backup snapshot name, if one was taken.
    pub fn restore(&self, name: &str, target: Option<&str>) -> Result<Option<String>> {
        let source_name = if split_stamp(name).is_some() {
            Some(name.to_string())
        } else {
            self.latest_snapshot_for(name)?
        };
        let source_name = match source_name {
            Some(n) => n,
            None => return Ok(None),
        };
        let source_base = split_stamp(&source_name).expect("validated above").base.to_string();
        let target_name = target.map(str::to_string).unwrap_or(source_base);
        let target_path = self.volume_path(&target_name);

        let backup = if subvolume::exists(&target_path) {
            let backup_name = paths::stamped_snapshot_name(&target_name, Local::now(), &self.config.dtformat);
            let backup_path = self.snapshot_path(&backup_name);
            subvolume::snapshot(&target_path, &backup_path, true)?;
            subvolume::delete(&target_path, true)?;
            Some(backup_name)
        } else {
            None
        };

        subvolume::snapshot(&self.snapshot_path(&source_name), &target_path, false)?;
        Ok(backup)
    }

    /// `Clone`: writable snapshot of an existing volume under a new name.
    pub fn clone_volume(&self, name: &str, target: &str) -> Result<String> {
        paths::validate_volume_name(target)?;
        let source = self.volume_path(name);
        if !subvolume::exists(&source) {
            return Err(self.no_such_volume(name));
        }
        let dest = self.volume_path(target);
        subvolume::snapshot(&source, &dest, false)?;
        Ok(target.to_string())
    }

    /// `Snapshot.Send` — see `subvold_core::send`. Assumes the remote host mirrors this
    /// host's `<SnapshotsRoot>` convention (see DESIGN.md). `test` redirects the remote
    /// destination to `<TestRemoteRoot>` instead of the real remote root (spec.md §8
    /// scenario 2).
    pub fn send_snapshot(&self, name: &str, host: &str, test: bool) -> Result<()> {
        let split = split_stamp(name).ok_or_else(|| DriverError::Other(format!("`{}` is not a snapshot name", name)))?;
        let remote_root = self.root_for(test).to_string_lossy();
        let target = SendTarget {
            host,
            port: self.config.ssh_port,
            remote_root: remote_root.as_ref(),
        };
        send(&self.config.snapshots_path, split.base, split.timestamp, &target)
    }

    /// `Snapshots.Purge` — returns the names removed (or that would have been removed
    /// under `dryrun`). `test` purges `<TestRemoteRoot>` instead of the real
    /// `<SnapshotsRoot>` (spec.md §6 `Test?`).
    pub fn purge(&self, base: &str, pattern: &str, dryrun: bool, test: bool) -> Result<Vec<String>> {
        let root = self.root_for(test);
        let candidates = Self::list_snapshots_in(root, Some(base))?;
        let candidate_names: Vec<&str> = candidates
            .iter()
            .filter(|n| split_stamp(n).map(|s| !s.is_marker()).unwrap_or(false))
            .map(String::as_str)
            .collect();
        let doomed = purge::evaluate(candidate_names, pattern, Local::now().naive_local(), &self.config.dtformat)?;
        let mut removed: Vec<String> = doomed.into_iter().collect();
        removed.sort();
        if !dryrun {
            for name in &removed {
                subvolume::delete(&root.join(name), false)?;
            }
        }
        Ok(removed)
    }

    /// `Volume.Sync` — pulls every `(volume, host)` combination (the full cross product
    /// of the two lists, per spec.md §6's flat `Volumes`/`Hosts` request shape). `test`
    /// pulls into `<TestRemoteRoot>` instead of the real `<VolumesRoot>` (spec.md §8
    /// scenario 5).
    pub fn sync_volumes(&self, volumes: &[String], hosts: &[String], test: bool) -> Result<()> {
        let pairs: Vec<SyncPair> = volumes
            .iter()
            .flat_map(|v| hosts.iter().map(move |h| SyncPair { volume: v, host: h }))
            .collect();
        let volumes_path = self.config.volumes_path.clone();
        let test_remote = self.config.test_remote_path.clone();
        let local_root = if test { test_remote } else { volumes_path.clone() };
        synchronize(
            &pairs,
            move |volume| volumes_path.join(volume).to_string_lossy().into_owned(),
            &local_root,
            self.config.ssh_port,
        )
    }

    fn registry(&self) -> Registry {
        Registry::new(self.config.schedule_path.clone())
    }

    pub fn schedule_upsert(&self, name: &str, action: &str, timer_minutes: u64) -> std::result::Result<(), RegistryError> {
        self.registry().upsert(name, action, timer_minutes)
    }

    pub fn schedule_list(&self) -> std::result::Result<Vec<ScheduledJob>, RegistryError> {
        self.registry().list()
    }

    fn pause_marker(&self) -> PauseMarker {
        PauseMarker::beside_registry(&self.config.schedule_path)
    }

    pub fn schedule_pause(&self) -> std::io::Result<()> {
        self.pause_marker().pause()
    }

    pub fn schedule_resume(&self) -> std::io::Result<()> {
        self.pause_marker().resume()
    }

    pub fn is_paused(&self) -> bool {
        self.pause_marker().is_paused()
    }
}
