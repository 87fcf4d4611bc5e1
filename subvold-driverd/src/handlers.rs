//! C7: one function per endpoint in spec.md §6. Each takes a typed request and returns a
//! typed response that always carries `Err` (empty string on success).
use crate::ops::Ops;
use serde::{Deserialize, Serialize};
use slog::{info, warn};
use std::sync::Arc;

fn err_message<E: std::fmt::Display>(e: &E) -> String {
    e.to_string()
}

#[derive(Debug, Deserialize)]
pub struct NameRequest {
    #[serde(rename = "Name")]
    pub name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ErrResponse {
    pub err: String,
}

impl ErrResponse {
    fn ok() -> Self {
        Self { err: String::new() }
    }
    fn fail(message: String) -> Self {
        Self { err: message }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct MountResponse {
    pub mountpoint: String,
    pub err: String,
}

#[derive(Debug, Serialize)]
pub struct VolumeInfo {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Mountpoint")]
    pub mountpoint: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetResponse {
    pub volume: VolumeInfo,
    pub err: String,
}

#[derive(Debug, Serialize)]
pub struct VolumeEntry {
    #[serde(rename = "Name")]
    pub name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListResponse {
    pub volumes: Vec<VolumeEntry>,
    pub err: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SnapshotResponse {
    pub snapshot: String,
    pub err: String,
}

#[derive(Debug, Deserialize)]
pub struct SnapshotListRequest {
    #[serde(rename = "Name")]
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SnapshotListResponse {
    pub snapshots: Vec<String>,
    pub err: String,
}

#[derive(Debug, Deserialize)]
pub struct SnapshotRestoreRequest {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Target")]
    pub target: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SnapshotRestoreResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_backup: Option<String>,
    pub err: String,
}

#[derive(Debug, Deserialize)]
pub struct CloneRequest {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Target")]
    pub target: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CloneResponse {
    pub volume_cloned: String,
    pub err: String,
}

#[derive(Debug, Deserialize)]
pub struct SnapshotSendRequest {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Host")]
    pub host: String,
    #[serde(rename = "Test", default)]
    pub test: bool,
}

#[derive(Debug, Deserialize)]
pub struct PurgeRequest {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Pattern")]
    pub pattern: String,
    #[serde(rename = "Dryrun", default)]
    pub dryrun: bool,
    #[serde(rename = "Test", default)]
    pub test: bool,
}

#[derive(Debug, Deserialize)]
pub struct VolumeSyncRequest {
    #[serde(rename = "Volumes")]
    pub volumes: Vec<String>,
    #[serde(rename = "Hosts")]
    pub hosts: Vec<String>,
    #[serde(rename = "Test", default)]
    pub test: bool,
}

#[derive(Debug, Deserialize)]
pub struct ScheduleRequest {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Action")]
    pub action: String,
    #[serde(rename = "Timer")]
    pub timer: u64,
}

#[derive(Debug, Serialize)]
pub struct ScheduleEntry {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Action")]
    pub action: String,
    #[serde(rename = "Timer")]
    pub timer: u64,
    #[serde(rename = "Active")]
    pub active: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScheduleListResponse {
    pub schedule: Vec<ScheduleEntry>,
    pub err: String,
}

#[derive(Debug, Serialize)]
pub struct CapabilitiesBody {
    #[serde(rename = "Scope")]
    pub scope: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CapabilitiesResponse {
    pub capabilities: CapabilitiesBody,
    pub err: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ActivateResponse {
    pub implements: Vec<&'static str>,
    pub err: String,
}

pub fn activate() -> ActivateResponse {
    ActivateResponse {
        implements: vec!["VolumeDriver"],
        err: String::new(),
    }
}

pub fn capabilities() -> CapabilitiesResponse {
    CapabilitiesResponse {
        capabilities: CapabilitiesBody { scope: "local" },
        err: String::new(),
    }
}

pub fn create(ops: &Ops, req: NameRequest) -> ErrResponse {
    match ops.create_volume(&req.name) {
        Ok(()) => ErrResponse::ok(),
        Err(e) => ErrResponse::fail(e.wire_message()),
    }
}

pub fn remove(ops: &Ops, req: NameRequest) -> ErrResponse {
    match ops.remove_volume(&req.name) {
        Ok(()) => ErrResponse::ok(),
        Err(e) => ErrResponse::fail(e.wire_message()),
    }
}

pub fn mount(ops: &Ops, req: NameRequest) -> MountResponse {
    match ops.mountpoint(&req.name) {
        Ok(path) => MountResponse {
            mountpoint: path.to_string_lossy().into_owned(),
            err: String::new(),
        },
        Err(e) => MountResponse {
            mountpoint: String::new(),
            err: e.wire_message(),
        },
    }
}

pub fn unmount(_req: NameRequest) -> ErrResponse {
    ErrResponse::ok()
}

pub fn path(ops: &Ops, req: NameRequest) -> MountResponse {
    mount(ops, req)
}

pub fn get(ops: &Ops, req: NameRequest) -> GetResponse {
    match ops.mountpoint(&req.name) {
        Ok(path) => GetResponse {
            volume: VolumeInfo {
                name: req.name,
                mountpoint: path.to_string_lossy().into_owned(),
            },
            err: String::new(),
        },
        Err(e) => GetResponse {
            volume: VolumeInfo {
                name: req.name,
                mountpoint: String::new(),
            },
            err: e.wire_message(),
        },
    }
}

pub fn list(ops: &Ops) -> ListResponse {
    match ops.list_volumes() {
        Ok(names) => ListResponse {
            volumes: names.into_iter().map(|name| VolumeEntry { name }).collect(),
            err: String::new(),
        },
        Err(e) => ListResponse {
            volumes: Vec::new(),
            err: e.wire_message(),
        },
    }
}

pub fn snapshot(ops: &Ops, req: NameRequest) -> SnapshotResponse {
    match ops.snapshot(&req.name) {
        Ok(name) => SnapshotResponse { snapshot: name, err: String::new() },
        Err(e) => SnapshotResponse {
            snapshot: String::new(),
            err: e.wire_message(),
        },
    }
}

pub fn snapshot_list(ops: &Ops, req: SnapshotListRequest) -> SnapshotListResponse {
    match ops.list_snapshots(req.name.as_deref()) {
        Ok(snapshots) => SnapshotListResponse { snapshots, err: String::new() },
        Err(e) => SnapshotListResponse {
            snapshots: Vec::new(),
            err: e.wire_message(),
        },
    }
}

pub fn snapshot_remove(ops: &Ops, req: NameRequest) -> ErrResponse {
    match ops.remove_snapshot(&req.name) {
        Ok(()) => ErrResponse::ok(),
        Err(e) => ErrResponse::fail(e.wire_message()),
    }
}

pub fn snapshot_restore(ops: &Ops, req: SnapshotRestoreRequest) -> SnapshotRestoreResponse {
    match ops.restore(&req.name, req.target.as_deref()) {
        Ok(backup) => SnapshotRestoreResponse {
            volume_backup: backup,
            err: String::new(),
        },
        Err(e) => SnapshotRestoreResponse {
            volume_backup: None,
            err: e.wire_message(),
        },
    }
}

pub fn clone(ops: &Ops, req: CloneRequest) -> CloneResponse {
    match ops.clone_volume(&req.name, &req.target) {
        Ok(target) => CloneResponse { volume_cloned: target, err: String::new() },
        Err(e) => CloneResponse {
            volume_cloned: String::new(),
            err: e.wire_message(),
        },
    }
}

pub fn snapshot_send(ops: &Arc<Ops>, req: SnapshotSendRequest) -> ErrResponse {
    match ops.send_snapshot(&req.name, &req.host, req.test) {
        Ok(()) => ErrResponse::ok(),
        Err(e) => {
            warn!(ops.log, "send failed"; "name" => &req.name, "host" => &req.host, "err" => e.wire_message());
            ErrResponse::fail(e.wire_message())
        }
    }
}

pub fn snapshots_purge(ops: &Arc<Ops>, req: PurgeRequest) -> ErrResponse {
    match ops.purge(&req.name, &req.pattern, req.dryrun, req.test) {
        Ok(removed) => {
            info!(ops.log, "purge evaluated"; "name" => &req.name, "pattern" => &req.pattern, "count" => removed.len(), "dryrun" => req.dryrun);
            ErrResponse::ok()
        }
        Err(e) => ErrResponse::fail(e.wire_message()),
    }
}

pub fn volume_sync(ops: &Arc<Ops>, req: VolumeSyncRequest) -> ErrResponse {
    match ops.sync_volumes(&req.volumes, &req.hosts, req.test) {
        Ok(()) => ErrResponse::ok(),
        Err(e) => ErrResponse::fail(e.wire_message()),
    }
}

pub fn schedule(ops: &Ops, req: ScheduleRequest) -> ErrResponse {
    match ops.schedule_upsert(&req.name, &req.action, req.timer) {
        Ok(()) => ErrResponse::ok(),
        Err(e) => ErrResponse::fail(err_message(&e)),
    }
}

pub fn schedule_list(ops: &Ops) -> ScheduleListResponse {
    match ops.schedule_list() {
        Ok(rows) => ScheduleListResponse {
            schedule: rows
                .into_iter()
                .map(|row| ScheduleEntry {
                    name: row.name,
                    action: row.action,
                    timer: row.timer_minutes,
                    active: row.enabled,
                })
                .collect(),
            err: String::new(),
        },
        Err(e) => ScheduleListResponse {
            schedule: Vec::new(),
            err: err_message(&e),
        },
    }
}

pub fn schedule_pause(ops: &Ops) -> ErrResponse {
    match ops.schedule_pause() {
        Ok(()) => ErrResponse::ok(),
        Err(e) => ErrResponse::fail(err_message(&e)),
    }
}

pub fn schedule_resume(ops: &Ops) -> ErrResponse {
    match ops.schedule_resume() {
        Ok(()) => ErrResponse::ok(),
        Err(e) => ErrResponse::fail(err_message(&e)),
    }
}
