//! Wire-format mirrors of the daemon's request/response shapes (spec.md §6). Kept separate
//! from `subvold-driverd::handlers` since the two binaries only share an HTTP boundary, not
//! Rust types.
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
pub struct Empty {}

#[derive(Serialize)]
pub struct NameRequest {
    #[serde(rename = "Name")]
    pub name: String,
}

#[derive(Deserialize)]
pub struct ErrResponse {
    #[serde(rename = "Err")]
    pub err: String,
}

#[derive(Deserialize)]
pub struct MountResponse {
    #[serde(rename = "Mountpoint")]
    pub mountpoint: String,
    #[serde(rename = "Err")]
    pub err: String,
}

#[derive(Deserialize)]
pub struct VolumeInfo {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Mountpoint")]
    pub mountpoint: String,
}

#[derive(Deserialize)]
pub struct GetResponse {
    #[serde(rename = "Volume")]
    pub volume: VolumeInfo,
    #[serde(rename = "Err")]
    pub err: String,
}

#[derive(Deserialize)]
pub struct VolumeEntry {
    #[serde(rename = "Name")]
    pub name: String,
}

#[derive(Deserialize)]
pub struct ListResponse {
    #[serde(rename = "Volumes")]
    pub volumes: Vec<VolumeEntry>,
    #[serde(rename = "Err")]
    pub err: String,
}

#[derive(Deserialize)]
pub struct SnapshotResponse {
    #[serde(rename = "Snapshot")]
    pub snapshot: String,
    #[serde(rename = "Err")]
    pub err: String,
}

#[derive(Serialize)]
pub struct SnapshotListRequest {
    #[serde(rename = "Name")]
    pub name: Option<String>,
}

#[derive(Deserialize)]
pub struct SnapshotListResponse {
    #[serde(rename = "Snapshots")]
    pub snapshots: Vec<String>,
    #[serde(rename = "Err")]
    pub err: String,
}

#[derive(Serialize)]
pub struct SnapshotRestoreRequest {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Target")]
    pub target: Option<String>,
}

#[derive(Deserialize)]
pub struct SnapshotRestoreResponse {
    #[serde(rename = "VolumeBackup")]
    pub volume_backup: Option<String>,
    #[serde(rename = "Err")]
    pub err: String,
}

#[derive(Serialize)]
pub struct CloneRequest {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Target")]
    pub target: String,
}

#[derive(Deserialize)]
pub struct CloneResponse {
    #[serde(rename = "VolumeCloned")]
    pub volume_cloned: String,
    #[serde(rename = "Err")]
    pub err: String,
}

#[derive(Serialize)]
pub struct SnapshotSendRequest {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Host")]
    pub host: String,
    #[serde(rename = "Test")]
    pub test: bool,
}

#[derive(Serialize)]
pub struct PurgeRequest {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Pattern")]
    pub pattern: String,
    #[serde(rename = "Dryrun")]
    pub dryrun: bool,
    #[serde(rename = "Test")]
    pub test: bool,
}

#[derive(Serialize)]
pub struct VolumeSyncRequest {
    #[serde(rename = "Volumes")]
    pub volumes: Vec<String>,
    #[serde(rename = "Hosts")]
    pub hosts: Vec<String>,
    #[serde(rename = "Test")]
    pub test: bool,
}

#[derive(Serialize)]
pub struct ScheduleRequest {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Action")]
    pub action: String,
    #[serde(rename = "Timer")]
    pub timer: u64,
}

#[derive(Deserialize)]
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

#[derive(Deserialize)]
pub struct ScheduleListResponse {
    #[serde(rename = "Schedule")]
    pub schedule: Vec<ScheduleEntry>,
    #[serde(rename = "Err")]
    pub err: String,
}

#[derive(Deserialize)]
pub struct CapabilitiesBody {
    #[serde(rename = "Scope")]
    pub scope: String,
}

#[derive(Deserialize)]
pub struct CapabilitiesResponse {
    #[serde(rename = "Capabilities")]
    pub capabilities: CapabilitiesBody,
    #[serde(rename = "Err")]
    pub err: String,
}
