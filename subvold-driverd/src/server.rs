//! HTTP-over-UNIX-socket front end. Binds the configured socket with mode `0660` and
//! serves the plugin protocol from spec.md §6 until a graceful-shutdown signal arrives,
//! mirroring the teacher's `ServerActor` (warp + `UnixListener` + oneshot shutdown signal)
//! minus the actor-framework wrapper (see DESIGN.md).
use crate::handlers;
use crate::ops::Ops;
use futures_util::FutureExt;
use serde::Serialize;
use slog::error;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::UnixListener;
use tokio::sync::oneshot;
use tokio_stream::wrappers::UnixListenerStream;
use warp::{Filter, Rejection, Reply};

fn with_ops(ops: Arc<Ops>) -> impl Filter<Extract = (Arc<Ops>,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || ops.clone())
}

fn json_body<T: serde::de::DeserializeOwned + Send>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone {
    warp::body::json()
}

#[derive(Debug)]
struct BlockingTaskFailed;
impl warp::reject::Reject for BlockingTaskFailed {}

/// Every handler ultimately shells out to `btrfs`/`ssh`/`rsync` via
/// `std::process::Command` (C2/C4/C5) or does blocking file I/O (C6); running that
/// straight on a warp/tokio worker thread would stall every other in-flight request
/// (spec.md §4.1). `spawn_blocking` moves the call to the blocking thread pool.
async fn blocking<T, F>(ops: &Arc<Ops>, f: F) -> Result<warp::reply::Json, Rejection>
where
    F: FnOnce() -> T + Send + 'static,
    T: Serialize + Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(value) => Ok(warp::reply::json(&value)),
        Err(e) => {
            error!(ops.log, "blocking handler task panicked"; "err" => e.to_string());
            Err(warp::reject::custom(BlockingTaskFailed))
        }
    }
}

pub fn routes(ops: Arc<Ops>) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let activate = warp::path!("Plugin.Activate")
        .and(warp::post())
        .map(|| warp::reply::json(&handlers::activate()));

    let capabilities = warp::path!("VolumeDriver.Capabilities")
        .and(warp::post())
        .map(|| warp::reply::json(&handlers::capabilities()));

    let create = warp::path!("VolumeDriver.Create")
        .and(warp::post())
        .and(with_ops(ops.clone()))
        .and(json_body())
        .and_then(|ops: Arc<Ops>, req| async move {
            let log_ops = ops.clone();
            blocking(&log_ops, move || handlers::create(&ops, req)).await
        });

    let remove = warp::path!("VolumeDriver.Remove")
        .and(warp::post())
        .and(with_ops(ops.clone()))
        .and(json_body())
        .and_then(|ops: Arc<Ops>, req| async move {
            let log_ops = ops.clone();
            blocking(&log_ops, move || handlers::remove(&ops, req)).await
        });

    let mount = warp::path!("VolumeDriver.Mount")
        .and(warp::post())
        .and(with_ops(ops.clone()))
        .and(json_body())
        .and_then(|ops: Arc<Ops>, req| async move {
            let log_ops = ops.clone();
            blocking(&log_ops, move || handlers::mount(&ops, req)).await
        });

    let unmount = warp::path!("VolumeDriver.Unmount")
        .and(warp::post())
        .and(json_body())
        .map(|req| warp::reply::json(&handlers::unmount(req)));

    let path = warp::path!("VolumeDriver.Path")
        .and(warp::post())
        .and(with_ops(ops.clone()))
        .and(json_body())
        .and_then(|ops: Arc<Ops>, req| async move {
            let log_ops = ops.clone();
            blocking(&log_ops, move || handlers::path(&ops, req)).await
        });

    let get = warp::path!("VolumeDriver.Get")
        .and(warp::post())
        .and(with_ops(ops.clone()))
        .and(json_body())
        .and_then(|ops: Arc<Ops>, req| async move {
            let log_ops = ops.clone();
            blocking(&log_ops, move || handlers::get(&ops, req)).await
        });

    let list = warp::path!("VolumeDriver.List")
        .and(warp::post())
        .and(with_ops(ops.clone()))
        .and_then(|ops: Arc<Ops>| async move {
            let log_ops = ops.clone();
            blocking(&log_ops, move || handlers::list(&ops)).await
        });

    let snapshot = warp::path!("VolumeDriver.Snapshot")
        .and(warp::post())
        .and(with_ops(ops.clone()))
        .and(json_body())
        .and_then(|ops: Arc<Ops>, req| async move {
            let log_ops = ops.clone();
            blocking(&log_ops, move || handlers::snapshot(&ops, req)).await
        });

    let snapshot_list = warp::path!("VolumeDriver.Snapshot.List")
        .and(warp::post())
        .and(with_ops(ops.clone()))
        .and(json_body())
        .and_then(|ops: Arc<Ops>, req| async move {
            let log_ops = ops.clone();
            blocking(&log_ops, move || handlers::snapshot_list(&ops, req)).await
        });

    let snapshot_remove = warp::path!("VolumeDriver.Snapshot.Remove")
        .and(warp::post())
        .and(with_ops(ops.clone()))
        .and(json_body())
        .and_then(|ops: Arc<Ops>, req| async move {
            let log_ops = ops.clone();
            blocking(&log_ops, move || handlers::snapshot_remove(&ops, req)).await
        });

    let snapshot_restore = warp::path!("VolumeDriver.Snapshot.Restore")
        .and(warp::post())
        .and(with_ops(ops.clone()))
        .and(json_body())
        .and_then(|ops: Arc<Ops>, req| async move {
            let log_ops = ops.clone();
            blocking(&log_ops, move || handlers::snapshot_restore(&ops, req)).await
        });

    let clone = warp::path!("VolumeDriver.Clone")
        .and(warp::post())
        .and(with_ops(ops.clone()))
        .and(json_body())
        .and_then(|ops: Arc<Ops>, req| async move {
            let log_ops = ops.clone();
            blocking(&log_ops, move || handlers::clone(&ops, req)).await
        });

    let snapshot_send = warp::path!("VolumeDriver.Snapshot.Send")
        .and(warp::post())
        .and(with_ops(ops.clone()))
        .and(json_body())
        .and_then(|ops: Arc<Ops>, req| async move {
            let log_ops = ops.clone();
            blocking(&log_ops, move || handlers::snapshot_send(&ops, req)).await
        });

    let snapshots_purge = warp::path!("VolumeDriver.Snapshots.Purge")
        .and(warp::post())
        .and(with_ops(ops.clone()))
        .and(json_body())
        .and_then(|ops: Arc<Ops>, req| async move {
            let log_ops = ops.clone();
            blocking(&log_ops, move || handlers::snapshots_purge(&ops, req)).await
        });

    let volume_sync = warp::path!("VolumeDriver.Volume.Sync")
        .and(warp::post())
        .and(with_ops(ops.clone()))
        .and(json_body())
        .and_then(|ops: Arc<Ops>, req| async move {
            let log_ops = ops.clone();
            blocking(&log_ops, move || handlers::volume_sync(&ops, req)).await
        });

    let schedule = warp::path!("VolumeDriver.Schedule")
        .and(warp::post())
        .and(with_ops(ops.clone()))
        .and(json_body())
        .and_then(|ops: Arc<Ops>, req| async move {
            let log_ops = ops.clone();
            blocking(&log_ops, move || handlers::schedule(&ops, req)).await
        });

    let schedule_list = warp::path!("VolumeDriver.Schedule.List")
        .and(warp::get())
        .and(with_ops(ops.clone()))
        .and_then(|ops: Arc<Ops>| async move {
            let log_ops = ops.clone();
            blocking(&log_ops, move || handlers::schedule_list(&ops)).await
        });

    let schedule_pause = warp::path!("VolumeDriver.Schedule.Pause")
        .and(warp::post())
        .and(with_ops(ops.clone()))
        .and_then(|ops: Arc<Ops>| async move {
            let log_ops = ops.clone();
            blocking(&log_ops, move || handlers::schedule_pause(&ops)).await
        });

    let schedule_resume = warp::path!("VolumeDriver.Schedule.Resume")
        .and(warp::post())
        .and(with_ops(ops))
        .and_then(|ops: Arc<Ops>| async move {
            let log_ops = ops.clone();
            blocking(&log_ops, move || handlers::schedule_resume(&ops)).await
        });

    activate
        .or(capabilities)
        .or(create)
        .or(remove)
        .or(mount)
        .or(unmount)
        .or(path)
        .or(get)
        .or(list)
        .or(snapshot)
        .or(snapshot_list)
        .or(snapshot_remove)
        .or(snapshot_restore)
        .or(clone)
        .or(snapshot_send)
        .or(snapshots_purge)
        .or(volume_sync)
        .or(schedule)
        .or(schedule_list)
        .or(schedule_pause)
        .or(schedule_resume)
}

/// Binds `socket_path` (removing a stale socket left by an unclean shutdown), sets mode
/// `0660`, and serves `routes` until `shutdown_signal` resolves.
pub async fn serve(socket_path: PathBuf, ops: Arc<Ops>, shutdown_signal: oneshot::Receiver<()>) -> anyhow::Result<()> {
    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if socket_path.exists() {
        std::fs::remove_file(&socket_path)?;
    }
    let listener = UnixListener::bind(&socket_path)?;
    std::fs::set_permissions(&socket_path, std::fs::Permissions::from_mode(0o660))?;

    let incoming = UnixListenerStream::new(listener);
    let signal = shutdown_signal.map(|_| ());
    warp::serve(routes(ops))
        .serve_incoming_with_graceful_shutdown(incoming, signal)
        .await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use slog::{o, Logger};
    use subvold_core::config::DriverConfig;

    fn test_ops() -> (Arc<Ops>, tempfile::TempDir) {
        let tmp = tempfile::tempdir().expect("tempdir");
        let config = DriverConfig {
            volumes_path: tmp.path().join("volumes"),
            snapshots_path: tmp.path().join("snapshots"),
            test_remote_path: tmp.path().join("test-remote"),
            schedule_path: tmp.path().join("schedule.csv"),
            socket_path: tmp.path().join("subvold.sock"),
            timer_secs: 60,
            dtformat: "%Y-%m-%dT%H:%M:%S.%f".to_string(),
            log_level: "info".to_string(),
            ssh_port: 22,
        };
        std::fs::create_dir_all(&config.volumes_path).unwrap();
        (Arc::new(Ops::new(config, Logger::root(slog::Discard, o!()))), tmp)
    }

    #[tokio::test]
    async fn create_then_list_round_trips_through_the_http_routes() {
        let (ops, _tmp) = test_ops();
        let filter = routes(ops);

        let create_resp = warp::test::request()
            .method("POST")
            .path("/VolumeDriver.Create")
            .json(&serde_json::json!({ "Name": "not@a@valid@name" }))
            .reply(&filter)
            .await;
        assert_eq!(create_resp.status(), 200);
        let create_body: serde_json::Value = serde_json::from_slice(create_resp.body()).unwrap();
        assert!(!create_body["Err"].as_str().unwrap().is_empty());

        let list_resp = warp::test::request()
            .method("POST")
            .path("/VolumeDriver.List")
            .reply(&filter)
            .await;
        assert_eq!(list_resp.status(), 200);
        let list_body: serde_json::Value = serde_json::from_slice(list_resp.body()).unwrap();
        assert_eq!(list_body["Volumes"].as_array().unwrap().len(), 0);
        assert_eq!(list_body["Err"].as_str().unwrap(), "");
    }

    #[tokio::test]
    async fn remove_of_a_nonexistent_volume_reports_no_such_volume() {
        let (ops, _tmp) = test_ops();
        let filter = routes(ops);

        let resp = warp::test::request()
            .method("POST")
            .path("/VolumeDriver.Remove")
            .json(&serde_json::json!({ "Name": "ghost" }))
            .reply(&filter)
            .await;
        assert_eq!(resp.status(), 200);
        let body: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
        assert!(!body["Err"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_route_falls_through_to_rejection() {
        let (ops, _tmp) = test_ops();
        let filter = routes(ops);

        let resp = warp::test::request().method("POST").path("/Not.A.Route").reply(&filter).await;
        assert_eq!(resp.status(), 404);
    }
}
