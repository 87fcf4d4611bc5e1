use crate::client::ServiceClient;
use crate::ui::{print_comfy_table, print_err};
use crate::wire::*;
use anyhow::Result;
use clap::Clap;
use comfy_table::Cell;
use std::path::PathBuf;

fn default_socket_path() -> PathBuf {
    std::env::var("SOCKET")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/run/docker/plugins/subvold.sock"))
}

#[derive(Clap)]
#[clap(version = clap::crate_version!(), author = "rebeagle")]
pub struct CliOptions {
    /// Enable debug logs. Use twice to enable trace logs.
    #[clap(short, long, parse(from_occurrences))]
    pub verbose: i32,
    /// Path to the daemon's UNIX socket.
    #[clap(long)]
    pub socket: Option<PathBuf>,
    #[clap(subcommand)]
    pub subcmd: Commands,
}

#[derive(Clap)]
pub enum Commands {
    /// Create a new volume.
    Create(NameArg),
    /// Remove a volume.
    Remove(NameArg),
    /// Print a volume's mountpoint, creating it if necessary.
    Mount(NameArg),
    /// Print a volume's mountpoint without mounting semantics.
    Path(NameArg),
    /// List volumes.
    List,
    /// Take a read-only snapshot of a volume.
    Snapshot(NameArg),
    /// List snapshots, optionally filtered to one volume.
    Snapshots(OptionalNameArg),
    /// Remove a snapshot.
    SnapshotRemove(NameArg),
    /// Restore a volume from its latest (or a named) snapshot.
    Restore(RestoreArgs),
    /// Create a writable clone of a volume under a new name.
    Clone(CloneArgs),
    /// Replicate a volume's snapshots to a remote host.
    Send(SendArgs),
    /// Remove snapshots matching a retention pattern.
    Purge(PurgeArgs),
    /// Pull a volume from one or more remote hosts with rsync.
    Sync(SyncArgs),
    /// Schedule a recurring action.
    Schedule(ScheduleArgs),
    /// List scheduled actions.
    ScheduleList,
    /// Pause the scheduler.
    SchedulePause,
    /// Resume the scheduler.
    ScheduleResume,
    /// Print the plugin's advertised capabilities.
    Capabilities,
}

#[derive(Clap)]
pub struct NameArg {
    name: String,
}

#[derive(Clap)]
pub struct OptionalNameArg {
    name: Option<String>,
}

#[derive(Clap)]
pub struct RestoreArgs {
    name: String,
    /// Volume to restore into, if different from the snapshot's own volume.
    #[clap(long)]
    target: Option<String>,
}

#[derive(Clap)]
pub struct CloneArgs {
    name: String,
    target: String,
}

#[derive(Clap)]
pub struct SendArgs {
    name: String,
    host: String,
    /// Send to the test-remote fixture instead of a real host over ssh.
    #[clap(long)]
    test: bool,
}

#[derive(Clap)]
pub struct PurgeArgs {
    name: String,
    pattern: String,
    /// Report what would be removed without deleting anything.
    #[clap(long)]
    dryrun: bool,
    #[clap(long)]
    test: bool,
}

#[derive(Clap)]
pub struct SyncArgs {
    /// Volume names to pull, comma-separated.
    #[clap(long, use_delimiter = true)]
    volumes: Vec<String>,
    /// Remote hosts to pull from, comma-separated.
    #[clap(long, use_delimiter = true)]
    hosts: Vec<String>,
    #[clap(long)]
    test: bool,
}

#[derive(Clap)]
pub struct ScheduleArgs {
    name: String,
    /// `snapshot`, `replicate:<host>`, `purge:<pattern>`, or `synchronize:<h1,h2,...>`.
    action: String,
    /// Interval in minutes.
    timer: u64,
}

pub async fn command_dispatch(options: CliOptions) -> Result<()> {
    let client = ServiceClient::new(options.socket.unwrap_or_else(default_socket_path));

    match options.subcmd {
        Commands::Create(args) => {
            let resp: ErrResponse = client.call("VolumeDriver.Create", &NameRequest { name: args.name }).await?;
            print_err(&resp.err);
        }
        Commands::Remove(args) => {
            let resp: ErrResponse = client.call("VolumeDriver.Remove", &NameRequest { name: args.name }).await?;
            print_err(&resp.err);
        }
        Commands::Mount(args) => {
            let resp: MountResponse = client.call("VolumeDriver.Mount", &NameRequest { name: args.name }).await?;
            println!("{}", resp.mountpoint);
            print_err(&resp.err);
        }
        Commands::Path(args) => {
            let resp: MountResponse = client.call("VolumeDriver.Path", &NameRequest { name: args.name }).await?;
            println!("{}", resp.mountpoint);
            print_err(&resp.err);
        }
        Commands::List => {
            let resp: ListResponse = client.call("VolumeDriver.List", &Empty {}).await?;
            print_comfy_table(
                vec![Cell::new("Name")],
                resp.volumes.into_iter().map(|v| vec![Cell::new(v.name)]),
            );
            print_err(&resp.err);
        }
        Commands::Snapshot(args) => {
            let resp: SnapshotResponse = client.call("VolumeDriver.Snapshot", &NameRequest { name: args.name }).await?;
            println!("{}", resp.snapshot);
            print_err(&resp.err);
        }
        Commands::Snapshots(args) => {
            let resp: SnapshotListResponse = client
                .call("VolumeDriver.Snapshot.List", &SnapshotListRequest { name: args.name })
                .await?;
            print_comfy_table(
                vec![Cell::new("Snapshot")],
                resp.snapshots.into_iter().map(|s| vec![Cell::new(s)]),
            );
            print_err(&resp.err);
        }
        Commands::SnapshotRemove(args) => {
            let resp: ErrResponse = client
                .call("VolumeDriver.Snapshot.Remove", &NameRequest { name: args.name })
                .await?;
            print_err(&resp.err);
        }
        Commands::Restore(args) => {
            let resp: SnapshotRestoreResponse = client
                .call(
                    "VolumeDriver.Snapshot.Restore",
                    &SnapshotRestoreRequest {
                        name: args.name,
                        target: args.target,
                    },
                )
                .await?;
            if let Some(backup) = resp.volume_backup {
                println!("previous volume backed up as {}", backup);
            }
            print_err(&resp.err);
        }
        Commands::Clone(args) => {
            let resp: CloneResponse = client
                .call(
                    "VolumeDriver.Clone",
                    &CloneRequest {
                        name: args.name,
                        target: args.target,
                    },
                )
                .await?;
            println!("{}", resp.volume_cloned);
            print_err(&resp.err);
        }
        Commands::Send(args) => {
            let resp: ErrResponse = client
                .call(
                    "VolumeDriver.Snapshot.Send",
                    &SnapshotSendRequest {
                        name: args.name,
                        host: args.host,
                        test: args.test,
                    },
                )
                .await?;
            print_err(&resp.err);
        }
        Commands::Purge(args) => {
            let resp: ErrResponse = client
                .call(
                    "VolumeDriver.Snapshots.Purge",
                    &PurgeRequest {
                        name: args.name,
                        pattern: args.pattern,
                        dryrun: args.dryrun,
                        test: args.test,
                    },
                )
                .await?;
            print_err(&resp.err);
        }
        Commands::Sync(args) => {
            let resp: ErrResponse = client
                .call(
                    "VolumeDriver.Volume.Sync",
                    &VolumeSyncRequest {
                        volumes: args.volumes,
                        hosts: args.hosts,
                        test: args.test,
                    },
                )
                .await?;
            print_err(&resp.err);
        }
        Commands::Schedule(args) => {
            let resp: ErrResponse = client
                .call(
                    "VolumeDriver.Schedule",
                    &ScheduleRequest {
                        name: args.name,
                        action: args.action,
                        timer: args.timer,
                    },
                )
                .await?;
            print_err(&resp.err);
        }
        Commands::ScheduleList => {
            let resp: ScheduleListResponse = client.call_get("VolumeDriver.Schedule.List").await?;
            print_comfy_table(
                vec![Cell::new("Name"), Cell::new("Action"), Cell::new("Timer"), Cell::new("Active")],
                resp.schedule.into_iter().map(|e| {
                    vec![
                        Cell::new(e.name),
                        Cell::new(e.action),
                        Cell::new(e.timer),
                        Cell::new(e.active),
                    ]
                }),
            );
            print_err(&resp.err);
        }
        Commands::SchedulePause => {
            let resp: ErrResponse = client.call("VolumeDriver.Schedule.Pause", &Empty {}).await?;
            print_err(&resp.err);
        }
        Commands::ScheduleResume => {
            let resp: ErrResponse = client.call("VolumeDriver.Schedule.Resume", &Empty {}).await?;
            print_err(&resp.err);
        }
        Commands::Capabilities => {
            let resp: CapabilitiesResponse = client.call("VolumeDriver.Capabilities", &Empty {}).await?;
            println!("scope: {}", resp.capabilities.scope);
            print_err(&resp.err);
        }
    }

    Ok(())
}
