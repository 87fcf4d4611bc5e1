use clap::{crate_version, Clap};
use slog::{info, Logger};
use std::sync::Arc;
use subvold_core::config::DriverConfig;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::oneshot;

mod handlers;
mod ops;
mod scheduler;
mod server;

use ops::Ops;
use scheduler::Scheduler;

fn main() {
    let options = CliOptions::parse();
    subvold_app::run(async_main, options.verbose as usize);
    std::process::exit(1);
}

#[derive(Clap)]
#[clap(version = crate_version!(), author = "rebeagle")]
struct CliOptions {
    /// Enable debug logs. Use twice to enable trace logs.
    #[clap(short, long, parse(from_occurrences))]
    verbose: i32,
}

async fn async_main(log: Logger) -> anyhow::Result<()> {
    let config = DriverConfig::load();
    std::fs::create_dir_all(&config.volumes_path)?;
    std::fs::create_dir_all(&config.snapshots_path)?;

    let socket_path = config.socket_path.clone();
    let ops = Arc::new(Ops::new(config, log.clone()));

    let (scheduler_tx, scheduler_rx) = oneshot::channel();
    let (server_tx, server_rx) = oneshot::channel();

    let scheduler = tokio::spawn(Scheduler::new(ops.clone(), log.clone()).run(scheduler_rx));
    let server = tokio::spawn(server::serve(socket_path, ops, server_rx));

    wait_for_termination(&log).await?;

    info!(log, "shutting down");
    let _ = scheduler_tx.send(());
    let _ = server_tx.send(());
    scheduler.await?;
    server.await??;

    Ok(())
}

/// Waits for any of `INT`, `TERM`, `HUP`, `QUIT` (spec.md §4.9's termination signals).
async fn wait_for_termination(log: &Logger) -> anyhow::Result<()> {
    let mut int = signal(SignalKind::interrupt())?;
    let mut term = signal(SignalKind::terminate())?;
    let mut hup = signal(SignalKind::hangup())?;
    let mut quit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = int.recv() => info!(log, "received SIGINT"),
        _ = term.recv() => info!(log, "received SIGTERM"),
        _ = hup.recv() => info!(log, "received SIGHUP"),
        _ = quit.recv() => info!(log, "received SIGQUIT"),
    }
    Ok(())
}
