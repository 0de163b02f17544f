//! The `neuron` server binary.
//!
//! Opens the document store under the data directory, starts the retention
//! sweeper and serves until Ctrl-C.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use neuron::{spawn_sweeper, telemetry, Config, NeuronService, Server};
use neuron_core::SystemClock;
use neuron_session::shutdown_channel;
use neuron_store::SqliteStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    config.validate()?;
    telemetry::init(config.json_logs)?;

    info!(version = env!("CARGO_PKG_VERSION"), "neuron starting");

    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("creating data directory {}", config.data_dir.display()))?;
    let db_path = config.database_path();
    let store = Arc::new(
        SqliteStore::open(&db_path)
            .with_context(|| format!("opening document store {}", db_path.display()))?,
    );

    let (sweeper_stop, sweeper_signal) = shutdown_channel();
    let sweeper = spawn_sweeper(
        store.clone(),
        Arc::new(SystemClock),
        config.retention(),
        sweeper_signal,
    );

    let server = Server::bind(config.listen, NeuronService::new(store))
        .await
        .with_context(|| format!("binding {}", config.listen))?
        .with_drain_timeout(config.shutdown_timeout());
    info!(addr = %server.local_addr()?, "listening");

    let (server_stop, server_signal) = shutdown_channel();
    let mut server_task = tokio::spawn(server.run(server_signal));

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("waiting for ctrl-c")?;
            info!("shutdown requested");
        }
        finished = &mut server_task => {
            finished.context("server task panicked")??;
            anyhow::bail!("server stopped unexpectedly");
        }
    }

    // The sweeper must be gone before the store is left to the draining server.
    let _ = sweeper_stop.send(true);
    let report = sweeper
        .wait(config.shutdown_timeout())
        .await
        .context("stopping retention sweeper")?;
    info!(
        ticks = report.ticks,
        deleted = report.deleted,
        failures = report.failures,
        "retention sweeper stopped"
    );

    let _ = server_stop.send(true);
    server_task.await.context("server task panicked")??;

    info!("neuron stopped");
    Ok(())
}
