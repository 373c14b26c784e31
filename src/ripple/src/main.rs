mod config;

use std::path::Path;

use anyhow::{Context, Result};
use log::info;
use tokio::sync::broadcast;

use crate::config::Config;
use logger::logger;
use replication::Replicator;
use server::Server;
use storage::{build_engine, EngineKind, Store};

// jemalloc keeps fragmentation down for the value-heavy maps
#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> Result<()> {
    logger::setup_logging();

    let ascii_logo = r#"
   _____       __
  / ___(_)__  / /__
 / /  / / _ \/ / -_)
/_/  /_/ .__/_/\__/
      /_/  ripple
-----------------------------------------------
Replicated in-memory key-value store
-----------------------------------------------
    "#;
    println!("{}", ascii_logo);

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());
    let config = Config::load(Path::new(&config_path))?;

    let kind: EngineKind = config
        .engine
        .parse()
        .context("invalid engine in configuration")?;
    let store = Store::new(build_engine(kind));
    info!("storage engine: {}", config.engine);

    let replicator = if config.replication.enabled {
        Some(Replicator::start(&config.replication, store.clone()))
    } else {
        info!("replication disabled");
        None
    };

    // Shutdown broadcast channel
    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            info!("failed to listen for shutdown signal: {}", e);
            return;
        }
        info!("received shutdown signal, stopping node...");
        let _ = shutdown_tx_clone.send(());
    });

    let server = Server::new(store.clone(), config.host.clone(), config.port);
    let result = server.run(shutdown_tx).await;

    // Release the bus connection on every exit path.
    if let Some(replicator) = replicator {
        replicator.shutdown().await;
    }

    result.context("server error")
}
