use log::{error, info, warn};
use std::sync::Arc;
use tokio::signal;

use sui_tx_indexer::api::ApiServer;
use sui_tx_indexer::blockchain::{Poller, SuiRpcClient};
use sui_tx_indexer::clock::TokioClock;
use sui_tx_indexer::config::AppConfig;
use sui_tx_indexer::database::TransactionStore;
use sui_tx_indexer::logging::{init_logging, MetricsLogger};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (config, config_error) = match AppConfig::load() {
        Ok(config) => (config, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };

    init_logging(&config.logging)?;
    if let Some(e) = config_error {
        warn!("Failed to load configuration, using defaults: {}", e);
    }

    info!("Starting Sui transaction indexer against {}", config.rpc.endpoint);

    let store = match TransactionStore::open(&config.database) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!("Failed to open transaction store at '{}': {}", config.database.path, e);
            std::process::exit(1);
        }
    };
    MetricsLogger::log_store_size(store.count()?);

    if config.api.enabled {
        let server = ApiServer::new(store.clone(), &config.api);
        tokio::spawn(async move {
            if let Err(e) = server.start().await {
                error!("HTTP API server stopped: {}", e);
            }
        });
    }

    let clock = Arc::new(TokioClock);
    let client = SuiRpcClient::from_config(&config.rpc, clock.clone())?;
    let mut poller = Poller::new(Arc::new(client), store, clock, config.poller.clone());
    let shutdown = poller.shutdown_handle();

    tokio::select! {
        _ = poller.run() => {}
        result = signal::ctrl_c() => {
            match result {
                Ok(()) => info!("Received shutdown signal, stopping indexer"),
                Err(e) => error!("Unable to listen for shutdown signal: {}", e),
            }
            shutdown.store(true, std::sync::atomic::Ordering::Relaxed);
        }
    }

    info!("Sui transaction indexer stopped");
    Ok(())
}
