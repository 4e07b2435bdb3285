use clap::Parser;
use std::sync::Arc;
use sui_tx_indexer::api::ApiServer;
use sui_tx_indexer::config::AppConfig;
use sui_tx_indexer::database::TransactionStore;
use sui_tx_indexer::logging::init_logging;

#[derive(Parser)]
#[command(name = "sui-tx-indexer-server")]
#[command(about = "Read-only HTTP API over indexed Sui transactions")]
#[command(version)]
struct Args {
    /// Database path (defaults to the configured path)
    #[arg(long)]
    database: Option<String>,

    /// Bind address (defaults to the configured host)
    #[arg(long)]
    host: Option<String>,

    /// Server port (defaults to the configured port)
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = AppConfig::load().unwrap_or_default();
    init_logging(&config.logging)?;

    if let Some(database) = args.database {
        config.database.path = database;
    }
    if let Some(host) = args.host {
        config.api.host = host;
    }
    if let Some(port) = args.port {
        config.api.port = port;
    }

    let store = TransactionStore::open(&config.database)
        .map_err(|e| format!("Failed to open database '{}': {}", config.database.path, e))?;

    let server = ApiServer::new(Arc::new(store), &config.api);

    if let Err(e) = server.start().await {
        log::error!("Server failed: {}", e);
        return Err(e.into());
    }

    Ok(())
}
