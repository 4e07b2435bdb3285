use clap::Parser;
use std::sync::Arc;
use sui_tx_indexer::api::{Cli, CliHandler, Commands};
use sui_tx_indexer::config::AppConfig;
use sui_tx_indexer::database::TransactionStore;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Quieter than the indexer; stdout is reserved for command output.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    if cli.command == Commands::SampleConfig {
        println!("{}", AppConfig::generate_sample_config()?);
        return Ok(());
    }

    let config = AppConfig::load().unwrap_or_default();
    let db_path = cli.database.clone().unwrap_or(config.database.path);

    let store = match TransactionStore::new(&db_path) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            eprintln!("Failed to open database at '{}': {}", db_path, e);
            eprintln!("Make sure the indexer has been run at least once to create the database.");
            std::process::exit(1);
        }
    };

    let cli_handler = CliHandler::new(store);

    if let Err(e) = cli_handler.execute_command(&cli.command) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
