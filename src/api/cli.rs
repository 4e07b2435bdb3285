use clap::{Parser, Subcommand};
use std::sync::Arc;
use thiserror::Error;

use crate::config::AppConfig;
use crate::database::TransactionStore;
use crate::error::{ConfigError, DatabaseError};
use crate::models::CanonicalTransaction;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Output formatting failed: {0}")]
    Output(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "sui-tx-indexer-cli")]
#[command(about = "Query transactions stored by the Sui transaction indexer")]
#[command(version)]
pub struct Cli {
    /// Database path (defaults to the configured path)
    #[arg(long, global = true)]
    pub database: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Print the number of stored transactions
    Count,
    /// Print one transaction as JSON
    Show {
        digest: String,
    },
    /// List the newest transactions
    Recent {
        #[arg(long, default_value_t = 10)]
        limit: u32,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },
    /// Print a sample configuration file
    SampleConfig,
}

pub struct CliHandler {
    store: Arc<TransactionStore>,
}

impl CliHandler {
    pub fn new(store: Arc<TransactionStore>) -> Self {
        Self { store }
    }

    pub fn execute_command(&self, command: &Commands) -> Result<(), CliError> {
        let output = self.render(command)?;
        println!("{}", output);
        Ok(())
    }

    /// Text the command prints
    pub fn render(&self, command: &Commands) -> Result<String, CliError> {
        match command {
            Commands::Count => Ok(self.store.count()?.to_string()),
            Commands::Show { digest } => {
                let transaction = self.store.get_transaction(digest)?;
                Ok(serde_json::to_string_pretty(&transaction)?)
            }
            Commands::Recent { limit, offset } => {
                let transactions = self.store.get_recent_transactions(*limit, *offset)?;
                Ok(render_table(&transactions))
            }
            Commands::SampleConfig => Ok(AppConfig::generate_sample_config()?),
        }
    }
}

fn render_table(transactions: &[CanonicalTransaction]) -> String {
    if transactions.is_empty() {
        return "No transactions stored yet".to_string();
    }

    let mut lines = vec![format!(
        "{:<46} {:>12} {:<8} {:>14} {}",
        "DIGEST", "CHECKPOINT", "STATUS", "GAS", "FUNCTION"
    )];
    for tx in transactions {
        lines.push(format!(
            "{:<46} {:>12} {:<8} {:>14} {}",
            tx.digest,
            tx.checkpoint,
            tx.status.as_str(),
            tx.total_gas_used,
            tx.function.as_deref().unwrap_or("-")
        ));
    }
    lines.join("\n")
}
