pub mod cli;
pub mod http;

pub use cli::{Cli, CliError, CliHandler, Commands};
pub use http::{
    get_health, get_status, get_transaction, get_transactions, router, ApiError, ApiServer, AppState,
    ErrorResponse, HealthResponse, StatusResponse, TransactionsResponse,
};
