pub mod api;
pub mod blockchain;
pub mod clock;
pub mod config;
pub mod database;
pub mod error;
pub mod logging;
pub mod models;
pub mod retry;

pub use blockchain::{ChainSource, CycleOutcome, Poller, SuiRpcClient, TransactionSink};
pub use clock::{Clock, TokioClock};
pub use config::{ApiConfig, AppConfig, DatabaseConfig, LoggingConfig, PollerConfig, RpcConfig};
pub use database::{TransactionStore, UpsertOutcome};
pub use error::{IndexerError, Result};
pub use logging::{ErrorLogger, LogContext, MetricsLogger, PerformanceMonitor};
pub use models::{normalize, CanonicalTransaction, EventRecord, TransactionStatus};
pub use retry::{RetryConfig, RetryManager};
