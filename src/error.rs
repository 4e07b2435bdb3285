use thiserror::Error;

/// Main error type for the Sui transaction indexer
#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Processing error: {0}")]
    Processing(#[from] ProcessingError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// RPC-related errors
#[derive(Error, Debug)]
pub enum RpcError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Timeout after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("HTTP status {status}")]
    HttpStatus { status: u16 },

    #[error("RPC method error: code={code}, message={message}")]
    Method { code: i64, message: String },

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("{method} failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        method: String,
        attempts: u32,
        last_error: String,
    },
}

/// Database-related errors
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Connection failed: {0}")]
    Connection(#[from] rusqlite::Error),

    #[error("Schema initialization failed: {0}")]
    Schema(String),

    #[error("Upsert of transaction {digest} failed: {source}")]
    Upsert {
        digest: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Failed to serialize columns of transaction {digest}: {source}")]
    Serialization {
        digest: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Lock acquisition failed: {0}")]
    Lock(String),

    #[error("Record not found: {0}")]
    NotFound(String),
}

/// Errors raised while turning RPC payloads into records
#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("Transaction {digest} is not a decodable envelope: {source}")]
    EnvelopeDecode {
        digest: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Configuration parsing failed: {0}")]
    Parsing(String),

    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, IndexerError>;

/// Error severity levels for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Critical,
    High,
    Medium,
    Low,
}

impl RpcError {
    /// Whether another attempt of the same call may succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            RpcError::Http(_)
            | RpcError::Timeout { .. }
            | RpcError::Connection(_)
            | RpcError::HttpStatus { .. }
            | RpcError::Method { .. } => true,
            RpcError::InvalidResponse(_) | RpcError::RetriesExhausted { .. } => false,
        }
    }
}

impl IndexerError {
    /// Get the severity level of an error
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            IndexerError::Config(_) => ErrorSeverity::Critical,
            IndexerError::Database(DatabaseError::Connection(_)) => ErrorSeverity::Critical,
            IndexerError::Database(DatabaseError::Schema(_)) => ErrorSeverity::Critical,

            IndexerError::Rpc(RpcError::RetriesExhausted { .. }) => ErrorSeverity::High,
            IndexerError::Database(DatabaseError::Upsert { .. }) => ErrorSeverity::High,
            IndexerError::Database(DatabaseError::Lock(_)) => ErrorSeverity::High,

            IndexerError::Rpc(_) => ErrorSeverity::Medium,
            IndexerError::Processing(_) => ErrorSeverity::Medium,
            IndexerError::Database(DatabaseError::Serialization { .. }) => ErrorSeverity::Medium,
            IndexerError::Database(DatabaseError::Query(_)) => ErrorSeverity::Medium,

            IndexerError::Database(DatabaseError::NotFound(_)) => ErrorSeverity::Low,
        }
    }

    /// Check if the error is recoverable (can be retried)
    pub fn is_recoverable(&self) -> bool {
        match self {
            IndexerError::Rpc(e) => e.is_recoverable(),
            IndexerError::Database(DatabaseError::Lock(_)) => true,
            _ => false,
        }
    }

    /// Digest of the transaction the failure is about, when known
    pub fn digest(&self) -> Option<&str> {
        match self {
            IndexerError::Database(DatabaseError::Upsert { digest, .. })
            | IndexerError::Database(DatabaseError::Serialization { digest, .. })
            | IndexerError::Processing(ProcessingError::EnvelopeDecode { digest, .. }) => {
                Some(digest)
            }
            _ => None,
        }
    }
}
