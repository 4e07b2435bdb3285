use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::config::DatabaseConfig;
use crate::database::schema::initialize_schema;
use crate::error::DatabaseError;
use crate::logging::{MetricsLogger, PerformanceMonitor};
use crate::models::{CanonicalTransaction, EventRecord, TransactionStatus};

const SELECT_COLUMNS: &str = "digest, sender, timestamp, checkpoint, transaction_type, status,
     package_id, function, total_gas_used, created_objects, deleted_objects, modified_objects, events";

/// Whether an upsert created the row or replaced an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Replaced,
}

/// Durable, digest-keyed store of canonical transactions
pub struct TransactionStore {
    conn: Arc<Mutex<Connection>>,
}

impl TransactionStore {
    /// Open the store described by `config` and initialize the schema
    pub fn open(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let conn = Connection::open(&config.path)?;
        conn.busy_timeout(Duration::from_millis(u64::from(config.busy_timeout_ms)))?;

        if config.enable_wal_mode {
            let mode: String =
                conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
            log::debug!("SQLite journal mode set to {}", mode);
        }

        Self::with_connection(conn)
    }

    /// Open a file-backed store with default settings
    pub fn new(db_path: &str) -> Result<Self, DatabaseError> {
        Self::open(&DatabaseConfig {
            path: db_path.to_string(),
            ..DatabaseConfig::default()
        })
    }

    /// Create an in-memory store for testing
    pub fn new_in_memory() -> Result<Self, DatabaseError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, DatabaseError> {
        initialize_schema(&conn).map_err(|e| DatabaseError::Schema(e.to_string()))?;

        Ok(TransactionStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, DatabaseError> {
        self.conn
            .lock()
            .map_err(|_| DatabaseError::Lock("Failed to acquire lock".to_string()))
    }

    #[cfg(test)]
    pub(crate) fn conn_for_tests(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap()
    }

    /// Insert the record, or replace every non-key column of the existing
    /// row with the same digest.
    pub fn upsert(&self, record: &CanonicalTransaction) -> Result<UpsertOutcome, DatabaseError> {
        let monitor = PerformanceMonitor::new("store_upsert")
            .with_metadata("digest", serde_json::json!(record.digest));

        let result = self.upsert_row(record);
        let duration = monitor.finish_with_result(&result);

        if let Ok(outcome) = &result {
            MetricsLogger::log_upsert(&record.digest, *outcome == UpsertOutcome::Replaced, duration);
        }
        result
    }

    fn upsert_row(&self, record: &CanonicalTransaction) -> Result<UpsertOutcome, DatabaseError> {
        let serialize = |source: serde_json::Error| DatabaseError::Serialization {
            digest: record.digest.clone(),
            source,
        };
        let created = serde_json::to_string(&record.created_objects).map_err(serialize)?;
        let deleted = serde_json::to_string(&record.deleted_objects).map_err(serialize)?;
        let modified = serde_json::to_string(&record.modified_objects).map_err(serialize)?;
        let events = serde_json::to_string(&record.events).map_err(serialize)?;

        let upsert_error = |source: rusqlite::Error| DatabaseError::Upsert {
            digest: record.digest.clone(),
            source,
        };

        let conn = self.lock()?;
        let tx = conn.unchecked_transaction().map_err(upsert_error)?;

        let existed: bool = tx
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM transactions WHERE digest = ?1)",
                params![record.digest],
                |row| row.get(0),
            )
            .map_err(upsert_error)?;

        tx.execute(
            "INSERT INTO transactions (digest, sender, timestamp, checkpoint, transaction_type, status,
                 package_id, function, total_gas_used, created_objects, deleted_objects, modified_objects, events)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
             ON CONFLICT(digest) DO UPDATE SET
                 sender = excluded.sender,
                 timestamp = excluded.timestamp,
                 checkpoint = excluded.checkpoint,
                 transaction_type = excluded.transaction_type,
                 status = excluded.status,
                 package_id = excluded.package_id,
                 function = excluded.function,
                 total_gas_used = excluded.total_gas_used,
                 created_objects = excluded.created_objects,
                 deleted_objects = excluded.deleted_objects,
                 modified_objects = excluded.modified_objects,
                 events = excluded.events",
            params![
                record.digest,
                record.sender,
                record.timestamp.timestamp_millis(),
                record.checkpoint,
                record.transaction_type,
                record.status.as_str(),
                record.package_id,
                record.function,
                record.total_gas_used,
                created,
                deleted,
                modified,
                events,
            ],
        )
        .map_err(upsert_error)?;

        tx.commit().map_err(upsert_error)?;

        Ok(if existed {
            UpsertOutcome::Replaced
        } else {
            UpsertOutcome::Inserted
        })
    }

    /// Whether a row with this digest exists
    pub fn exists(&self, digest: &str) -> Result<bool, DatabaseError> {
        let conn = self.lock()?;
        let exists = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM transactions WHERE digest = ?1)",
            params![digest],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Number of stored transactions
    pub fn count(&self) -> Result<u64, DatabaseError> {
        let conn = self.lock()?;
        let count: u64 = conn.query_row("SELECT COUNT(*) FROM transactions", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Fetch one transaction by digest
    pub fn get_transaction(&self, digest: &str) -> Result<CanonicalTransaction, DatabaseError> {
        let row = {
            let conn = self.lock()?;
            conn.query_row(
                &format!("SELECT {} FROM transactions WHERE digest = ?1", SELECT_COLUMNS),
                params![digest],
                TransactionRow::from_row,
            )
            .optional()?
        };

        row.ok_or_else(|| DatabaseError::NotFound(digest.to_string()))?
            .into_transaction()
    }

    /// Newest transactions first, by checkpoint then timestamp
    pub fn get_recent_transactions(
        &self,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<CanonicalTransaction>, DatabaseError> {
        let rows = {
            let conn = self.lock()?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM transactions
                 ORDER BY checkpoint DESC, timestamp DESC, digest ASC
                 LIMIT ?1 OFFSET ?2",
                SELECT_COLUMNS
            ))?;
            let mapped = stmt.query_map(params![limit, offset], TransactionRow::from_row)?;
            let rows = mapped.collect::<Result<Vec<_>, _>>()?;
            rows
        };

        rows.into_iter().map(TransactionRow::into_transaction).collect()
    }
}

/// Raw column values of one `transactions` row
#[derive(Debug, Clone)]
struct TransactionRow {
    digest: String,
    sender: String,
    timestamp_ms: i64,
    checkpoint: i64,
    transaction_type: String,
    status: String,
    package_id: Option<String>,
    function: Option<String>,
    total_gas_used: i64,
    created_objects: String,
    deleted_objects: String,
    modified_objects: String,
    events: String,
}

impl TransactionRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(TransactionRow {
            digest: row.get(0)?,
            sender: row.get(1)?,
            timestamp_ms: row.get(2)?,
            checkpoint: row.get(3)?,
            transaction_type: row.get(4)?,
            status: row.get(5)?,
            package_id: row.get(6)?,
            function: row.get(7)?,
            total_gas_used: row.get(8)?,
            created_objects: row.get(9)?,
            deleted_objects: row.get(10)?,
            modified_objects: row.get(11)?,
            events: row.get(12)?,
        })
    }

    fn into_transaction(self) -> Result<CanonicalTransaction, DatabaseError> {
        let decode_list = |column: &str, text: &str| -> Result<Vec<String>, DatabaseError> {
            serde_json::from_str(text).map_err(|e| {
                DatabaseError::Query(format!("Invalid {} for {}: {}", column, self.digest, e))
            })
        };

        let timestamp = DateTime::<Utc>::from_timestamp_millis(self.timestamp_ms).ok_or_else(|| {
            DatabaseError::Query(format!("Invalid timestamp for {}: {}", self.digest, self.timestamp_ms))
        })?;
        let created_objects = decode_list("created_objects", &self.created_objects)?;
        let deleted_objects = decode_list("deleted_objects", &self.deleted_objects)?;
        let modified_objects = decode_list("modified_objects", &self.modified_objects)?;
        let events: Vec<EventRecord> = serde_json::from_str(&self.events)
            .map_err(|e| DatabaseError::Query(format!("Invalid events for {}: {}", self.digest, e)))?;

        Ok(CanonicalTransaction {
            status: TransactionStatus::from_effects(Some(&self.status)),
            digest: self.digest,
            sender: self.sender,
            timestamp,
            checkpoint: self.checkpoint,
            transaction_type: self.transaction_type,
            package_id: self.package_id,
            function: self.function,
            total_gas_used: self.total_gas_used,
            created_objects,
            deleted_objects,
            modified_objects,
            events,
        })
    }
}
