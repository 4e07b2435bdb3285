use rusqlite::{Connection, Result};

/// Create the transactions table and its indexes if they do not exist yet.
///
/// Object-id lists and events are stored as JSON text, `timestamp` as
/// milliseconds since the Unix epoch.
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS transactions (
            digest TEXT PRIMARY KEY NOT NULL,
            sender TEXT NOT NULL,
            timestamp INTEGER NOT NULL,
            checkpoint INTEGER NOT NULL,
            transaction_type TEXT NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('success', 'failure', 'unknown')),
            package_id TEXT,
            function TEXT,
            total_gas_used INTEGER NOT NULL,
            created_objects TEXT NOT NULL DEFAULT '[]',
            deleted_objects TEXT NOT NULL DEFAULT '[]',
            modified_objects TEXT NOT NULL DEFAULT '[]',
            events TEXT NOT NULL DEFAULT '[]'
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_transactions_checkpoint ON transactions(checkpoint)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_transactions_sender ON transactions(sender)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_transactions_package ON transactions(package_id)",
        [],
    )?;

    Ok(())
}
