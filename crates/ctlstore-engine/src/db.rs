use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::Connection;

use crate::error::Result;

/// A handle to the authority database.
///
/// Writes are globally serialized by the ledger lock row (spec.md 4.5 step
/// 4), so a single shared connection behind a mutex is sufficient here; the
/// "connection pool" of spec.md 5 collapses to a pool of one in this
/// implementation (see DESIGN.md). Cloning an [`AuthorityDb`] is cheap and
/// shares the same underlying connection.
#[derive(Clone)]
pub struct AuthorityDb {
    conn: Arc<Mutex<Connection>>,
}

impl AuthorityDb {
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.bootstrap()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.bootstrap()?;
        Ok(db)
    }

    /// Runs `f` with exclusive access to the underlying connection.
    pub fn with_conn<R>(&self, f: impl FnOnce(&Connection) -> Result<R>) -> Result<R> {
        let guard = self.conn.lock();
        f(&guard)
    }

    /// Creates the bookkeeping tables listed in spec.md 6's "Persisted state
    /// layout on authority DB", if they don't already exist. Idempotent.
    fn bootstrap(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS families (
                    family_name TEXT PRIMARY KEY
                );

                CREATE TABLE IF NOT EXISTS mutators (
                    writer TEXT PRIMARY KEY,
                    secret_hash TEXT NOT NULL,
                    cookie BLOB NOT NULL,
                    clock INTEGER NOT NULL DEFAULT 0
                );

                CREATE TABLE IF NOT EXISTS ctlstore_dml_ledger (
                    seq INTEGER PRIMARY KEY AUTOINCREMENT,
                    statement TEXT NOT NULL,
                    family_name TEXT,
                    table_name TEXT
                );

                CREATE TABLE IF NOT EXISTS locks (
                    id TEXT PRIMARY KEY,
                    clock INTEGER NOT NULL DEFAULT 0
                );
                INSERT OR IGNORE INTO locks(id, clock) VALUES ('ledger', 0);

                CREATE TABLE IF NOT EXISTS max_table_sizes (
                    family_name TEXT NOT NULL,
                    table_name TEXT NOT NULL,
                    warn_size_bytes INTEGER NOT NULL,
                    max_size_bytes INTEGER NOT NULL,
                    PRIMARY KEY (family_name, table_name)
                );

                CREATE TABLE IF NOT EXISTS max_writer_rates (
                    writer_name TEXT PRIMARY KEY,
                    max_rows_per_minute INTEGER NOT NULL
                );

                CREATE TABLE IF NOT EXISTS writer_usage (
                    bucket INTEGER NOT NULL,
                    writer_name TEXT NOT NULL,
                    amount INTEGER NOT NULL,
                    PRIMARY KEY (bucket, writer_name)
                );
                "#,
            )?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_is_idempotent() {
        let db = AuthorityDb::open_in_memory().unwrap();
        db.bootstrap().unwrap();
        db.with_conn(|conn| {
            let clock: i64 = conn.query_row("SELECT clock FROM locks WHERE id = 'ledger'", [], |r| r.get(0))?;
            assert_eq!(clock, 0);
            Ok(())
        })
        .unwrap();
    }
}
