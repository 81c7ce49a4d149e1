use rusqlite::{params, Connection};

use crate::error::{LdbError, Result};

/// One statement read off the DML ledger, ready to apply to a replica.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DmlStatement {
    pub sequence: i64,
    pub timestamp: i64,
    pub statement: String,
}

pub const BEGIN_MARKER: &str = "--- BEGIN";
pub const COMMIT_MARKER: &str = "--- COMMIT";

#[derive(Debug, Clone, Copy)]
pub enum CheckpointMode {
    Passive,
    Full,
    Restart,
    Truncate,
}

impl CheckpointMode {
    fn as_sql(self) -> &'static str {
        match self {
            CheckpointMode::Passive => "PASSIVE",
            CheckpointMode::Full => "FULL",
            CheckpointMode::Restart => "RESTART",
            CheckpointMode::Truncate => "TRUNCATE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckpointResult {
    pub busy: bool,
    pub log_pages: i64,
    pub checkpointed_pages: i64,
}

/// Applies ledger statements to a single replica database with the three
/// guarantees of spec.md 4.6: transaction shape tracking, sequence
/// monotonicity, and replay rejection.
pub struct LdbWriter {
    conn: Connection,
    tx_open: bool,
}

impl LdbWriter {
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA wal_autocheckpoint = 0;
            CREATE TABLE IF NOT EXISTS _ldb_seq (id INTEGER PRIMARY KEY, seq INTEGER NOT NULL);
            CREATE TABLE IF NOT EXISTS _ldb_last_update (name TEXT PRIMARY KEY, timestamp INTEGER NOT NULL);
            "#,
        )?;
        Ok(Self { conn, tx_open: false })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Applies one ledger statement, per the transaction shape of spec.md
    /// 4.6: `--- BEGIN`/`--- COMMIT` open and close a writer-held
    /// transaction spanning subsequent calls; any other statement runs
    /// inside that transaction if one is open, or in its own single-
    /// statement transaction otherwise.
    pub fn apply(&mut self, stmt: &DmlStatement) -> Result<()> {
        match stmt.statement.as_str() {
            BEGIN_MARKER => {
                if self.tx_open {
                    log::warn!("--- BEGIN received at seq {} while a ledger transaction was already open", stmt.sequence);
                    return Err(LdbError::InvariantViolation(
                        "--- BEGIN received while a ledger transaction was already open".to_owned(),
                    ));
                }
                self.conn.execute_batch("BEGIN")?;
                self.tx_open = true;
                Ok(())
            }
            COMMIT_MARKER => {
                if !self.tx_open {
                    log::warn!("--- COMMIT received at seq {} with no open ledger transaction", stmt.sequence);
                    return Err(LdbError::InvariantViolation(
                        "--- COMMIT received with no open ledger transaction".to_owned(),
                    ));
                }
                self.conn.execute_batch("COMMIT")?;
                self.tx_open = false;
                Ok(())
            }
            _ => {
                let standalone = !self.tx_open;
                if standalone {
                    self.conn.execute_batch("BEGIN")?;
                }
                match self.apply_one(stmt) {
                    Ok(()) => {
                        if standalone {
                            self.conn.execute_batch("COMMIT")?;
                        }
                        Ok(())
                    }
                    Err(e) => {
                        if standalone {
                            let _ = self.conn.execute_batch("ROLLBACK");
                        }
                        Err(e)
                    }
                }
            }
        }
    }

    fn apply_one(&self, stmt: &DmlStatement) -> Result<()> {
        self.conn.execute(
            "REPLACE INTO _ldb_last_update(name, timestamp) VALUES ('ledger', ?1)",
            params![stmt.timestamp],
        )?;

        let affected = self.conn.execute(
            "INSERT INTO _ldb_seq(id, seq) VALUES (1, ?1)
             ON CONFLICT(id) DO UPDATE SET seq = excluded.seq WHERE excluded.seq > _ldb_seq.seq",
            params![stmt.sequence],
        )?;
        if affected == 0 {
            log::warn!("rejecting replayed ledger sequence {}", stmt.sequence);
            return Err(LdbError::Replay { sequence: stmt.sequence });
        }

        self.conn.execute_batch(&stmt.statement)?;
        Ok(())
    }

    pub fn current_seq(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("SELECT seq FROM _ldb_seq WHERE id = 1", [], |r| r.get(0))
            .unwrap_or(0))
    }

    /// Merges accumulated write-ahead log pages into the main database file.
    pub fn checkpoint(&self, mode: CheckpointMode) -> Result<CheckpointResult> {
        let (busy, log_pages, checkpointed_pages) = self.conn.query_row(
            &format!("PRAGMA wal_checkpoint({})", mode.as_sql()),
            [],
            |r| Ok((r.get::<_, i64>(0)?, r.get::<_, i64>(1)?, r.get::<_, i64>(2)?)),
        )?;
        Ok(CheckpointResult {
            busy: busy != 0,
            log_pages,
            checkpointed_pages,
        })
    }
}

/// Fan-out that applies the same statement to N replicas, collecting every
/// error instead of aborting on the first failure (spec.md 4.6).
pub struct MultiWriter {
    writers: Vec<LdbWriter>,
}

impl MultiWriter {
    pub fn new(writers: Vec<LdbWriter>) -> Self {
        Self { writers }
    }

    pub fn apply(&mut self, stmt: &DmlStatement) -> std::result::Result<(), Vec<LdbError>> {
        let errors: Vec<LdbError> = self
            .writers
            .iter_mut()
            .filter_map(|w| w.apply(stmt).err())
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
