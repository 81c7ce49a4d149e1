use rusqlite::{params, Connection};

use crate::error::{EngineError, Result};

/// Reserved statement marking the start of a multi-statement ledger
/// transaction (spec.md 3).
pub const BEGIN_MARKER: &str = "--- BEGIN";
/// Reserved statement marking the end of a multi-statement ledger
/// transaction (spec.md 3).
pub const COMMIT_MARKER: &str = "--- COMMIT";

/// Appends statements and transaction markers to `ctlstore_dml_ledger`.
///
/// Must be constructed and used inside an already-open transaction on the
/// authority connection (spec.md 4.3); it holds a prepared insert for the
/// lifetime of that transaction.
pub struct LedgerWriter<'conn> {
    conn: &'conn Connection,
    insert: rusqlite::Statement<'conn>,
}

impl<'conn> LedgerWriter<'conn> {
    pub fn new(conn: &'conn Connection) -> Result<Self> {
        let insert =
            conn.prepare("INSERT INTO ctlstore_dml_ledger(statement, family_name, table_name) VALUES (?1, ?2, ?3)")?;
        Ok(Self { conn, insert })
    }

    /// Appends `statement` to the ledger and returns its assigned `seq`.
    pub fn add(&mut self, statement: &str, family: Option<&str>, table: Option<&str>) -> Result<i64> {
        self.insert.execute(params![statement, family, table])?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Appends the `--- BEGIN` transaction marker.
    pub fn begin_tx(&mut self) -> Result<i64> {
        self.add(BEGIN_MARKER, None, None)
    }

    /// Appends the `--- COMMIT` transaction marker.
    pub fn commit_tx(&mut self) -> Result<i64> {
        self.add(COMMIT_MARKER, None, None)
    }

    /// Releases the prepared insert. Dropping the writer does the same;
    /// this exists so callers can surface the finalize error explicitly.
    pub fn close(self) -> Result<()> {
        self.insert.finalize().map_err(EngineError::from)
    }
}

/// A row as read back from `ctlstore_dml_ledger`, used by replay /
/// integration tests and by the reflector's catch-up path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerRow {
    pub seq: i64,
    pub statement: String,
    pub family: Option<String>,
    pub table: Option<String>,
}

/// Reads ledger rows with `seq > after`, in order. Used by the reflector to
/// discover new statements to apply.
pub fn read_from(conn: &Connection, after: i64) -> Result<Vec<LedgerRow>> {
    let mut stmt =
        conn.prepare("SELECT seq, statement, family_name, table_name FROM ctlstore_dml_ledger WHERE seq > ?1 ORDER BY seq")?;
    let rows = stmt
        .query_map(params![after], |r| {
            Ok(LedgerRow {
                seq: r.get(0)?,
                statement: r.get(1)?,
                family: r.get(2)?,
                table: r.get(3)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}
