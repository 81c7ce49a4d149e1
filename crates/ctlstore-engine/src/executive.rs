use parking_lot::Mutex;
use rusqlite::params;
use std::sync::Arc;

use ctlstore_sql::generator;
use ctlstore_sql::value::SqlValue;
use ctlstore_types::{Engine, Field, FamilyName, FieldName, MetaTable, TableName, WriterName};

use crate::db::AuthorityDb;
use crate::error::{EngineError, Result};
use crate::ledger::LedgerWriter;
use crate::limiter::{self, LimiterCache};
use crate::mutators;
use crate::schema;

/// Maximum number of mutation requests in a single `Mutate` call (spec.md
/// 4.5 "Max request size").
pub const MAX_BATCH_SIZE: usize = 100;
/// Maximum request body size.
pub const MAX_REQUEST_BODY_BYTES: usize = 1024 * 1024;
/// Maximum size of a single field value.
pub const MAX_FIELD_VALUE_BYTES: usize = 512 * 1024;

/// One row-level write or delete within a `Mutate` call.
#[derive(Debug, Clone)]
pub struct MutationRequest {
    pub table: TableName,
    pub delete: bool,
    /// For an upsert: one value per field, in the table's field order.
    /// For a delete: one value per key field, in the table's key order.
    pub values: Vec<SqlValue>,
}

#[derive(Debug, Clone)]
pub struct MutateCall {
    pub family: FamilyName,
    pub writer: WriterName,
    pub secret: String,
    pub new_cookie: Vec<u8>,
    pub check_cookie: Option<Vec<u8>>,
    pub mutations: Vec<MutationRequest>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutateOutcome {
    pub last_seq: i64,
}

/// Whether destructive schema operations are permitted (spec.md 6: drop
/// table and clear-rows are both "gated by a server flag").
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutiveConfig {
    pub allow_drop_table: bool,
    pub allow_clear_rows: bool,
}

/// The write authority. Orchestrates every mutate/DDL operation under the
/// ledger lock discipline of spec.md 4.5.
pub struct Executive {
    db: AuthorityDb,
    engine: Engine,
    config: ExecutiveConfig,
    limits: Arc<Mutex<LimiterCache>>,
}

impl Executive {
    pub fn new(db: AuthorityDb, config: ExecutiveConfig) -> Self {
        Self {
            db,
            engine: Engine::Authority,
            config,
            limits: Arc::new(Mutex::new(LimiterCache::default())),
        }
    }

    /// Reloads the cached rate/size limit maps. Intended to be called on the
    /// 1-minute limiter tick and the 10-second sizer tick (spec.md 5); both
    /// ticks collapse to the same refresh here since both maps are cheap to
    /// reload together.
    pub fn refresh_limits(&self) -> Result<()> {
        self.db.with_conn(|conn| {
            let mut cache = self.limits.lock();
            cache.refresh(conn)
        })
    }

    /// Deletes stale `writer_usage` rows (spec.md 4.4 Housekeeping, 1-hour
    /// tick).
    pub fn gc_usage(&self) -> Result<usize> {
        self.db.with_conn(|conn| limiter::gc_usage(conn))
    }

    pub fn create_family(&self, family: &str) -> Result<()> {
        self.db.with_conn(|conn| schema::create_family(conn, family))
    }

    pub fn register_writer(&self, writer: &str, secret: &str) -> Result<()> {
        if !(3..=100).contains(&secret.len()) {
            return Err(EngineError::BadRequest("secret must be 3-100 bytes".to_owned()));
        }
        self.db.with_conn(|conn| mutators::register(conn, writer, secret))
    }

    pub fn get_cookie(&self, writer: &str, secret: &str) -> Result<Vec<u8>> {
        self.db.with_conn(|conn| {
            mutators::get(conn, writer, secret)?.ok_or_else(|| EngineError::NotFound(format!("writer {writer:?} not found")))
        })
    }

    /// `POST /cookie`: an unconditional cookie overwrite, not gated by the
    /// ledger lock since it doesn't touch the ledger (spec.md 6).
    pub fn set_cookie(&self, writer: &str, secret: &str, cookie: &[u8]) -> Result<()> {
        self.db.with_conn(|conn| mutators::update(conn, writer, secret, cookie, None))
    }

    pub fn list_family_tables(&self, family: &str) -> Result<Vec<String>> {
        self.db.with_conn(|conn| schema::list_family_tables(conn, family))
    }

    pub fn get_table_schema(&self, family: &str, table: &str) -> Result<MetaTable> {
        self.db.with_conn(|conn| {
            schema::load_table(conn, self.engine, family, table)?
                .ok_or_else(|| EngineError::NotFound(format!("table {family}.{table} not found")))
        })
    }

    /// `GET /status`: highest ledger sequence written and the number of
    /// registered writers (spec.md 6).
    pub fn status(&self) -> Result<(i64, i64)> {
        self.db.with_conn(|conn| {
            let seq: i64 = conn.query_row("SELECT COALESCE(MAX(seq), 0) FROM ctlstore_dml_ledger", [], |r| r.get(0))?;
            let writers: i64 = conn.query_row("SELECT COUNT(*) FROM mutators", [], |r| r.get(0))?;
            Ok((seq, writers))
        })
    }

    pub fn set_global_rate_limit(&self, amount_per_minute: i64) -> Result<()> {
        self.db.with_conn(|conn| limiter::set_global_rate(conn, amount_per_minute))
    }

    pub fn set_writer_rate_limit(&self, writer: &str, amount_per_minute: i64) -> Result<()> {
        self.db.with_conn(|conn| limiter::set_writer_rate(conn, writer, amount_per_minute))
    }

    pub fn get_writer_rate_limit(&self, writer: &str) -> Result<Option<i64>> {
        self.db.with_conn(|conn| limiter::get_writer_rate(conn, writer))
    }

    pub fn delete_writer_rate_limit(&self, writer: &str) -> Result<bool> {
        self.db.with_conn(|conn| limiter::delete_writer_rate(conn, writer))
    }

    pub fn list_writer_rate_limits(&self) -> Result<Vec<(String, i64)>> {
        self.db.with_conn(|conn| limiter::list_writer_rates(conn))
    }

    pub fn set_table_size_limit(&self, family: &str, table: &str, limit: limiter::SizeLimit) -> Result<()> {
        self.db.with_conn(|conn| limiter::set_table_size(conn, family, table, limit))
    }

    pub fn get_table_size_limit(&self, family: &str, table: &str) -> Result<Option<limiter::SizeLimit>> {
        self.db.with_conn(|conn| limiter::get_table_size(conn, family, table))
    }

    pub fn delete_table_size_limit(&self, family: &str, table: &str) -> Result<bool> {
        self.db.with_conn(|conn| limiter::delete_table_size(conn, family, table))
    }

    pub fn list_table_size_limits(&self) -> Result<Vec<(String, String, limiter::SizeLimit)>> {
        self.db.with_conn(|conn| limiter::list_table_sizes(conn))
    }

    /// Creates a table and its ledger row, respecting the non-transactional
    /// DDL asymmetry of spec.md 4.5/9: the ledger row is written first,
    /// inside the transaction; the DDL itself runs outside it on engines
    /// where `ddl_is_transactional()` is false.
    pub fn create_table(&self, table: &MetaTable) -> Result<()> {
        let exists = self.db.with_conn(|conn| schema::family_exists(conn, table.family.as_str()))?;
        if !exists {
            return Err(EngineError::NotFound(format!("family {:?} not found", table.family.as_str())));
        }
        self.apply_ddl(table, |t| generator::create_table_ddl(t))
    }

    /// Adds columns to an existing table, following the same ledger-then-DDL
    /// ordering as `create_table`, one statement per field.
    pub fn add_fields(&self, table: &MetaTable, new_fields: &[Field]) -> Result<()> {
        for field in new_fields {
            let field = field.clone();
            self.apply_ddl(table, move |t| generator::add_column_ddl(t, field.name.as_str(), field.ty))?;
        }
        Ok(())
    }

    pub fn drop_table(&self, table: &MetaTable) -> Result<()> {
        if !self.config.allow_drop_table {
            return Err(EngineError::BadRequest("drop table is disabled".to_owned()));
        }
        self.apply_ddl(table, |t| generator::drop_table_ddl(t))
    }

    pub fn clear_table(&self, table: &MetaTable) -> Result<()> {
        if !self.config.allow_clear_rows {
            return Err(EngineError::BadRequest("clear rows is disabled".to_owned()));
        }
        self.apply_ddl(table, |t| generator::clear_table_ddl(t))
    }

    /// Applies a DDL statement under the ledger-lock discipline, honoring
    /// the transactional-DDL asymmetry of spec.md 4.5/9.
    ///
    /// On the replica engine (`ddl_is_transactional() == true`) the ledger
    /// row and the DDL share one transaction: either both land or neither
    /// does. On the authority engine the ledger row is committed first and
    /// the DDL runs afterwards outside that transaction; if the DDL fails,
    /// the already-committed ledger row is deleted as a compensating action
    /// so no orphan ledger entry survives a failed schema change.
    fn apply_ddl(&self, table: &MetaTable, gen: impl Fn(&MetaTable) -> String) -> Result<()> {
        self.db.with_conn(|conn| {
            let stmt = gen(table);

            if self.engine.ddl_is_transactional() {
                let tx = conn.unchecked_transaction()?;
                let result = (|| -> Result<()> {
                    tx.execute("UPDATE locks SET clock = clock + 1 WHERE id = 'ledger'", [])?;
                    let mut writer = LedgerWriter::new(&tx)?;
                    writer.add(&stmt, Some(table.family.as_str()), Some(table.name.as_str()))?;
                    writer.close()?;
                    tx.execute_batch(&stmt)?;
                    Ok(())
                })();
                match result {
                    Ok(()) => tx.commit().map_err(EngineError::from),
                    Err(e) => {
                        let _ = tx.rollback();
                        Err(e)
                    }
                }
            } else {
                let seq = {
                    let tx = conn.unchecked_transaction()?;
                    tx.execute("UPDATE locks SET clock = clock + 1 WHERE id = 'ledger'", [])?;
                    let seq = {
                        let mut writer = LedgerWriter::new(&tx)?;
                        let seq = writer.add(&stmt, Some(table.family.as_str()), Some(table.name.as_str()))?;
                        writer.close()?;
                        seq
                    };
                    tx.commit()?;
                    seq
                };
                match conn.execute_batch(&stmt) {
                    Ok(()) => Ok(()),
                    Err(e) => {
                        conn.execute("DELETE FROM ctlstore_dml_ledger WHERE seq = ?1", params![seq])?;
                        Err(EngineError::from(e))
                    }
                }
            }
        })
    }

    /// Runs the Executive's core state machine for a `Mutate` call
    /// (spec.md 4.5 steps 1-9).
    pub fn mutate(&self, call: MutateCall) -> Result<MutateOutcome> {
        if call.mutations.is_empty() {
            return Err(EngineError::BadRequest("mutation batch must be non-empty".to_owned()));
        }
        if call.mutations.len() > MAX_BATCH_SIZE {
            return Err(EngineError::PayloadTooLarge(format!(
                "batch has {} mutations, exceeding the {MAX_BATCH_SIZE} cap",
                call.mutations.len()
            )));
        }

        self.db.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;

            let result = (|| -> Result<MutateOutcome> {
                // Step 2: fetch metadata for every referenced table.
                let mut tables = std::collections::HashMap::new();
                for m in &call.mutations {
                    if !tables.contains_key(m.table.as_str()) {
                        let meta = schema::load_table(&tx, self.engine, call.family.as_str(), m.table.as_str())?
                            .ok_or_else(|| EngineError::NotFound(format!("table {}.{} not found", call.family, m.table)))?;
                        tables.insert(m.table.as_str().to_owned(), meta);
                    }
                }

                // Step 3: check limits under this tx.
                {
                    let cache = self.limits.lock().clone();
                    limiter::check_sizes(
                        &cache,
                        tables.keys().map(|t| (call.family.as_str().to_owned(), t.clone())),
                        |family, table| {
                            let meta = &tables[table];
                            debug_assert_eq!(meta.family.as_str(), family);
                            Ok(Some(schema::table_size_bytes(&tx, meta)?))
                        },
                    )?;
                    limiter::check_and_record_rate(&tx, &cache, call.writer.as_str(), call.mutations.len() as i64)?;
                }

                // Step 4: ledger lock.
                tx.execute("UPDATE locks SET clock = clock + 1 WHERE id = 'ledger'", [])?;

                // Step 5: CAS the writer's cookie.
                mutators::update(
                    &tx,
                    call.writer.as_str(),
                    &call.secret,
                    &call.new_cookie,
                    call.check_cookie.as_deref(),
                )?;

                let mut writer = LedgerWriter::new(&tx)?;
                let mut last_seq = 0;

                // Step 6: BEGIN marker for multi-statement batches.
                if call.mutations.len() > 1 {
                    last_seq = writer.begin_tx()?;
                }

                // Step 7: generate, execute, and ledger each request.
                for m in &call.mutations {
                    let meta = &tables[m.table.as_str()];
                    let stmt = if m.delete {
                        generator::delete_dml(meta, &m.values)?
                    } else {
                        generator::upsert_dml(meta, &m.values)?
                    };
                    tx.execute_batch(&stmt)?;
                    last_seq = writer.add(&stmt, Some(call.family.as_str()), Some(m.table.as_str()))?;
                }

                // Step 8: COMMIT marker for multi-statement batches.
                if call.mutations.len() > 1 {
                    last_seq = writer.commit_tx()?;
                }
                writer.close()?;

                Ok(MutateOutcome { last_seq })
            })();

            match result {
                Ok(outcome) => {
                    tx.commit()?;
                    Ok(outcome)
                }
                Err(e) => {
                    let _ = tx.rollback();
                    Err(e)
                }
            }
        })
    }
}
