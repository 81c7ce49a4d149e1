use rusqlite::{params, Connection, OptionalExtension};

use ctlstore_sql::generator;
use ctlstore_types::{Engine, Field, FieldName, FieldType, MetaTable, TableName};

use crate::error::{EngineError, Result};

/// Creates a family row. Idempotent conflict is *not* implied: spec.md 6
/// says `POST /families/{f}` returns 409 if it already exists.
pub fn create_family(conn: &Connection, family: &str) -> Result<()> {
    let existing: Option<i64> = conn
        .query_row("SELECT 1 FROM families WHERE family_name = ?1", params![family], |r| r.get(0))
        .optional()?;
    if existing.is_some() {
        return Err(EngineError::Conflict(format!("family {family:?} already exists")));
    }
    conn.execute("INSERT INTO families(family_name) VALUES (?1)", params![family])?;
    Ok(())
}

pub fn family_exists(conn: &Connection, family: &str) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT 1 FROM families WHERE family_name = ?1", params![family], |r| r.get(0))
        .optional()?;
    Ok(found.is_some())
}

/// Lists every table materialized under `family`, by scanning `sqlite_master`
/// for the `family___*` naming convention (spec.md 6: `GET /schema/family/{f}`).
pub fn list_family_tables(conn: &Connection, family: &str) -> Result<Vec<String>> {
    if !family_exists(conn, family)? {
        return Err(EngineError::NotFound(format!("family {family:?} not found")));
    }
    let prefix = format!("{family}{}", ctlstore_types::FAMILY_TABLE_SEPARATOR);
    let pattern = format!("{prefix}%");
    let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table' AND name LIKE ?1")?;
    let rows = stmt.query_map(params![pattern], |r| r.get::<_, String>(0))?;
    let mut tables = Vec::new();
    for row in rows {
        let name: String = row?;
        if let Some(table) = name.strip_prefix(&prefix) {
            tables.push(table.to_owned());
        }
    }
    tables.sort();
    Ok(tables)
}

/// Reconstructs a [`MetaTable`] for `family.table` by introspecting the
/// materialized table via `PRAGMA table_info`, the source of truth for
/// schema shape (no separate schema-catalog table is persisted; see
/// DESIGN.md). Returns `Ok(None)` if the table does not exist.
pub fn load_table(conn: &Connection, engine: Engine, family: &str, table: &str) -> Result<Option<MetaTable>> {
    let family_name = ctlstore_types::FamilyName::new(family)
        .map_err(|e| EngineError::InvariantViolation(format!("invalid family name {family}: {e}")))?;
    let table_name = TableName::new(table)
        .map_err(|e| EngineError::InvariantViolation(format!("invalid table name {table}: {e}")))?;
    let ldb_name = ctlstore_types::ldb_table_name(&family_name, &table_name);
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({ldb_name})"))?;
    let mut fields = Vec::new();
    let mut key_fields = Vec::new();

    let rows = stmt.query_map([], |r| {
        Ok((r.get::<_, String>(1)?, r.get::<_, String>(2)?, r.get::<_, i64>(5)?))
    })?;

    for row in rows {
        let (name, decl_type, pk_index) = row?;
        let ty = FieldType::from_sql_type(engine, &decl_type).ok_or_else(|| {
            EngineError::InvariantViolation(format!("column {name} of {ldb_name} has unrecognized type {decl_type}"))
        })?;
        let field_name = FieldName::new(&name)
            .map_err(|e| EngineError::InvariantViolation(format!("invalid column name {name}: {e}")))?;
        if pk_index > 0 {
            key_fields.push((pk_index, field_name.clone()));
        }
        fields.push(Field { name: field_name, ty });
    }

    if fields.is_empty() {
        return Ok(None);
    }

    key_fields.sort_by_key(|(idx, _)| *idx);
    let key_fields: Vec<FieldName> = key_fields.into_iter().map(|(_, name)| name).collect();

    let meta = MetaTable::new(engine, family_name, table_name, fields, key_fields)
        .map_err(|e| EngineError::InvariantViolation(format!("reconstructed table fails invariants: {e}")))?;
    Ok(Some(meta))
}

/// Executes `CreateTableDDL` for `table`. DDL is applied outside any caller
/// transaction per the asymmetry described in spec.md 4.5 / 9: the caller is
/// responsible for writing the ledger row first on the authority engine.
pub fn create_table_ddl(conn: &Connection, table: &MetaTable) -> Result<()> {
    conn.execute_batch(&generator::create_table_ddl(table))?;
    Ok(())
}

pub fn add_column_ddl(conn: &Connection, table: &MetaTable, field: &Field) -> Result<()> {
    conn.execute_batch(&generator::add_column_ddl(table, field.name.as_str(), field.ty))?;
    Ok(())
}

pub fn drop_table_ddl(conn: &Connection, table: &MetaTable) -> Result<()> {
    conn.execute_batch(&generator::drop_table_ddl(table))?;
    Ok(())
}

pub fn clear_table_ddl(conn: &Connection, table: &MetaTable) -> Result<()> {
    conn.execute_batch(&generator::clear_table_ddl(table))?;
    Ok(())
}

/// Approximates the on-disk size of `table` in bytes by summing the byte
/// length of every column of every row. Used by the size limiter (spec.md
/// 4.4); exact accounting against SQLite's page layout isn't required by
/// the spec, only a monotonically-increasing proxy for row growth.
pub fn table_size_bytes(conn: &Connection, table: &MetaTable) -> Result<i64> {
    let cols = table
        .fields
        .iter()
        .map(|f| format!("COALESCE(LENGTH(CAST(\"{}\" AS BLOB)),0)", f.name.as_str()))
        .collect::<Vec<_>>()
        .join(" + ");
    let sql = format!("SELECT COALESCE(SUM({cols}),0) FROM \"{}\"", table.ldb_table_name());
    let size: i64 = conn.query_row(&sql, [], |r| r.get(0))?;
    Ok(size)
}
