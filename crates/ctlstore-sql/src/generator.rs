use ctlstore_types::MetaTable;
use thiserror::Error;

use crate::value::{quote, SqlValue};

/// A generated statement exceeded 768 KiB (spec.md 4.5 step 7).
pub const MAX_STATEMENT_LEN: usize = 768 * 1024;

#[derive(Debug, Error, PartialEq)]
pub enum GenError {
    #[error("expected {expected} values, got {got}")]
    ValueCountMismatch { expected: usize, got: usize },
    #[error("expected {expected} key values, got {got}")]
    KeyCountMismatch { expected: usize, got: usize },
    #[error("generated statement is {len} bytes, exceeding the {max} byte cap")]
    StatementTooLarge { len: usize, max: usize },
}

fn is_safe_ident(ident: &str) -> bool {
    !ident.is_empty() && ident.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Quotes `ident` for interpolation into generated SQL.
///
/// Identifiers reaching this function always come from validated
/// `FamilyName`/`TableName`/`FieldName` newtypes, so the grammar check below
/// can never fail in practice. Per spec.md 4.1, a violation is a programming
/// bug: panic in debug builds, reject (produce deliberately unparseable SQL)
/// in release.
fn quote_ident(ident: &str) -> String {
    debug_assert!(is_safe_ident(ident), "identifier {ident:?} violates the naming grammar");
    if is_safe_ident(ident) {
        format!("\"{ident}\"")
    } else {
        "\"\"".to_owned()
    }
}

fn check_len(stmt: String) -> Result<String, GenError> {
    if stmt.len() > MAX_STATEMENT_LEN {
        Err(GenError::StatementTooLarge {
            len: stmt.len(),
            max: MAX_STATEMENT_LEN,
        })
    } else {
        Ok(stmt)
    }
}

/// `CREATE TABLE family___table ("f1" T1, "f2" T2, ..., PRIMARY KEY("k1","k2"));`
pub fn create_table_ddl(table: &MetaTable) -> String {
    let cols = table
        .fields
        .iter()
        .map(|f| format!("{} {}", quote_ident(f.name.as_str()), f.ty.sql_type(table.engine)))
        .collect::<Vec<_>>()
        .join(", ");
    let keys = table
        .key_fields
        .iter()
        .map(|k| quote_ident(k.as_str()))
        .collect::<Vec<_>>()
        .join(",");
    format!(
        "CREATE TABLE {} ({}, PRIMARY KEY({}));",
        quote_ident(&table.ldb_table_name()),
        cols,
        keys
    )
}

/// `ALTER TABLE family___table ADD COLUMN "f" T`
pub fn add_column_ddl(table: &MetaTable, field_name: &str, field_ty: ctlstore_types::FieldType) -> String {
    format!(
        "ALTER TABLE {} ADD COLUMN {} {}",
        quote_ident(&table.ldb_table_name()),
        quote_ident(field_name),
        field_ty.sql_type(table.engine)
    )
}

/// `DELETE FROM family___table`
pub fn clear_table_ddl(table: &MetaTable) -> String {
    format!("DELETE FROM {}", quote_ident(&table.ldb_table_name()))
}

/// `DROP TABLE IF EXISTS family___table`
pub fn drop_table_ddl(table: &MetaTable) -> String {
    format!("DROP TABLE IF EXISTS {}", quote_ident(&table.ldb_table_name()))
}

/// `REPLACE INTO family___table VALUES(q1, q2, ...)`
///
/// `values` must have exactly one entry per field, in `table.fields` order.
pub fn upsert_dml(table: &MetaTable, values: &[SqlValue]) -> Result<String, GenError> {
    if values.len() != table.fields.len() {
        return Err(GenError::ValueCountMismatch {
            expected: table.fields.len(),
            got: values.len(),
        });
    }
    let rendered = values.iter().map(quote).collect::<Vec<_>>().join(",");
    check_len(format!("REPLACE INTO {} VALUES({})", quote_ident(&table.ldb_table_name()), rendered))
}

/// `DELETE FROM family___table WHERE "k1" = q1 AND "k2" = q2`
///
/// `key_values` must have exactly one entry per key field, in
/// `table.key_fields` order.
pub fn delete_dml(table: &MetaTable, key_values: &[SqlValue]) -> Result<String, GenError> {
    if key_values.len() != table.key_fields.len() {
        return Err(GenError::KeyCountMismatch {
            expected: table.key_fields.len(),
            got: key_values.len(),
        });
    }
    let predicate = table
        .key_fields
        .iter()
        .zip(key_values)
        .map(|(k, v)| format!("{} = {}", quote_ident(k.as_str()), quote(v)))
        .collect::<Vec<_>>()
        .join(" AND ");
    check_len(format!(
        "DELETE FROM {} WHERE {}",
        quote_ident(&table.ldb_table_name()),
        predicate
    ))
}
