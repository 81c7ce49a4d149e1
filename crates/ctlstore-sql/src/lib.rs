//! Pure DDL/DML generation from [`ctlstore_types::MetaTable`] descriptions,
//! plus the value-quoting rules shared by the generator and the callback
//! layers that re-derive key tuples from row changes.

pub mod generator;
pub mod value;

pub use generator::{
    add_column_ddl, clear_table_ddl, create_table_ddl, delete_dml, drop_table_ddl, upsert_dml, GenError,
    MAX_STATEMENT_LEN,
};
pub use value::{quote, SqlValue, WireValueError};
