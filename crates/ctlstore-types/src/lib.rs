//! Validated identifiers, field types and table schema descriptions shared
//! by every other ctlstore crate.

pub mod error;
pub mod field_type;
pub mod ident;
pub mod table;

pub use error::{IdentError, TableError};
pub use field_type::{Engine, FieldType, SHORT_FIELD_MAX_LEN};
pub use ident::{ldb_table_name, FamilyName, FieldName, TableName, WriterName, FAMILY_TABLE_SEPARATOR};
pub use table::{Field, MetaTable};
