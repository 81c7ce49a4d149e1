use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentError {
    #[error("{kind} name {value:?} must be {min}-{max} bytes")]
    Length {
        kind: &'static str,
        value: String,
        min: usize,
        max: usize,
    },
    #[error("{kind} name {value:?} does not match the grammar [a-z][a-z0-9_]*")]
    Grammar { kind: &'static str, value: String },
    #[error("{kind} name {value:?} may not contain the reserved separator \"___\"")]
    ReservedSeparator { kind: &'static str, value: String },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TableError {
    #[error(transparent)]
    Ident(#[from] IdentError),
    #[error("table must declare at least one key field")]
    NoKeyFields,
    #[error("key field {0:?} is not declared in the field list")]
    UnknownKeyField(String),
    #[error("field {field:?} has type {ty:?} and cannot be a key field")]
    InvalidKeyFieldType { field: String, ty: &'static str },
    #[error("duplicate field name {0:?}")]
    DuplicateField(String),
}
