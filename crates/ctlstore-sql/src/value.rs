use base64::Engine as _;
use thiserror::Error;

/// A decoded SQL value, ready for quoting into a generated statement.
///
/// `binary`/`bytestring` field values arrive over the wire as base64 text
/// (spec.md 4.1) and must be decoded to [`SqlValue::Bytes`] before being
/// passed to the generator; [`SqlValue::from_wire`] does that decoding for
/// the field types that need it.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Decimal(f64),
    Bool(bool),
    /// UTF-8 text. May contain embedded NUL bytes, in which case it is
    /// rendered as a hex blob literal rather than a quoted string (spec.md
    /// 4.1: "prevents replica SQL parser truncation").
    Text(String),
    /// Raw bytes, rendered as `x'<hex>'`.
    Bytes(Vec<u8>),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireValueError {
    #[error("invalid base64 for binary-like field")]
    InvalidBase64,
}

impl SqlValue {
    /// Builds a value for a `binary`/`bytestring` field from its base64 wire
    /// representation.
    pub fn from_base64(s: &str) -> Result<Self, WireValueError> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(s)
            .map_err(|_| WireValueError::InvalidBase64)?;
        Ok(SqlValue::Bytes(bytes))
    }
}

/// Render `v` as a SQL literal.
///
/// - Integers/floats/bools render as their textual literal.
/// - Byte slices render as `x'<lowercase-hex>'`.
/// - Strings containing a NUL byte render as a hex blob (not a quoted
///   string), since replica SQL parsers truncate at the first NUL.
/// - Other strings render single-quoted, with embedded `'` doubled.
/// - `Null` renders as the `NULL` keyword.
pub fn quote(v: &SqlValue) -> String {
    match v {
        SqlValue::Null => "NULL".to_owned(),
        SqlValue::Integer(i) => i.to_string(),
        SqlValue::Decimal(d) => format!("{d}"),
        SqlValue::Bool(b) => (if *b { "1" } else { "0" }).to_owned(),
        SqlValue::Bytes(b) => format!("x'{}'", hex::encode(b)),
        SqlValue::Text(s) if s.contains('\0') => format!("x'{}'", hex::encode(s.as_bytes())),
        SqlValue::Text(s) => format!("'{}'", s.replace('\'', "''")),
    }
}
