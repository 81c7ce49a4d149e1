use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

use crate::error::IdentError;

/// Reserved separator between a family name and a table name in the
/// materialized LDB table name (`family___table`). No identifier may embed
/// it, so the concatenation is always unambiguous.
pub const FAMILY_TABLE_SEPARATOR: &str = "___";

const MIN_LEN: usize = 1;
const MAX_LEN: usize = 64;

static GRAMMAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").unwrap());

fn validate(kind: &'static str, s: &str) -> Result<(), IdentError> {
    if s.len() < MIN_LEN || s.len() > MAX_LEN {
        return Err(IdentError::Length {
            kind,
            value: s.to_owned(),
            min: MIN_LEN,
            max: MAX_LEN,
        });
    }
    if !GRAMMAR.is_match(s) {
        return Err(IdentError::Grammar {
            kind,
            value: s.to_owned(),
        });
    }
    if s.contains(FAMILY_TABLE_SEPARATOR) {
        return Err(IdentError::ReservedSeparator {
            kind,
            value: s.to_owned(),
        });
    }
    Ok(())
}

macro_rules! ident_newtype {
    ($name:ident, $kind:literal) => {
        #[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Validates and lowercases `s` per the identifier grammar.
            pub fn new(s: impl Into<String>) -> Result<Self, IdentError> {
                let s = s.into().to_lowercase();
                validate($kind, &s)?;
                Ok(Self(s))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($kind, "({:?})"), self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = IdentError;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdentError;
            fn try_from(s: String) -> Result<Self, Self::Error> {
                Self::new(s)
            }
        }

        impl From<$name> for String {
            fn from(v: $name) -> String {
                v.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

ident_newtype!(FamilyName, "family");
ident_newtype!(TableName, "table");
ident_newtype!(FieldName, "field");
ident_newtype!(WriterName, "writer");

impl WriterName {
    /// Writer names additionally carry the 3-100 byte length contract from
    /// the Executive's request validation (spec.md 4.5), which is stricter
    /// than the general identifier bound above.
    pub fn new_writer(s: impl Into<String>) -> Result<Self, IdentError> {
        let raw = s.into();
        if raw.len() < 3 || raw.len() > 100 {
            return Err(IdentError::Length {
                kind: "writer",
                value: raw,
                min: 3,
                max: 100,
            });
        }
        Self::new(raw)
    }
}

/// The materialized LDB table name for a (family, table) pair.
pub fn ldb_table_name(family: &FamilyName, table: &TableName) -> String {
    format!("{family}{FAMILY_TABLE_SEPARATOR}{table}")
}
