use serde::{Deserialize, Serialize};

/// Which SQL engine a [`crate::table::MetaTable`] is being rendered for.
///
/// The authoritative engine and the replica engine are allowed to map field
/// types onto different native SQL column types (spec.md 3: "Each has a
/// canonical SQL type per engine (authoritative engine != replica engine is
/// supported)").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Engine {
    Authority,
    Replica,
}

impl Engine {
    /// Whether DDL executed on this engine participates in the surrounding
    /// SQL transaction.
    ///
    /// The authoritative engine in this system models non-transactional
    /// DDL by design contract (spec.md 4.5, 9): a failed DDL statement must
    /// not roll back schema state, only the ledger row recording it, so the
    /// Executive writes that ledger row *before* issuing the DDL and runs
    /// the DDL itself outside the enclosing transaction. The replica engine
    /// runs DDL inside its ledger-transaction scope like any other
    /// statement. Both are backed by the same underlying SQL engine in this
    /// implementation (see DESIGN.md); this method is the single place that
    /// asymmetry is pinned down.
    pub fn ddl_is_transactional(self) -> bool {
        matches!(self, Engine::Replica)
    }
}

/// The closed set of column types a table's fields may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// UTF-8 string, at most 191 bytes.
    String,
    /// 64-bit signed integer.
    Integer,
    /// IEEE-754 double.
    Decimal,
    /// Large text blob, unbounded.
    Text,
    /// Large binary blob, unbounded.
    Binary,
    /// Short binary string, at most 191 bytes.
    Bytestring,
}

/// Maximum length, in bytes, of a `string` or `bytestring` field (spec.md 3).
pub const SHORT_FIELD_MAX_LEN: usize = 191;

impl FieldType {
    /// Whether this type may appear in a table's key-field list (spec.md 3:
    /// "Only string, integer, bytestring may be key fields").
    pub fn can_be_key(self) -> bool {
        matches!(self, FieldType::String | FieldType::Integer | FieldType::Bytestring)
    }

    /// True for the two types whose values are base64-encoded on the wire
    /// and rendered as SQL hex-blob literals (spec.md 4.1).
    pub fn is_binary_like(self) -> bool {
        matches!(self, FieldType::Binary | FieldType::Bytestring)
    }

    /// The canonical SQL column type for this field on the given engine.
    ///
    /// Each of the six types maps to a *distinct* declared type string on
    /// both engines, even where engines alias several declared types onto
    /// the same storage affinity (e.g. SQLite has no real `VARCHAR(n)`
    /// enforcement) — schema introspection (`PRAGMA table_info`) recovers
    /// the original [`FieldType`] from this string via [`FieldType::from_sql_type`],
    /// so the mapping must stay injective per engine.
    pub fn sql_type(self, engine: Engine) -> &'static str {
        use Engine::*;
        use FieldType::*;
        match (self, engine) {
            (String, Authority) => "VARCHAR(191)",
            (String, Replica) => "VARCHAR(191)",
            (Integer, _) => "BIGINT",
            (Decimal, Authority) => "DOUBLE",
            (Decimal, Replica) => "REAL",
            (Text, Authority) => "LONGTEXT",
            (Text, Replica) => "TEXT",
            (Binary, Authority) => "LONGBLOB",
            (Binary, Replica) => "BLOB",
            (Bytestring, Authority) => "VARBINARY(191)",
            (Bytestring, Replica) => "VARBINARY(191)",
        }
    }

    /// Recovers a [`FieldType`] from a declared SQL column type string, as
    /// returned by `PRAGMA table_info` on a materialized `family___table`.
    /// Inverse of [`FieldType::sql_type`].
    pub fn from_sql_type(engine: Engine, decl: &str) -> Option<Self> {
        let decl = decl.to_ascii_uppercase();
        Some(match (decl.as_str(), engine) {
            ("VARCHAR(191)", Authority) => FieldType::String,
            ("VARCHAR(191)", Replica) => FieldType::String,
            ("BIGINT", _) => FieldType::Integer,
            ("DOUBLE", Authority) => FieldType::Decimal,
            ("REAL", Replica) => FieldType::Decimal,
            ("LONGTEXT", Authority) => FieldType::Text,
            ("TEXT", Replica) => FieldType::Text,
            ("LONGBLOB", Authority) => FieldType::Binary,
            ("BLOB", Replica) => FieldType::Binary,
            ("VARBINARY(191)", Authority) => FieldType::Bytestring,
            ("VARBINARY(191)", Replica) => FieldType::Bytestring,
            _ => return None,
        })
    }

    pub fn wire_name(self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Decimal => "decimal",
            FieldType::Text => "text",
            FieldType::Binary => "binary",
            FieldType::Bytestring => "bytestring",
        }
    }
}

impl std::str::FromStr for FieldType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "string" => Ok(FieldType::String),
            "integer" => Ok(FieldType::Integer),
            "decimal" => Ok(FieldType::Decimal),
            "text" => Ok(FieldType::Text),
            "binary" => Ok(FieldType::Binary),
            "bytestring" => Ok(FieldType::Bytestring),
            other => Err(format!("unknown field type {other:?}")),
        }
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_scalar_types_are_keyable() {
        assert!(FieldType::String.can_be_key());
        assert!(FieldType::Integer.can_be_key());
        assert!(FieldType::Bytestring.can_be_key());
        assert!(!FieldType::Decimal.can_be_key());
        assert!(!FieldType::Text.can_be_key());
        assert!(!FieldType::Binary.can_be_key());
    }

    #[test]
    fn sql_type_differs_per_engine_for_decimal() {
        assert_ne!(
            FieldType::Decimal.sql_type(Engine::Authority),
            FieldType::Decimal.sql_type(Engine::Replica)
        );
    }

    #[test]
    fn sql_type_is_injective_within_each_engine() {
        use std::collections::HashSet;
        for engine in [Engine::Authority, Engine::Replica] {
            let types = [
                FieldType::String,
                FieldType::Integer,
                FieldType::Decimal,
                FieldType::Text,
                FieldType::Binary,
                FieldType::Bytestring,
            ];
            let decls: HashSet<_> = types.iter().map(|t| t.sql_type(engine)).collect();
            assert_eq!(decls.len(), types.len(), "{engine:?} sql_type mapping is not injective");
        }
    }

    #[test]
    fn sql_type_roundtrips_through_from_sql_type() {
        for engine in [Engine::Authority, Engine::Replica] {
            for ty in [
                FieldType::String,
                FieldType::Integer,
                FieldType::Decimal,
                FieldType::Text,
                FieldType::Binary,
                FieldType::Bytestring,
            ] {
                let decl = ty.sql_type(engine);
                assert_eq!(FieldType::from_sql_type(engine, decl), Some(ty), "{engine:?} {ty:?}");
            }
        }
    }

    #[test]
    fn only_replica_has_transactional_ddl() {
        assert!(!Engine::Authority.ddl_is_transactional());
        assert!(Engine::Replica.ddl_is_transactional());
    }

    #[test]
    fn roundtrips_wire_name() {
        for ty in [
            FieldType::String,
            FieldType::Integer,
            FieldType::Decimal,
            FieldType::Text,
            FieldType::Binary,
            FieldType::Bytestring,
        ] {
            assert_eq!(ty.wire_name().parse::<FieldType>().unwrap(), ty);
        }
    }
}
