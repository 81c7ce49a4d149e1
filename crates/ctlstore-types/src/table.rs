use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::TableError;
use crate::field_type::{Engine, FieldType};
use crate::ident::{FamilyName, FieldName, TableName};

/// A single declared column: name plus type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: FieldName,
    pub ty: FieldType,
}

/// `{family, name, fields, key-fields}` — spec.md 3 "Table".
///
/// Invariants (enforced by [`MetaTable::new`]):
/// - at least one key field
/// - no key field of type `decimal`, `text`, or `binary`
/// - every key-field name exists in the field list
/// - no duplicate field names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaTable {
    pub engine: Engine,
    pub family: FamilyName,
    pub name: TableName,
    pub fields: Vec<Field>,
    pub key_fields: Vec<FieldName>,
}

impl MetaTable {
    pub fn new(
        engine: Engine,
        family: FamilyName,
        name: TableName,
        fields: Vec<Field>,
        key_fields: Vec<FieldName>,
    ) -> Result<Self, TableError> {
        if key_fields.is_empty() {
            return Err(TableError::NoKeyFields);
        }

        let mut seen = HashSet::with_capacity(fields.len());
        for f in &fields {
            if !seen.insert(f.name.as_str()) {
                return Err(TableError::DuplicateField(f.name.as_str().to_owned()));
            }
        }

        for kf in &key_fields {
            let field = fields
                .iter()
                .find(|f| &f.name == kf)
                .ok_or_else(|| TableError::UnknownKeyField(kf.as_str().to_owned()))?;
            if !field.ty.can_be_key() {
                return Err(TableError::InvalidKeyFieldType {
                    field: kf.as_str().to_owned(),
                    ty: field.ty.wire_name(),
                });
            }
        }

        Ok(Self {
            engine,
            family,
            name,
            fields,
            key_fields,
        })
    }

    pub fn field(&self, name: &FieldName) -> Option<&Field> {
        self.fields.iter().find(|f| &f.name == name)
    }

    pub fn is_key_field(&self, name: &FieldName) -> bool {
        self.key_fields.iter().any(|k| k == name)
    }

    pub fn ldb_table_name(&self) -> String {
        crate::ident::ldb_table_name(&self.family, &self.name)
    }

    /// Returns a copy of this schema description rendered for `engine`
    /// instead of `self.engine` (used when the same table needs to be
    /// materialized on both the authority and a replica).
    pub fn for_engine(&self, engine: Engine) -> Self {
        Self {
            engine,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str, ty: FieldType) -> Field {
        Field {
            name: FieldName::new(name).unwrap(),
            ty,
        }
    }

    fn fam() -> FamilyName {
        FamilyName::new("f1").unwrap()
    }

    fn tbl() -> TableName {
        TableName::new("t").unwrap()
    }

    #[test]
    fn rejects_empty_key_fields() {
        let err = MetaTable::new(
            Engine::Authority,
            fam(),
            tbl(),
            vec![field("name", FieldType::String)],
            vec![],
        )
        .unwrap_err();
        assert_eq!(err, TableError::NoKeyFields);
    }

    #[test]
    fn rejects_key_field_not_in_fields() {
        let err = MetaTable::new(
            Engine::Authority,
            fam(),
            tbl(),
            vec![field("name", FieldType::String)],
            vec![FieldName::new("age").unwrap()],
        )
        .unwrap_err();
        assert!(matches!(err, TableError::UnknownKeyField(_)));
    }

    #[test]
    fn rejects_non_keyable_key_field_type() {
        let err = MetaTable::new(
            Engine::Authority,
            fam(),
            tbl(),
            vec![field("blob", FieldType::Binary)],
            vec![FieldName::new("blob").unwrap()],
        )
        .unwrap_err();
        assert!(matches!(err, TableError::InvalidKeyFieldType { .. }));
    }

    #[test]
    fn accepts_valid_table() {
        let t = MetaTable::new(
            Engine::Authority,
            fam(),
            tbl(),
            vec![field("name", FieldType::String), field("age", FieldType::Integer)],
            vec![FieldName::new("name").unwrap()],
        )
        .unwrap();
        assert_eq!(t.ldb_table_name(), "f1___t");
    }
}
