use base64::Engine as _;
use ctlstore_sql::value::SqlValue;
use ctlstore_types::{Field, FieldName, FieldType, MetaTable};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::error::ApiError;
use ctlstore_engine::EngineError;

/// `{fields:[[name,type],…], keyFields:[…]}` — `POST /families/{f}/tables/{t}`.
#[derive(Debug, Deserialize)]
pub struct CreateTableBody {
    pub fields: Vec<(String, String)>,
    pub key_fields: Vec<String>,
}

/// `{fields:[[name,type],…]}` — `PUT /families/{f}/tables/{t}`.
#[derive(Debug, Deserialize)]
pub struct AddFieldsBody {
    pub fields: Vec<(String, String)>,
}

pub fn parse_fields(raw: &[(String, String)]) -> Result<Vec<Field>, ApiError> {
    raw.iter()
        .map(|(name, ty)| {
            let name = FieldName::new(name.as_str()).map_err(EngineError::from)?;
            let ty: FieldType = ty
                .as_str()
                .parse()
                .map_err(EngineError::BadRequest)?;
            Ok(Field { name, ty })
        })
        .collect()
}

#[derive(Debug, Deserialize)]
pub struct MutationBody {
    pub table: String,
    #[serde(default)]
    pub delete: bool,
    pub values: Vec<Json>,
}

#[derive(Debug, Deserialize)]
pub struct MutateBody {
    pub cookie: String,
    pub check_cookie: Option<String>,
    pub mutations: Vec<MutationBody>,
}

#[derive(Debug, Serialize)]
pub struct MutateResponse {
    pub last_seq: i64,
}

/// Decodes a base64 cookie field. Empty string decodes to an empty cookie
/// (spec.md 8 S1 uses `0x00` as a stand-in for "no cookie yet"; wire callers
/// send base64).
pub fn decode_cookie(s: &str) -> Result<Vec<u8>, ApiError> {
    if s.is_empty() {
        return Ok(Vec::new());
    }
    base64::engine::general_purpose::STANDARD
        .decode(s)
        .map_err(|_| EngineError::BadRequest("cookie is not valid base64".to_owned()).into())
}

/// Converts one wire value into a [`SqlValue`] using `field`'s declared
/// type (spec.md 4.1: binary/bytestring values arrive base64-encoded),
/// enforcing the per-field byte cap of spec.md 4.5 "Max request size".
pub fn json_to_sql_value(field: &Field, value: &Json) -> Result<SqlValue, ApiError> {
    if value.is_null() {
        return Ok(SqlValue::Null);
    }
    let sql_value = match field.ty {
        FieldType::Integer => value
            .as_i64()
            .map(SqlValue::Integer)
            .ok_or_else(|| EngineError::BadRequest(format!("field {:?} expects an integer", field.name.as_str())))?,
        FieldType::Decimal => value
            .as_f64()
            .map(SqlValue::Decimal)
            .ok_or_else(|| EngineError::BadRequest(format!("field {:?} expects a number", field.name.as_str())))?,
        FieldType::String | FieldType::Text => value
            .as_str()
            .map(|s| SqlValue::Text(s.to_owned()))
            .ok_or_else(|| EngineError::BadRequest(format!("field {:?} expects a string", field.name.as_str())))?,
        FieldType::Binary | FieldType::Bytestring => {
            let s = value
                .as_str()
                .ok_or_else(|| EngineError::BadRequest(format!("field {:?} expects base64 text", field.name.as_str())))?;
            SqlValue::from_base64(s).map_err(|e| EngineError::BadRequest(e.to_string()))?
        }
    };

    let size = match &sql_value {
        SqlValue::Text(s) => s.len(),
        SqlValue::Bytes(b) => b.len(),
        _ => 0,
    };
    if size > ctlstore_engine::executive::MAX_FIELD_VALUE_BYTES {
        return Err(EngineError::PayloadTooLarge(format!(
            "field {:?} value is {size} bytes, exceeding the {} byte cap",
            field.name.as_str(),
            ctlstore_engine::executive::MAX_FIELD_VALUE_BYTES
        ))
        .into());
    }

    Ok(sql_value)
}

/// Converts a mutation body's raw values into [`SqlValue`]s positioned by
/// `table`'s field order (upsert) or key-field order (delete).
pub fn mutation_values(table: &MetaTable, body: &MutationBody) -> Result<Vec<SqlValue>, ApiError> {
    let fields: Vec<&Field> = if body.delete {
        table
            .key_fields
            .iter()
            .map(|name| table.field(name))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| ApiError::from(EngineError::BadRequest("table key fields are inconsistent".to_owned())))?
    } else {
        table.fields.iter().collect()
    };

    if fields.len() != body.values.len() {
        return Err(EngineError::BadRequest(format!(
            "mutation on {} supplies {} values, expected {}",
            table.ldb_table_name(),
            body.values.len(),
            fields.len()
        ))
        .into());
    }

    fields
        .iter()
        .zip(&body.values)
        .map(|(field, v)| json_to_sql_value(field, v))
        .collect()
}

#[derive(Debug, Serialize)]
pub struct SchemaResponse {
    pub family: String,
    pub table: String,
    pub fields: Vec<(String, String)>,
    pub key_fields: Vec<String>,
}

impl From<&MetaTable> for SchemaResponse {
    fn from(t: &MetaTable) -> Self {
        Self {
            family: t.family.to_string(),
            table: t.name.to_string(),
            fields: t.fields.iter().map(|f| (f.name.to_string(), f.ty.wire_name().to_owned())).collect(),
            key_fields: t.key_fields.iter().map(|f| f.to_string()).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RateLimitBody {
    pub amount_per_minute: i64,
}

#[derive(Debug, Deserialize)]
pub struct SizeLimitBody {
    pub warn_size_bytes: i64,
    pub max_size_bytes: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oversized_text_value_is_rejected() {
        let field = Field { name: FieldName::new("name").unwrap(), ty: FieldType::String };
        let huge = Json::String("a".repeat(ctlstore_engine::executive::MAX_FIELD_VALUE_BYTES + 1));
        let err = json_to_sql_value(&field, &huge).unwrap_err();
        assert!(matches!(err.0, EngineError::PayloadTooLarge(_)));
    }

    #[test]
    fn value_at_the_cap_is_accepted() {
        let field = Field { name: FieldName::new("name").unwrap(), ty: FieldType::String };
        let exact = Json::String("a".repeat(ctlstore_engine::executive::MAX_FIELD_VALUE_BYTES));
        assert!(json_to_sql_value(&field, &exact).is_ok());
    }
}
