use rusqlite::types::Value;

use ctlstore_ldb::{CallbackInvocation, RowChange};
use ctlstore_types::{FieldType, Engine, FamilyName, MetaTable, TableName, FAMILY_TABLE_SEPARATOR};

use crate::entry::{ChangelogEntry, KeyValue};
use crate::file_writer::ChangelogFileWriter;

/// Looks up a table's schema by its materialized `family___table` name.
/// Returns `None` for names the callback should silently ignore (bookkeeping
/// tables, anything not of the `family___table` shape).
pub type SchemaLookup = Box<dyn Fn(&str) -> Option<MetaTable> + Send>;

/// Turns row changes reported by [`ctlstore_ldb::CallbackWriter`] into
/// changelog entries (spec.md 4.9). Registered as one
/// [`ctlstore_ldb::Callback`].
pub struct ChangelogCallback {
    writer: ChangelogFileWriter,
    seq: i64,
    schema_for: SchemaLookup,
}

impl ChangelogCallback {
    pub fn new(writer: ChangelogFileWriter, schema_for: SchemaLookup) -> Self {
        Self { writer, seq: 0, schema_for }
    }

    /// The callback body; wrap in a `Box::new(move |inv| cb.handle(inv))`
    /// when registering with [`ctlstore_ldb::CallbackWriter::register`].
    pub fn handle(&mut self, invocation: CallbackInvocation<'_>) {
        for change in &invocation.changes {
            self.handle_change(change);
        }
    }

    fn handle_change(&mut self, change: &RowChange) {
        let Some((family, table)) = split_ldb_name(&change.table) else {
            return;
        };
        let Some(meta) = (self.schema_for)(&change.table) else {
            return;
        };

        for values in [&change.old_values, &change.new_values].into_iter().flatten() {
            let keys = extract_keys(&meta, values);
            if keys.is_empty() {
                continue;
            }
            self.seq += 1;
            let entry = ChangelogEntry {
                seq: self.seq,
                family: family.clone(),
                table: table.clone(),
                key: keys,
            };
            match serde_json::to_string(&entry) {
                Ok(line) => {
                    if let Err(e) = self.writer.write_line(&line) {
                        log::error!("changelog write failed for {}.{}: {e}", family, table);
                    }
                }
                Err(e) => log::error!("failed to serialize changelog entry: {e}"),
            }
        }
        ctlstore_metrics::CHANGELOG_LAG.set(0);
    }
}

/// Splits a materialized table name (`family___table`) back into its parts,
/// validating both halves against the identifier grammar. Bookkeeping
/// tables like `_ldb_seq` fail this and are silently skipped, per spec.md
/// 4.9 step 1.
fn split_ldb_name(ldb_name: &str) -> Option<(String, String)> {
    let (family, table) = ldb_name.split_once(FAMILY_TABLE_SEPARATOR)?;
    FamilyName::new(family).ok()?;
    TableName::new(table).ok()?;
    Some((family.to_owned(), table.to_owned()))
}

fn extract_keys(table: &MetaTable, values: &[Value]) -> Vec<KeyValue> {
    table
        .key_fields
        .iter()
        .filter_map(|key_name| {
            let idx = table.fields.iter().position(|f| &f.name == key_name)?;
            let field = &table.fields[idx];
            let value = values.get(idx)?;
            Some(KeyValue {
                name: key_name.as_str().to_owned(),
                ty: field.ty.sql_type(Engine::Replica).to_owned(),
                value: to_json(field.ty, value),
            })
        })
        .collect()
}

fn to_json(ty: FieldType, value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Integer(i) => serde_json::Value::Number((*i).into()),
        Value::Real(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Text(s) => serde_json::Value::String(s.clone()),
        Value::Blob(b) => {
            if matches!(ty, FieldType::String | FieldType::Text) {
                serde_json::Value::String(String::from_utf8_lossy(b).into_owned())
            } else {
                serde_json::Value::String(hex::encode(b))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctlstore_types::{Field, FieldName};

    fn writer() -> (ChangelogFileWriter, tempfile::TempDir, ctlstore_paths::ChangelogPath) {
        let dir = tempfile::tempdir().unwrap();
        let path = ctlstore_paths::CtlstoreDataDir::new(dir.path()).changelog();
        let w = ChangelogFileWriter::open(path.clone(), 1 << 20).unwrap();
        (w, dir, path)
    }

    fn table() -> MetaTable {
        MetaTable::new(
            Engine::Replica,
            FamilyName::new("f1").unwrap(),
            TableName::new("t").unwrap(),
            vec![Field { name: FieldName::new("name").unwrap(), ty: FieldType::String }],
            vec![FieldName::new("name").unwrap()],
        )
        .unwrap()
    }

    #[test]
    fn writes_one_entry_per_affected_key() {
        let (w, _dir, path) = writer();
        let meta = table();
        let mut cb = ChangelogCallback::new(w, Box::new(move |_name: &str| Some(meta.clone())));

        cb.handle_change(&RowChange {
            op: rusqlite::hooks::Action::SQLITE_INSERT,
            table: "f1___t".to_owned(),
            old_row_id: None,
            new_row_id: Some(1),
            old_values: None,
            new_values: Some(vec![Value::Text("a".to_owned())]),
        });

        let contents = std::fs::read_to_string(path.as_path()).unwrap();
        let entry: ChangelogEntry = serde_json::from_str(contents.trim_end()).unwrap();
        assert_eq!(entry.seq, 1);
        assert_eq!(entry.family, "f1");
        assert_eq!(entry.table, "t");
        assert_eq!(entry.key, vec![KeyValue { name: "name".to_owned(), ty: "VARCHAR(191)".to_owned(), value: serde_json::json!("a") }]);
    }

    #[test]
    fn update_emits_keys_for_both_old_and_new() {
        let (w, _dir, path) = writer();
        let meta = table();
        let mut cb = ChangelogCallback::new(w, Box::new(move |_name: &str| Some(meta.clone())));

        cb.handle_change(&RowChange {
            op: rusqlite::hooks::Action::SQLITE_UPDATE,
            table: "f1___t".to_owned(),
            old_row_id: Some(1),
            new_row_id: Some(1),
            old_values: Some(vec![Value::Text("a".to_owned())]),
            new_values: Some(vec![Value::Text("b".to_owned())]),
        });

        let lines: Vec<_> = std::fs::read_to_string(path.as_path()).unwrap().lines().map(String::from).collect();
        assert_eq!(lines.len(), 2);
        let first: ChangelogEntry = serde_json::from_str(&lines[0]).unwrap();
        let second: ChangelogEntry = serde_json::from_str(&lines[1]).unwrap();
        assert_eq!(first.key[0].value, serde_json::json!("a"));
        assert_eq!(second.key[0].value, serde_json::json!("b"));
    }

    #[test]
    fn bookkeeping_tables_are_skipped() {
        let (w, _dir, path) = writer();
        let mut cb = ChangelogCallback::new(w, Box::new(|_name: &str| None));

        cb.handle_change(&RowChange {
            op: rusqlite::hooks::Action::SQLITE_INSERT,
            table: "_ldb_seq".to_owned(),
            old_row_id: None,
            new_row_id: Some(1),
            old_values: None,
            new_values: Some(vec![Value::Integer(1), Value::Integer(1)]),
        });

        let contents = std::fs::read_to_string(path.as_path()).unwrap();
        assert!(contents.is_empty());
    }

    #[test]
    fn large_64_bit_sequence_round_trips_bit_exact() {
        let n: i64 = (1i64 << 54) + 3;
        let entry = ChangelogEntry { seq: n, family: "f".into(), table: "t".into(), key: vec![] };
        let json = serde_json::to_string(&entry).unwrap();
        let back: ChangelogEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back.seq, n);
    }
}
