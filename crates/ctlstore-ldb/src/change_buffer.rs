use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::hooks::{Action, PreUpdateCase};
use rusqlite::types::Value;
use rusqlite::Connection;

/// A single row-level change as reported by the replica engine's pre-update
/// hook (spec.md 4.7). `old_values`/`new_values` hold the full row tuple at
/// the point of the write — old values only for a delete/update, new values
/// only for an insert/update.
#[derive(Debug, Clone)]
pub struct RowChange {
    pub op: Action,
    pub table: String,
    pub old_row_id: Option<i64>,
    pub new_row_id: Option<i64>,
    pub old_values: Option<Vec<Value>>,
    pub new_values: Option<Vec<Value>>,
}

/// The in-process buffer the pre-update hook appends to and the Callback
/// Writer drains. The hook is the sole producer, the callback writer the
/// sole consumer (spec.md 9: no cycle).
#[derive(Clone, Default)]
pub struct ChangeBuffer {
    inner: Arc<Mutex<Vec<RowChange>>>,
}

impl ChangeBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, change: RowChange) {
        self.inner.lock().push(change);
    }

    /// Drains and returns every change recorded since the last drain.
    pub fn drain(&self) -> Vec<RowChange> {
        std::mem::take(&mut *self.inner.lock())
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    #[cfg(test)]
    pub(crate) fn push_for_test(&self, change: RowChange) {
        self.push(change);
    }
}

fn column_values(case: &PreUpdateCase, count: i32, old: bool) -> Vec<Value> {
    (0..count)
        .map(|i| {
            let v = if old {
                case.get_old_column_value(i)
            } else {
                case.get_new_column_value(i)
            };
            v.map(|vr| vr.to_owned()).unwrap_or(Value::Null)
        })
        .collect()
}

/// Registers the pre-update hook on `conn`, appending every row change to
/// `buffer`. The hook runs synchronously on the engine thread for every row
/// insert/update/delete (spec.md 4.7).
pub fn install(conn: &Connection, buffer: ChangeBuffer) {
    conn.preupdate_hook(Some(move |action: Action, _db: &str, table: &str, case: &PreUpdateCase| {
        let count = case.get_column_count();
        let (old_row_id, old_values) = match action {
            Action::SQLITE_UPDATE | Action::SQLITE_DELETE => {
                (case.get_old_row_id().ok(), Some(column_values(case, count, true)))
            }
            _ => (None, None),
        };
        let (new_row_id, new_values) = match action {
            Action::SQLITE_UPDATE | Action::SQLITE_INSERT => {
                (case.get_new_row_id().ok(), Some(column_values(case, count, false)))
            }
            _ => (None, None),
        };

        buffer.push(RowChange {
            op: action,
            table: table.to_owned(),
            old_row_id,
            new_row_id,
            old_values,
            new_values,
        });
    }));
}

/// Unregisters the hook (e.g. before closing the connection).
pub fn uninstall(conn: &Connection) {
    conn.preupdate_hook(None::<fn(Action, &str, &str, &PreUpdateCase)>);
}
