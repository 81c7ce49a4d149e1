use rusqlite::Connection;

use crate::change_buffer::{ChangeBuffer, RowChange};
use crate::error::{LdbError, Result};
use crate::writer::{BEGIN_MARKER, COMMIT_MARKER};

#[cfg(test)]
use rusqlite::hooks::Action;

/// One invocation of a registered callback: every row change produced by
/// one logical (ledger) transaction, in the order the engine reported them
/// (spec.md 4.7).
pub struct CallbackInvocation<'a> {
    pub db: &'a Connection,
    pub statement: &'a str,
    pub changes: Vec<RowChange>,
}

pub type Callback = Box<dyn FnMut(CallbackInvocation<'_>) + Send>;

/// Accumulates pre-update changes across a ledger transaction and dispatches
/// registered callbacks exactly once per logical transaction (spec.md 4.7).
pub struct CallbackWriter {
    buffer: ChangeBuffer,
    accumulator: Option<Vec<RowChange>>,
    callbacks: Vec<Callback>,
}

impl CallbackWriter {
    pub fn new(buffer: ChangeBuffer) -> Self {
        Self {
            buffer,
            accumulator: None,
            callbacks: Vec::new(),
        }
    }

    pub fn register(&mut self, callback: Callback) {
        self.callbacks.push(callback);
    }

    /// Called after `LdbWriter::apply` returns for `statement`. Implements
    /// spec.md 4.7's accumulate-or-fire decision.
    pub fn on_applied(&mut self, conn: &Connection, statement: &str) -> Result<()> {
        if statement == BEGIN_MARKER {
            if self.accumulator.is_some() {
                log::warn!("--- BEGIN observed with a dangling callback accumulator");
                return Err(LdbError::InvariantViolation(
                    "--- BEGIN observed with a dangling callback accumulator".to_owned(),
                ));
            }
            self.accumulator = Some(Vec::new());
            // BEGIN itself never produces row changes, but drain defensively
            // in case of an adjacent unrelated write.
            let _ = self.buffer.drain();
            return Ok(());
        }

        let popped = self.buffer.drain();

        if statement == COMMIT_MARKER {
            let mut changes = self.accumulator.take().ok_or_else(|| {
                log::warn!("--- COMMIT observed with no open callback accumulator");
                LdbError::InvariantViolation("--- COMMIT observed with no open callback accumulator".to_owned())
            })?;
            changes.extend(popped);
            self.fire(conn, statement, changes);
            return Ok(());
        }

        if let Some(acc) = self.accumulator.as_mut() {
            acc.extend(popped);
            return Ok(());
        }

        self.fire(conn, statement, popped);
        Ok(())
    }

    fn fire(&mut self, conn: &Connection, statement: &str, changes: Vec<RowChange>) {
        for cb in &mut self.callbacks {
            cb(CallbackInvocation {
                db: conn,
                statement,
                changes: changes.clone(),
            });
        }
    }
}
