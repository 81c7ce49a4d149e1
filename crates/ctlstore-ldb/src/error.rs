use thiserror::Error;

/// Errors raised while applying ledger statements to a replica database
/// (spec.md 4.6, 4.7).
#[derive(Debug, Error)]
pub enum LdbError {
    /// `_ldb_seq` update affected zero rows: the statement's sequence is not
    /// strictly greater than the stored one. The replica does not
    /// fast-forward; the operator must inspect (spec.md 7).
    #[error("replay detected: statement sequence {sequence} is not greater than the stored sequence")]
    Replay { sequence: i64 },
    /// Mis-nested `--- BEGIN` / `--- COMMIT` markers, or a dangling
    /// transaction accumulator (spec.md 4.6, 4.7).
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
    #[error("transient storage error: {0}")]
    Transient(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, LdbError>;
