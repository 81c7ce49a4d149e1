//! Applies DML ledger statements to a replica database: sequence
//! monotonicity, pre-update row-change capture, and transaction-grouped
//! callback dispatch.

pub mod callback;
pub mod change_buffer;
pub mod error;
pub mod writer;

pub use callback::{Callback, CallbackInvocation, CallbackWriter};
pub use change_buffer::{ChangeBuffer, RowChange};
pub use error::{LdbError, Result};
pub use writer::{CheckpointMode, CheckpointResult, DmlStatement, LdbWriter, MultiWriter, BEGIN_MARKER, COMMIT_MARKER};
