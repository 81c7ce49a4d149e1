//! The authority side of the platform: ledger, mutator store, rate/size
//! limiter and the Executive orchestration layer built on top of them.

pub mod db;
pub mod error;
pub mod executive;
pub mod ledger;
pub mod limiter;
pub mod mutators;
pub mod schema;

pub use db::AuthorityDb;
pub use error::{EngineError, Result};
pub use executive::{Executive, ExecutiveConfig, MutateCall, MutateOutcome, MutationRequest};
pub use ledger::{LedgerRow, LedgerWriter};
pub use limiter::{LimiterCache, SizeLimit};
