use std::path::PathBuf;

use clap::Parser;

/// Replica process configuration (spec.md 4.6, 4.7).
#[derive(Debug, Parser)]
#[command(name = "ctlstore-reflectord", about = "Tails the ctlstore authority ledger into a local replica")]
pub struct Config {
    /// Path to the authority database this reflector reads the ledger from.
    #[arg(long, env = "CTLSTORE_AUTHORITY_DB")]
    pub authority_db: PathBuf,

    /// Directory holding this reflector's replica database and changelog
    /// file.
    #[arg(long, env = "CTLSTORE_DATA_DIR", default_value = "./ctlstore-replica-data")]
    pub data_dir: PathBuf,

    /// How often to poll the authority ledger for new statements.
    #[arg(long, env = "CTLSTORE_POLL_INTERVAL_MS", default_value_t = 200)]
    pub poll_interval_ms: u64,

    /// Size, in bytes, at which the changelog file is rotated in place.
    #[arg(long, env = "CTLSTORE_CHANGELOG_ROTATE_BYTES", default_value_t = 64 * 1024 * 1024)]
    pub changelog_rotate_bytes: u64,
}
