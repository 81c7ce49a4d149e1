use std::path::PathBuf;

use clap::Parser;

/// Authority server configuration (spec.md 5 concurrency/resource model,
/// spec.md 6 external interfaces).
#[derive(Debug, Parser)]
#[command(name = "ctlstore-executived", about = "The ctlstore authority server")]
pub struct Config {
    /// Directory holding the authority database, replica database, and
    /// changelog file.
    #[arg(long, env = "CTLSTORE_DATA_DIR", default_value = "./ctlstore-data")]
    pub data_dir: PathBuf,

    /// Address the HTTP listener binds to.
    #[arg(long, env = "CTLSTORE_LISTEN_ADDR", default_value = "127.0.0.1:7654")]
    pub listen_addr: String,

    /// Permit `DELETE /families/{f}/tables/{t}` (spec.md 6: gated by a
    /// server flag).
    #[arg(long, env = "CTLSTORE_ALLOW_DROP_TABLE", default_value_t = false)]
    pub allow_drop_table: bool,

    /// Permit `DELETE /clear-rows/...` (spec.md 6: gated by a server flag).
    #[arg(long, env = "CTLSTORE_ALLOW_CLEAR_ROWS", default_value_t = false)]
    pub allow_clear_rows: bool,
}
