mod config;

use std::time::Duration;

use clap::Parser;
use ctlstore_changelog::{ChangelogCallback, ChangelogFileWriter};
use ctlstore_engine::{ledger, schema};
use ctlstore_ldb::{CallbackWriter, ChangeBuffer, DmlStatement, LdbWriter};
use ctlstore_paths::CtlstoreDataDir;
use ctlstore_types::Engine;
use rusqlite::Connection;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    ctlstore_metrics::init();
    let config = Config::parse();

    let data_dir = CtlstoreDataDir::new(&config.data_dir);
    data_dir.ensure_exists()?;

    let mut writer = LdbWriter::open(data_dir.replica_db())?;

    let buffer = ChangeBuffer::new();
    ctlstore_ldb::change_buffer::install(writer.connection(), buffer.clone());

    let mut callback_writer = CallbackWriter::new(buffer);
    let changelog = ChangelogFileWriter::open(data_dir.changelog(), config.changelog_rotate_bytes)?;
    let schema_conn = Connection::open(data_dir.replica_db())?;
    let mut changelog_cb = ChangelogCallback::new(
        changelog,
        Box::new(move |ldb_name: &str| {
            let (family, table) = ldb_name.split_once(ctlstore_types::FAMILY_TABLE_SEPARATOR)?;
            schema::load_table(&schema_conn, Engine::Replica, family, table).ok().flatten()
        }),
    );
    callback_writer.register(Box::new(move |inv| changelog_cb.handle(inv)));

    log::info!(
        "ctlstore-reflectord tailing {} into {}",
        config.authority_db.display(),
        data_dir.replica_db()
    );

    let authority = Connection::open(&config.authority_db)?;
    let mut last_seq = writer.current_seq()?;
    let mut tick = tokio::time::interval(Duration::from_millis(config.poll_interval_ms));

    loop {
        tick.tick().await;
        let rows = ledger::read_from(&authority, last_seq)?;
        for row in rows {
            let stmt = DmlStatement {
                sequence: row.seq,
                timestamp: row.seq,
                statement: row.statement,
            };
            writer.apply(&stmt)?;
            callback_writer.on_applied(writer.connection(), &stmt.statement)?;
            last_seq = row.seq;
            ctlstore_metrics::REPLICA_SEQ.with_label_values(&["default"]).set(last_seq);
        }
    }
}
