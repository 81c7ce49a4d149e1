mod config;

use std::time::Duration;

use clap::Parser;
use ctlstore_engine::{AuthorityDb, Executive, ExecutiveConfig};
use ctlstore_executive::AppState;
use ctlstore_paths::CtlstoreDataDir;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    ctlstore_metrics::init();
    let config = Config::parse();

    let data_dir = CtlstoreDataDir::new(&config.data_dir);
    data_dir.ensure_exists()?;

    let db = AuthorityDb::open(data_dir.authority_db())?;
    let executive = Executive::new(
        db,
        ExecutiveConfig {
            allow_drop_table: config.allow_drop_table,
            allow_clear_rows: config.allow_clear_rows,
        },
    );
    executive.refresh_limits()?;

    let state = AppState::new(executive);
    spawn_ticks(state.clone());

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    log::info!("ctlstore-executived listening on {}", config.listen_addr);
    axum::serve(listener, ctlstore_executive::router(state)).await?;
    Ok(())
}

/// Background ticks driving the limiter cache refresh and usage garbage
/// collection (spec.md 5: "1-minute limiter tick", "10-second sizer tick",
/// "1-hour housekeeping tick" — the limiter and sizer caches share one
/// refresh, as in `Executive::refresh_limits`).
fn spawn_ticks(state: AppState) {
    let limits_state = state.clone();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(10));
        loop {
            tick.tick().await;
            if let Err(e) = limits_state.executive.refresh_limits() {
                log::error!("limiter refresh failed: {e}");
            }
        }
    });

    let usage_state = state.clone();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(3600));
        loop {
            tick.tick().await;
            match usage_state.executive.gc_usage() {
                Ok(n) => log::debug!("usage gc removed {n} stale rows"),
                Err(e) => log::error!("usage gc failed: {e}"),
            }
        }
    });

    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(5));
        loop {
            tick.tick().await;
            if let Ok((seq, _)) = state.executive.status() {
                ctlstore_metrics::LEDGER_SEQ.set(seq);
            }
        }
    });
}
