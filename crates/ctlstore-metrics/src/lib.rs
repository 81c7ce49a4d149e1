//! Prometheus instrumentation points for the executive and reflector.
//!
//! Emission (scraping, exposition endpoints) is an external collaborator's
//! responsibility per spec.md 1; this crate only owns the registry and the
//! metric handles every other crate instruments against, the way the
//! teacher's `spacetimedb-metrics` is imported throughout `core`/`client-api`
//! regardless of whether a given deployment ships a `/metrics` route.

use once_cell::sync::Lazy;
use prometheus::{IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry};

pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

pub static LEDGER_SEQ: Lazy<IntGauge> = Lazy::new(|| {
    let g = IntGauge::new("ctlstore_ledger_seq", "Highest ledger sequence number written").unwrap();
    REGISTRY.register(Box::new(g.clone())).ok();
    g
});

pub static RATE_LIMIT_REJECTIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    let c = IntCounterVec::new(
        Opts::new("ctlstore_rate_limit_rejections_total", "Mutations rejected by the rate limiter"),
        &["writer"],
    )
    .unwrap();
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

pub static SIZE_LIMIT_REJECTIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    let c = IntCounterVec::new(
        Opts::new("ctlstore_size_limit_rejections_total", "Mutations rejected by the size limiter"),
        &["family", "table"],
    )
    .unwrap();
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

pub static REPLICA_SEQ: Lazy<IntGaugeVec> = Lazy::new(|| {
    let g = IntGaugeVec::new(
        Opts::new("ctlstore_replica_seq", "Last ledger sequence applied by a replica"),
        &["replica"],
    )
    .unwrap();
    REGISTRY.register(Box::new(g.clone())).ok();
    g
});

pub static CHANGELOG_LAG: Lazy<IntGauge> = Lazy::new(|| {
    let g = IntGauge::new(
        "ctlstore_changelog_lag",
        "Ledger sequence minus last changelog sequence written",
    )
    .unwrap();
    REGISTRY.register(Box::new(g.clone())).ok();
    g
});

/// Forces registration of every metric above; call once at process startup
/// so `/metrics`-style scraping always sees a stable set of series even
/// before the first mutation.
pub fn init() {
    Lazy::force(&LEDGER_SEQ);
    Lazy::force(&RATE_LIMIT_REJECTIONS);
    Lazy::force(&SIZE_LIMIT_REJECTIONS);
    Lazy::force(&REPLICA_SEQ);
    Lazy::force(&CHANGELOG_LAG);
}
