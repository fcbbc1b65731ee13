// src/metrics.rs
use crate::error::Anomaly;
use once_cell::sync::Lazy;
use prometheus::proto::MetricType;
use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry};

static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

static ROWS_PARSED: Lazy<IntCounter> = Lazy::new(|| {
    let c = IntCounter::new("rows_parsed", "Input rows read (excluding header)")
        .expect("rows_parsed");
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

static ROWS_MALFORMED: Lazy<IntCounter> = Lazy::new(|| {
    let c = IntCounter::new("rows_malformed", "Input rows skipped as unparseable")
        .expect("rows_malformed");
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

static EVENTS_APPLIED: Lazy<IntCounter> = Lazy::new(|| {
    let c = IntCounter::new("events_applied", "Events applied to the book")
        .expect("events_applied");
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

static SNAPSHOTS_WRITTEN: Lazy<IntCounter> = Lazy::new(|| {
    let c = IntCounter::new("snapshots_written", "MBP-10 rows written to output")
        .expect("snapshots_written");
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

static SNAPSHOTS_SUPPRESSED: Lazy<IntCounter> = Lazy::new(|| {
    let c = IntCounter::new(
        "snapshots_suppressed",
        "Emitting events filtered out because the top-10 image was unchanged",
    )
    .expect("snapshots_suppressed");
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

static ANOMALIES: Lazy<IntCounterVec> = Lazy::new(|| {
    let c = IntCounterVec::new(
        Opts::new("protocol_anomalies", "Tolerated feed violations by kind"),
        &["kind"],
    )
    .expect("protocol_anomalies");
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

static BOOK_LIVE_ORDERS: Lazy<IntGauge> = Lazy::new(|| {
    let g = IntGauge::new("book_live_orders", "Resting orders currently in the book")
        .expect("book_live_orders");
    REGISTRY.register(Box::new(g.clone())).ok();
    g
});

pub fn inc_rows_parsed() {
    ROWS_PARSED.inc();
}
pub fn inc_rows_malformed() {
    ROWS_MALFORMED.inc();
}
pub fn inc_events_applied() {
    EVENTS_APPLIED.inc();
}
pub fn inc_snapshots_written() {
    SNAPSHOTS_WRITTEN.inc();
}
pub fn inc_snapshots_suppressed() {
    SNAPSHOTS_SUPPRESSED.inc();
}

pub fn inc_anomaly(kind: Anomaly) {
    ANOMALIES.with_label_values(&[kind.as_str()]).inc();
}

pub fn set_live_orders(n: usize) {
    BOOK_LIVE_ORDERS.set(n as i64);
}

/// Dumps every non-zero counter and gauge to the log. This is the run's
/// anomaly summary; a batch process has nothing to scrape.
pub fn log_summary() {
    for mf in REGISTRY.gather() {
        for m in mf.get_metric() {
            let value = match mf.get_field_type() {
                MetricType::COUNTER => m.get_counter().get_value(),
                MetricType::GAUGE => m.get_gauge().get_value(),
                _ => continue,
            };
            if value == 0.0 {
                continue;
            }
            let labels = m
                .get_label()
                .iter()
                .map(|l| format!("{}={}", l.get_name(), l.get_value()))
                .collect::<Vec<_>>()
                .join(",");
            if labels.is_empty() {
                log::info!("{} = {}", mf.get_name(), value as u64);
            } else {
                log::info!("{}{{{}}} = {}", mf.get_name(), labels, value as u64);
            }
        }
    }
}
