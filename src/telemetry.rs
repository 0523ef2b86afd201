use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

pub const AUDIT_TARGET: &str = "campusdb::audit";
pub const METRICS_TARGET: &str = "campusdb::metrics";

const DEFAULT_SLOW_QUERY_MS: u64 = 500;

#[derive(Default)]
pub struct Metrics {
    pub queries_total: AtomicU64,
    pub queries_slow_total: AtomicU64,
    pub writes_total: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    pub queries_total: u64,
    pub queries_slow_total: u64,
    pub writes_total: u64,
}

struct Telemetry {
    slow_query_ms: AtomicU64,
    metrics: Metrics,
    // extra in-memory copy of audit lines
    audit_sink: RwLock<Option<Arc<RwLock<Vec<String>>>>>,
}

static TELEMETRY: std::sync::LazyLock<Telemetry> = std::sync::LazyLock::new(|| Telemetry {
    slow_query_ms: AtomicU64::new(DEFAULT_SLOW_QUERY_MS),
    metrics: Metrics::default(),
    audit_sink: RwLock::new(None),
});

pub fn set_slow_query_ms(ms: u64) {
    TELEMETRY.slow_query_ms.store(ms, Ordering::Relaxed);
}

/// Mirrors every audit line into `sink` in addition to the log.
pub fn set_audit_sink(sink: Arc<RwLock<Vec<String>>>) {
    *TELEMETRY.audit_sink.write() = Some(sink);
}

fn now_ts() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// One JSON line per read on the metrics target. `slow` is set at or above the configured
/// threshold.
pub fn log_query(collection: &str, filter_kind: &str, duration_ms: u128, limit: Option<usize>, returned: Option<usize>) {
    TELEMETRY.metrics.queries_total.fetch_add(1, Ordering::Relaxed);
    let threshold = TELEMETRY.slow_query_ms.load(Ordering::Relaxed);
    let slow = u64::try_from(duration_ms).map_or(true, |ms| ms >= threshold);
    if slow {
        TELEMETRY.metrics.queries_slow_total.fetch_add(1, Ordering::Relaxed);
    }
    let line = serde_json::json!({
        "ts": now_ts(),
        "collection": collection,
        "filter": filter_kind,
        "duration_ms": u64::try_from(duration_ms).unwrap_or(u64::MAX),
        "limit": limit,
        "returned": returned,
        "slow": slow
    });
    if slow {
        log::warn!(target: METRICS_TARGET, "{line}");
    } else {
        log::info!(target: METRICS_TARGET, "{line}");
    }
}

/// One JSON line per mutation on the audit target.
pub fn log_audit(op: &str, collection: &str, doc_id: &str) {
    TELEMETRY.metrics.writes_total.fetch_add(1, Ordering::Relaxed);
    let line = serde_json::json!({
        "ts": now_ts(), "op": op, "collection": collection, "doc_id": doc_id
    })
    .to_string();
    let audit_clone = TELEMETRY.audit_sink.read().clone();
    if let Some(sink) = audit_clone {
        sink.write().push(line.clone());
    }
    log::info!(target: AUDIT_TARGET, "{line}");
}

#[must_use]
pub fn metrics_snapshot() -> MetricsSnapshot {
    let m = &TELEMETRY.metrics;
    MetricsSnapshot {
        queries_total: m.queries_total.load(Ordering::Relaxed),
        queries_slow_total: m.queries_slow_total.load(Ordering::Relaxed),
        writes_total: m.writes_total.load(Ordering::Relaxed),
    }
}
