//! Query timing, slow-query detection and counters.
//!
//! [`QueryProbe`] times one orchestration call and writes a single line to the
//! `estatequery::metrics` log target. Nothing here influences query results.

use parking_lot::RwLock;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

pub const METRICS_TARGET: &str = "estatequery::metrics";

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub slow_query_ms: u64,
    pub query_log_path: Option<PathBuf>,
    pub structured_json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        let slow = std::env::var("ESTATEQUERY_SLOW_QUERY_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(500);
        Self { slow_query_ms: slow, query_log_path: None, structured_json: true }
    }
}

#[derive(Default)]
pub struct Metrics {
    pub queries_total: AtomicU64,
    pub queries_slow_total: AtomicU64,
    pub probes_total: AtomicU64,
    pub writes_total: AtomicU64,
}

#[derive(Default)]
pub struct Telemetry {
    pub cfg: RwLock<TelemetryConfig>,
    pub metrics: Metrics,
}

pub(crate) static TELEMETRY: std::sync::LazyLock<Telemetry> =
    std::sync::LazyLock::new(Telemetry::default);

pub fn set_query_log(path: PathBuf, slow_query_ms: Option<u64>, structured_json: Option<bool>) {
    let mut w = TELEMETRY.cfg.write();
    w.query_log_path = Some(path);
    if let Some(ms) = slow_query_ms {
        w.slow_query_ms = ms;
    }
    if let Some(js) = structured_json {
        w.structured_json = js;
    }
}

pub fn set_slow_query_ms(ms: u64) {
    TELEMETRY.cfg.write().slow_query_ms = ms;
}

#[must_use]
pub fn slow_query_ms() -> u64 {
    TELEMETRY.cfg.read().slow_query_ms
}

fn write_line(path: &PathBuf, line: &str) {
    if let Ok(mut f) = std::fs::OpenOptions::new().create(true).append(true).open(path) {
        use std::io::Write;
        let _ = writeln!(f, "{line}");
    }
}

fn now_ts() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

fn sha256_hex(input: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut h = Sha256::new();
    h.update(input.as_bytes());
    hex::encode(h.finalize())
}

fn is_slow(duration_ms: u128, threshold_ms: u64) -> bool {
    u64::try_from(duration_ms).map_or(true, |ms| ms >= threshold_ms)
}

/// Records one storage-level query. When a query log is configured, appends a line holding
/// a hash of the filter (never the filter itself).
pub fn log_query(
    collection: &str,
    filter: &dyn fmt::Debug,
    duration_ms: u128,
    limit: Option<usize>,
    skip: Option<usize>,
) {
    let cfg = TELEMETRY.cfg.read().clone();
    record_query(&cfg, collection, filter, duration_ms, limit, skip);
}

/// The filter is only formatted when a query log path is set.
fn record_query(
    cfg: &TelemetryConfig,
    collection: &str,
    filter: &dyn fmt::Debug,
    duration_ms: u128,
    limit: Option<usize>,
    skip: Option<usize>,
) {
    TELEMETRY.metrics.queries_total.fetch_add(1, Ordering::Relaxed);
    let slow = is_slow(duration_ms, cfg.slow_query_ms);
    if slow {
        TELEMETRY.metrics.queries_slow_total.fetch_add(1, Ordering::Relaxed);
        log::warn!(target: METRICS_TARGET, "slow query on {collection}: {duration_ms}ms");
    }
    let Some(path) = cfg.query_log_path.as_ref() else { return };
    let filter_hash = sha256_hex(&format!("{filter:?}"));
    let line = if cfg.structured_json {
        serde_json::json!({
            "ts": now_ts(),
            "collection": collection,
            "filter_hash": filter_hash,
            "duration_ms": crate::utils::num::u128_to_u64_saturating(duration_ms),
            "limit": limit,
            "skip": skip,
            "slow": slow
        })
        .to_string()
    } else {
        format!(
            "ts={} collection={} filter_hash={} duration_ms={} limit={:?} skip={:?} slow={}",
            now_ts(),
            collection,
            filter_hash,
            duration_ms,
            limit,
            skip,
            slow
        )
    };
    write_line(path, &line);
}

/// Counts a write performed by a workflow and logs it at debug level.
pub fn log_write(op: &str, collection: &str, doc_id: &str) {
    TELEMETRY.metrics.writes_total.fetch_add(1, Ordering::Relaxed);
    log::debug!(target: METRICS_TARGET, "write op={op} collection={collection} id={doc_id}");
}

#[must_use]
pub fn metrics_text() -> String {
    let m = &TELEMETRY.metrics;
    format!(
        "estatequery_queries_total {}\n\
         estatequery_queries_slow_total {}\n\
         estatequery_probes_total {}\n\
         estatequery_writes_total {}\n",
        m.queries_total.load(Ordering::Relaxed),
        m.queries_slow_total.load(Ordering::Relaxed),
        m.probes_total.load(Ordering::Relaxed),
        m.writes_total.load(Ordering::Relaxed),
    )
}

/// Wall-clock timer for one labelled operation.
#[derive(Debug)]
pub struct QueryProbe {
    label: String,
    started: Instant,
}

impl QueryProbe {
    pub fn start(label: impl Into<String>) -> Self {
        Self { label: label.into(), started: Instant::now() }
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Writes the timing line and returns the measured duration.
    pub fn finish(self) -> Duration {
        let elapsed = self.elapsed();
        let ms = elapsed.as_millis();
        TELEMETRY.metrics.probes_total.fetch_add(1, Ordering::Relaxed);
        let slow = is_slow(ms, slow_query_ms());
        crate::dev6!(
            "{{\"bench\":\"probe\",\"label\":\"{}\",\"duration_ms\":{},\"slow\":{}}}",
            self.label,
            crate::utils::num::u128_to_u64_saturating(ms),
            slow
        );
        if slow {
            log::warn!(target: METRICS_TARGET, "{} took {:.3}ms (slow)", self.label, elapsed.as_secs_f64() * 1000.0);
        } else {
            log::info!(target: METRICS_TARGET, "{} took {:.3}ms", self.label, elapsed.as_secs_f64() * 1000.0);
        }
        elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::devlog;
    use std::cell::Cell;

    #[test]
    fn probe_reports_elapsed_and_emits_line() {
        let _g = devlog::enable_thread_sink();
        let probe = QueryProbe::start("listings.search");
        std::thread::sleep(Duration::from_millis(2));
        assert!(probe.elapsed() >= Duration::from_millis(2));
        let took = probe.finish();
        assert!(took >= Duration::from_millis(2));
        let lines = devlog::drain();
        assert!(lines.iter().any(|l| l.contains("\"label\":\"listings.search\"")));
    }

    #[test]
    fn query_log_writes_hashed_filter() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q.log");
        set_query_log(path.clone(), None, Some(true));
        log_query("listings", &"Cmp { secret }", 1, Some(5), Some(10));
        let body = std::fs::read_to_string(&path).unwrap();
        assert!(body.contains("\"collection\":\"listings\""));
        assert!(!body.contains("secret"));
        TELEMETRY.cfg.write().query_log_path = None;
    }

    struct CountedFormat(Cell<usize>);

    impl fmt::Debug for CountedFormat {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            self.0.set(self.0.get() + 1);
            f.write_str("Filter")
        }
    }

    #[test]
    fn filter_is_formatted_only_for_the_query_log() {
        let filter = CountedFormat(Cell::new(0));
        record_query(&TelemetryConfig::default(), "listings", &filter, 1, None, None);
        assert_eq!(filter.0.get(), 0);

        let dir = tempfile::tempdir().unwrap();
        let logged = TelemetryConfig { query_log_path: Some(dir.path().join("q.log")), ..TelemetryConfig::default() };
        record_query(&logged, "listings", &filter, 1, None, None);
        assert_eq!(filter.0.get(), 1);
    }

    #[test]
    fn metrics_text_lists_counters() {
        let before = TELEMETRY.metrics.probes_total.load(Ordering::Relaxed);
        let _ = QueryProbe::start("m").finish();
        assert!(TELEMETRY.metrics.probes_total.load(Ordering::Relaxed) > before);
        assert!(metrics_text().contains("estatequery_probes_total"));
    }
}
