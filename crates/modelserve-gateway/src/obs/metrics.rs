//! Metrics registry for the serving process.
//!
//! Counter and histogram families with dynamic labels backed by `DashMap`.
//! Labels are flattened into sorted key vectors so the same label set always
//! lands on the same atomic. Histogram observations are accumulated in
//! nanoseconds and rendered in seconds.

use dashmap::DashMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

type LabelKey = Vec<(String, String)>;

/// Helper to escape label values.
fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn label_key(labels: &[(&str, &str)]) -> LabelKey {
    let mut key: LabelKey = labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    key.sort();
    key
}

fn label_str(key: &LabelKey) -> String {
    key.iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
        .collect::<Vec<_>>()
        .join(",")
}

fn write_header(out: &mut String, name: &str, help: &str, kind: &str) {
    let _ = writeln!(out, "# HELP {} {}", name, help);
    let _ = writeln!(out, "# TYPE {} {}", name, kind);
}

fn nanos_as_secs(nanos: u64) -> f64 {
    nanos as f64 / 1_000_000_000.0
}

/// Unlabeled monotonic counter. Always rendered, even at zero.
pub struct Counter {
    name: &'static str,
    help: &'static str,
    value: AtomicU64,
}

impl Counter {
    pub fn new(name: &'static str, help: &'static str) -> Self {
        Self { name, help, value: AtomicU64::new(0) }
    }

    /// Increment by 1.
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    fn render(&self, out: &mut String) {
        write_header(out, self.name, self.help, "counter");
        let _ = writeln!(out, "{} {}", self.name, self.get());
    }
}

/// Counter family keyed by label set.
pub struct CounterVec {
    name: &'static str,
    help: &'static str,
    map: DashMap<LabelKey, AtomicU64>,
}

impl CounterVec {
    pub fn new(name: &'static str, help: &'static str) -> Self {
        Self { name, help, map: DashMap::new() }
    }

    /// Increment by 1.
    pub fn inc(&self, labels: &[(&str, &str)]) {
        self.add(labels, 1);
    }

    /// Increment by an arbitrary value.
    pub fn add(&self, labels: &[(&str, &str)], v: u64) {
        let counter = self
            .map
            .entry(label_key(labels))
            .or_insert_with(|| AtomicU64::new(0));
        counter.fetch_add(v, Ordering::Relaxed);
    }

    /// Current value for a label set (0 if never incremented).
    pub fn get(&self, labels: &[(&str, &str)]) -> u64 {
        self.map
            .get(&label_key(labels))
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Render in Prometheus text exposition format.
    fn render(&self, out: &mut String) {
        write_header(out, self.name, self.help, "counter");
        let mut rows: Vec<(LabelKey, u64)> = self
            .map
            .iter()
            .map(|r| (r.key().clone(), r.value().load(Ordering::Relaxed)))
            .collect();
        rows.sort();
        for (key, val) in rows {
            let _ = writeln!(out, "{}{{{}}} {}", self.name, label_str(&key), val);
        }
    }
}

// Prometheus client default buckets, in nanoseconds.
// 5ms, 10ms, 25ms, 50ms, 75ms, 100ms, 250ms, 500ms, 750ms, 1s, 2.5s, 5s, 7.5s, 10s
const BUCKET_COUNT: usize = 14;
const MS: u64 = 1_000_000;
const BUCKETS_NANOS: [u64; BUCKET_COUNT] = [
    5 * MS, 10 * MS, 25 * MS, 50 * MS, 75 * MS, 100 * MS, 250 * MS, 500 * MS, 750 * MS,
    1_000 * MS, 2_500 * MS, 5_000 * MS, 7_500 * MS, 10_000 * MS,
];

struct AtomicHistogram {
    count: AtomicU64,
    sum_nanos: AtomicU64,
    buckets: [AtomicU64; BUCKET_COUNT],
}

impl Default for AtomicHistogram {
    fn default() -> Self {
        Self {
            count: AtomicU64::new(0),
            sum_nanos: AtomicU64::new(0),
            buckets: std::array::from_fn(|_| AtomicU64::new(0)),
        }
    }
}

/// Latency histogram family keyed by label set.
pub struct HistogramVec {
    name: &'static str,
    help: &'static str,
    map: DashMap<LabelKey, AtomicHistogram>,
}

impl HistogramVec {
    pub fn new(name: &'static str, help: &'static str) -> Self {
        Self { name, help, map: DashMap::new() }
    }

    /// Observe a duration and increment cumulative buckets.
    pub fn observe(&self, labels: &[(&str, &str)], duration: Duration) {
        let hist = self
            .map
            .entry(label_key(labels))
            .or_insert_with(AtomicHistogram::default);
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);

        hist.count.fetch_add(1, Ordering::Relaxed);
        hist.sum_nanos.fetch_add(nanos, Ordering::Relaxed);

        // Cumulative: every bucket whose bound is >= the value.
        for (i, &b) in BUCKETS_NANOS.iter().enumerate() {
            if nanos <= b {
                hist.buckets[i].fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Number of observations for a label set.
    pub fn count(&self, labels: &[(&str, &str)]) -> u64 {
        self.map
            .get(&label_key(labels))
            .map(|h| h.count.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Render in Prometheus text exposition format (unit: seconds).
    fn render(&self, out: &mut String) {
        write_header(out, self.name, self.help, "histogram");
        let mut keys: Vec<LabelKey> = self.map.iter().map(|r| r.key().clone()).collect();
        keys.sort();

        for key in keys {
            let Some(hist) = self.map.get(&key) else {
                continue;
            };
            let labels = label_str(&key);
            let prefix = if labels.is_empty() { String::new() } else { format!("{},", labels) };

            for (i, &le) in BUCKETS_NANOS.iter().enumerate() {
                let count = hist.buckets[i].load(Ordering::Relaxed);
                let _ = writeln!(
                    out,
                    "{}_bucket{{{}le=\"{}\"}} {}",
                    self.name,
                    prefix,
                    nanos_as_secs(le),
                    count
                );
            }
            let count = hist.count.load(Ordering::Relaxed);
            let _ = writeln!(out, "{}_bucket{{{}le=\"+Inf\"}} {}", self.name, prefix, count);

            let sum = nanos_as_secs(hist.sum_nanos.load(Ordering::Relaxed));
            let _ = writeln!(out, "{}_sum{{{}}} {}", self.name, labels, sum);
            let _ = writeln!(out, "{}_count{{{}}} {}", self.name, labels, count);
        }
    }
}

/// All metrics exported by the serving process.
pub struct InferenceMetrics {
    pub requests: CounterVec,
    pub request_latency: HistogramVec,
    pub drift_detected: Counter,
}

impl Default for InferenceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceMetrics {
    pub fn new() -> Self {
        Self {
            requests: CounterVec::new(
                "inference_requests_total",
                "Total number of prediction requests",
            ),
            request_latency: HistogramVec::new(
                "inference_request_latency_seconds",
                "Latency of prediction requests in seconds",
            ),
            drift_detected: Counter::new(
                "drift_detected_total",
                "Total number of drift detections",
            ),
        }
    }

    /// Render all registered metrics.
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.requests.render(&mut out);
        self.request_latency.render(&mut out);
        self.drift_detected.render(&mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn label_order_does_not_split_series() {
        let c = CounterVec::new("t_total", "t");
        c.inc(&[("endpoint", "/predict"), ("status", "success")]);
        c.inc(&[("status", "success"), ("endpoint", "/predict")]);
        assert_eq!(c.get(&[("endpoint", "/predict"), ("status", "success")]), 2);
        assert_eq!(c.get(&[("endpoint", "/predict"), ("status", "error")]), 0);
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        let c = Arc::new(CounterVec::new("t_total", "t"));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let c = Arc::clone(&c);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        c.inc(&[("endpoint", "/predict")]);
                    }
                })
            })
            .collect();
        for h in handles {
            let _ = h.join();
        }
        assert_eq!(c.get(&[("endpoint", "/predict")]), 8000);
    }

    #[test]
    fn histogram_buckets_are_cumulative_in_seconds() {
        let h = HistogramVec::new("lat_seconds", "lat");
        h.observe(&[("endpoint", "/predict")], Duration::from_millis(20));
        h.observe(&[("endpoint", "/predict")], Duration::from_secs(30));

        let mut out = String::new();
        h.render(&mut out);

        assert!(out.contains("# TYPE lat_seconds histogram"));
        assert!(out.contains("lat_seconds_bucket{endpoint=\"/predict\",le=\"0.01\"} 0"));
        assert!(out.contains("lat_seconds_bucket{endpoint=\"/predict\",le=\"0.025\"} 1"));
        assert!(out.contains("lat_seconds_bucket{endpoint=\"/predict\",le=\"10\"} 1"));
        assert!(out.contains("lat_seconds_bucket{endpoint=\"/predict\",le=\"+Inf\"} 2"));
        assert!(out.contains("lat_seconds_sum{endpoint=\"/predict\"} 30.02"));
        assert!(out.contains("lat_seconds_count{endpoint=\"/predict\"} 2"));
        assert_eq!(h.count(&[("endpoint", "/predict")]), 2);
    }

    #[test]
    fn sub_microsecond_observations_reach_the_sum() {
        let h = HistogramVec::new("lat_seconds", "lat");
        for _ in 0..1000 {
            h.observe(&[("endpoint", "/predict")], Duration::from_nanos(900));
        }

        let mut out = String::new();
        h.render(&mut out);

        assert!(out.contains("lat_seconds_sum{endpoint=\"/predict\"} 0.0009\n"));
        assert!(out.contains("lat_seconds_bucket{endpoint=\"/predict\",le=\"0.005\"} 1000"));
        assert!(!out.contains("lat_seconds_sum{endpoint=\"/predict\"} 0\n"));
    }

    #[test]
    fn unlabeled_counter_renders_at_zero() {
        let m = InferenceMetrics::new();
        let out = m.render();
        assert!(out.contains("# HELP drift_detected_total Total number of drift detections"));
        assert!(out.contains("drift_detected_total 0"));
        assert!(!out.contains("inference_requests_total{"));
    }

    #[test]
    fn label_values_are_escaped() {
        let c = CounterVec::new("t_total", "t");
        c.inc(&[("endpoint", "a\"b")]);
        let mut out = String::new();
        c.render(&mut out);
        assert!(out.contains("t_total{endpoint=\"a\\\"b\"} 1"));
    }
}
