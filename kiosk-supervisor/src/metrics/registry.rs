//! The metric registry (spec §3 "Metric registry", §4.5).
//!
//! Concrete shape follows the teacher's `MetricsCollector`
//! (`rust-srec/src/metrics/collector.rs`): atomics behind a `DashMap`
//! keyed by metric name, rather than a single generic `HashMap<String,
//! f64>`. Gauges are stored as `f64::to_bits()` in an `AtomicU64` so a
//! gauge update is a single lock-free store, matching the "non-blocking,
//! safe to call from any task" contract in spec §4.5.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tracing::warn;

use super::names::{MetricKind, ALL};

/// Labels are small, sorted `(name, value)` pairs; sorting makes the
/// exposition output deterministic and gives `SeriesKey` a total order so
/// it can key a `DashMap`.
type SeriesKey = Vec<(String, String)>;

struct MetricEntry {
    kind: MetricKind,
    help: &'static str,
    series: DashMap<SeriesKey, AtomicU64>,
}

/// Multi-writer, single-reader metric store. Writers (the supervisor tick
/// and the probe tasks) call [`Self::update`]/[`Self::incr`]; the scrape
/// handler calls [`Self::render`] under no lock beyond each series'
/// own (spec §5 "the metric registry ... uses a single short-lived write
/// lock per update and a read lock for scrapes" — realized here with
/// per-series atomics instead of a single registry-wide lock).
pub struct Registry {
    metrics: DashMap<&'static str, MetricEntry>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Pre-register every metric named in spec §4.5's tables so `# HELP`/
    /// `# TYPE` lines are always present, even before the first write.
    pub fn new() -> Self {
        let metrics = DashMap::new();
        for (name, help, kind) in ALL {
            metrics.insert(
                *name,
                MetricEntry {
                    kind: *kind,
                    help,
                    series: DashMap::new(),
                },
            );
        }
        Self { metrics }
    }

    fn series_key(labels: &[(&str, &str)]) -> SeriesKey {
        let mut key: SeriesKey = labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        key.sort();
        key
    }

    /// Set a gauge's current value (spec §4.5 `update(name, labels,
    /// value)`).
    pub fn update(&self, name: &str, labels: &[(&str, &str)], value: f64) {
        let Some(entry) = self.metrics.get(name) else {
            warn!(name, "update() on unregistered metric");
            return;
        };
        if entry.kind != MetricKind::Gauge {
            warn!(name, "update() called on a non-gauge metric");
        }
        entry
            .series
            .entry(Self::series_key(labels))
            .or_insert_with(|| AtomicU64::new(0))
            .store(value.to_bits(), Ordering::Relaxed);
    }

    /// Increment a counter by one (spec §4.5 `incr(name, labels,
    /// delta=1)`).
    pub fn incr(&self, name: &str, labels: &[(&str, &str)]) {
        self.incr_by(name, labels, 1);
    }

    /// Increment a counter by an arbitrary delta.
    pub fn incr_by(&self, name: &str, labels: &[(&str, &str)], delta: u64) {
        let Some(entry) = self.metrics.get(name) else {
            warn!(name, "incr() on unregistered metric");
            return;
        };
        if entry.kind != MetricKind::Counter {
            warn!(name, "incr() called on a non-counter metric");
        }
        entry
            .series
            .entry(Self::series_key(labels))
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(delta, Ordering::Relaxed);
    }

    /// Read a single series' current value, for tests and for gauges the
    /// supervisor derives from (e.g. restart counts feeding other logic).
    pub fn get(&self, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
        let entry = self.metrics.get(name)?;
        let raw = entry.series.get(&Self::series_key(labels))?.load(Ordering::Relaxed);
        Some(match entry.kind {
            MetricKind::Counter => raw as f64,
            MetricKind::Gauge => f64::from_bits(raw),
        })
    }

    /// Render the standard plain-text exposition format (spec §4.5):
    /// `# HELP`/`# TYPE` per metric name, then one line per series.
    /// Timestamps are omitted; the scraper supplies wall-clock.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (name, help, kind) in ALL {
            out.push_str(&format!("# HELP {name} {help}\n"));
            let type_str = match kind {
                MetricKind::Counter => "counter",
                MetricKind::Gauge => "gauge",
            };
            out.push_str(&format!("# TYPE {name} {type_str}\n"));

            let Some(entry) = self.metrics.get(*name) else {
                continue;
            };
            let mut rows: Vec<(SeriesKey, u64)> = entry
                .series
                .iter()
                .map(|r| (r.key().clone(), r.value().load(Ordering::Relaxed)))
                .collect();
            rows.sort_by(|a, b| a.0.cmp(&b.0));

            for (labels, raw) in rows {
                let value = match kind {
                    MetricKind::Counter => raw.to_string(),
                    MetricKind::Gauge => f64::from_bits(raw).to_string(),
                };
                if labels.is_empty() {
                    out.push_str(&format!("{name} {value}\n"));
                } else {
                    let label_str = labels
                        .iter()
                        .map(|(k, v)| format!("{k}=\"{v}\""))
                        .collect::<Vec<_>>()
                        .join(",");
                    out.push_str(&format!("{name}{{{label_str}}} {value}\n"));
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::super::names::*;
    use super::*;

    #[test]
    fn unregistered_metric_update_is_a_no_op_not_a_panic() {
        let registry = Registry::new();
        registry.update("not_a_real_metric", &[], 1.0);
        registry.incr("also_not_real", &[]);
    }

    #[test]
    fn gauge_update_overwrites_and_counter_incr_accumulates() {
        let registry = Registry::new();
        registry.update(CPU_PERCENT, &[], 12.5);
        registry.update(CPU_PERCENT, &[], 40.0);
        assert_eq!(registry.get(CPU_PERCENT, &[]), Some(40.0));

        registry.incr(API_REQUESTS_TOTAL, &[]);
        registry.incr(API_REQUESTS_TOTAL, &[]);
        assert_eq!(registry.get(API_REQUESTS_TOTAL, &[]), Some(2.0));
    }

    #[test]
    fn labeled_series_are_independent() {
        let registry = Registry::new();
        registry.update(DISK_PERCENT, &[("mountpoint", "/")], 50.0);
        registry.update(DISK_PERCENT, &[("mountpoint", "/data")], 90.0);
        assert_eq!(registry.get(DISK_PERCENT, &[("mountpoint", "/")]), Some(50.0));
        assert_eq!(registry.get(DISK_PERCENT, &[("mountpoint", "/data")]), Some(90.0));
    }

    #[test]
    fn i5_render_is_well_formed_exposition_text() {
        let registry = Registry::new();
        registry.update(UP, &[], 1.0);
        registry.incr(PROCESS_RESTARTS_TOTAL, &[("mode", "stream")]);
        registry.update(DISK_PERCENT, &[("mountpoint", "/")], 12.0);

        let text = registry.render();
        assert!(text.contains("# HELP up"));
        assert!(text.contains("# TYPE up gauge"));
        assert!(text.contains("up 1"));
        assert!(text.contains(&format!("{PROCESS_RESTARTS_TOTAL}{{mode=\"stream\"}} 1")));
        assert!(text.contains(&format!("{DISK_PERCENT}{{mountpoint=\"/\"}} 12")));
        // Every data line must parse as `name{labels} value` or `name value`.
        for line in text.lines().filter(|l| !l.starts_with('#')) {
            assert!(line.rsplit_once(' ').unwrap().1.parse::<f64>().is_ok());
        }
    }

    #[test]
    fn r2_scrape_counters_are_monotonic_across_renders() {
        let registry = Registry::new();
        registry.incr(API_REQUESTS_TOTAL, &[]);
        let first = registry.get(API_REQUESTS_TOTAL, &[]).unwrap();
        registry.incr(API_REQUESTS_TOTAL, &[]);
        let second = registry.get(API_REQUESTS_TOTAL, &[]).unwrap();
        assert!(second >= first);
    }
}
