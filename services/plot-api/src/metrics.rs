//! Application metrics collection and reporting.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use metrics::{counter, gauge, histogram};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::cache::SourceCaches;

/// Metrics collector for the plot API.
#[derive(Debug)]
pub struct MetricsCollector {
    pub plot_requests: AtomicU64,
    pub export_requests: AtomicU64,
    pub data_requests: AtomicU64,
    pub panels_completed: AtomicU64,
    pub panel_failures: AtomicU64,
    pub request_failures: AtomicU64,

    plot_times: RwLock<TimingStats>,
    data_times: RwLock<TimingStats>,

    start_time: Instant,
}

#[derive(Debug, Default)]
struct TimingStats {
    count: u64,
    total_us: u64,
    min_us: u64,
    max_us: u64,
    last_us: u64,
}

impl TimingStats {
    fn record(&mut self, duration_us: u64) {
        self.count += 1;
        self.total_us += duration_us;
        self.last_us = duration_us;
        if self.min_us == 0 || duration_us < self.min_us {
            self.min_us = duration_us;
        }
        if duration_us > self.max_us {
            self.max_us = duration_us;
        }
    }

    fn snapshot(&self) -> TimingSnapshot {
        TimingSnapshot {
            count: self.count,
            avg_ms: if self.count == 0 {
                0.0
            } else {
                (self.total_us as f64 / self.count as f64) / 1000.0
            },
            min_ms: self.min_us as f64 / 1000.0,
            max_ms: self.max_us as f64 / 1000.0,
            last_ms: self.last_us as f64 / 1000.0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TimingSnapshot {
    pub count: u64,
    pub avg_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub last_ms: f64,
}

/// Point-in-time copy of every counter, for the JSON health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub plot_requests: u64,
    pub export_requests: u64,
    pub data_requests: u64,
    pub panels_completed: u64,
    pub panel_failures: u64,
    pub request_failures: u64,
    pub plot_times: TimingSnapshot,
    pub data_times: TimingSnapshot,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            plot_requests: AtomicU64::new(0),
            export_requests: AtomicU64::new(0),
            data_requests: AtomicU64::new(0),
            panels_completed: AtomicU64::new(0),
            panel_failures: AtomicU64::new(0),
            request_failures: AtomicU64::new(0),
            plot_times: RwLock::new(TimingStats::default()),
            data_times: RwLock::new(TimingStats::default()),
            start_time: Instant::now(),
        }
    }

    /// Record a finished plot request and its wall time.
    pub async fn record_plot_request(&self, export: bool, panels: usize, elapsed: Duration) {
        if export {
            self.export_requests.fetch_add(1, Ordering::Relaxed);
            counter!("plot_requests_total", "mode" => "export").increment(1);
        } else {
            self.plot_requests.fetch_add(1, Ordering::Relaxed);
            counter!("plot_requests_total", "mode" => "render").increment(1);
        }
        self.panels_completed.fetch_add(panels as u64, Ordering::Relaxed);
        histogram!("plot_request_seconds").record(elapsed.as_secs_f64());
        self.plot_times.write().await.record(elapsed.as_micros() as u64);
    }

    /// Record a request that failed, naming the panel when one failed.
    pub fn record_plot_failure(&self, panel: Option<usize>, error_code: &'static str) {
        self.request_failures.fetch_add(1, Ordering::Relaxed);
        if panel.is_some() {
            self.panel_failures.fetch_add(1, Ordering::Relaxed);
            counter!("panel_failures_total", "error" => error_code).increment(1);
        }
        counter!("plot_request_failures_total", "error" => error_code).increment(1);
    }

    pub async fn record_data_request(&self, action: &str, elapsed: Duration) {
        self.data_requests.fetch_add(1, Ordering::Relaxed);
        counter!("data_requests_total", "action" => action.to_string()).increment(1);
        self.data_times.write().await.record(elapsed.as_micros() as u64);
    }

    /// Publish rank and channel cache hit/miss counts as gauges.
    pub fn record_cache_stats(&self, caches: &SourceCaches) {
        for (label, stats) in [
            ("ranks", caches.ranks.stats()),
            ("channels", caches.channels.stats()),
        ] {
            gauge!("source_cache_hits", "cache" => label).set(stats.hits.load(Ordering::Relaxed) as f64);
            gauge!("source_cache_misses", "cache" => label)
                .set(stats.misses.load(Ordering::Relaxed) as f64);
        }
    }

    pub async fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.start_time.elapsed().as_secs(),
            plot_requests: self.plot_requests.load(Ordering::Relaxed),
            export_requests: self.export_requests.load(Ordering::Relaxed),
            data_requests: self.data_requests.load(Ordering::Relaxed),
            panels_completed: self.panels_completed.load(Ordering::Relaxed),
            panel_failures: self.panel_failures.load(Ordering::Relaxed),
            request_failures: self.request_failures.load(Ordering::Relaxed),
            plot_times: self.plot_times.read().await.snapshot(),
            data_times: self.data_times.read().await.snapshot(),
        }
    }
}
