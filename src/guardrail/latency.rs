//! Call-latency tracking against an SLA.
//!
//! Samples live in a bounded ring buffer (the window), while the
//! timeout/alert/count tallies are cumulative for the monitor's lifetime.
//! Percentiles use the nearest-rank method on the sorted window, with a
//! small-sample fallback to the maximum: quoting a p99 off 20 samples is
//! noise, so below the sample-count threshold the tail percentiles report
//! the observed max instead.

use std::collections::VecDeque;
use std::fmt;

use tracing::warn;

/// Default retained sample window.
pub const DEFAULT_WINDOW: usize = 8192;

/// Latency SLA statistics over the retained window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencyStats {
    pub p50: f64,
    pub p99: f64,
    pub p999: f64,
    pub mean: f64,
    pub max: f64,
    pub timeouts: u64,
    pub alerts: u64,
    /// Cumulative samples recorded (not the window length).
    pub count: u64,
}

impl fmt::Display for LatencyStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "p50={:.1}ms p99={:.1}ms p999={:.1}ms mean={:.1}ms max={:.1}ms timeouts={} alerts={} n={}",
            self.p50, self.p99, self.p999, self.mean, self.max, self.timeouts, self.alerts, self.count,
        )
    }
}

/// Records per-call latency samples and flags SLA breaches.
pub struct LatencyMonitor {
    timeout_ms: f64,
    alert_threshold_ms: f64,
    window: VecDeque<f64>,
    capacity: usize,
    timeouts: u64,
    alerts: u64,
    count: u64,
}

impl LatencyMonitor {
    pub fn new(timeout_ms: f64, alert_threshold_ms: f64) -> Self {
        Self::with_window(timeout_ms, alert_threshold_ms, DEFAULT_WINDOW)
    }

    pub fn with_window(timeout_ms: f64, alert_threshold_ms: f64, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            timeout_ms,
            alert_threshold_ms,
            window: VecDeque::with_capacity(capacity),
            capacity,
            timeouts: 0,
            alerts: 0,
            count: 0,
        }
    }

    /// Record one latency sample. Returns true when the sample is a
    /// timeout (`latency_ms >= timeout_ms`, inclusive); otherwise counts
    /// an alert when it reaches the alert threshold.
    pub fn record(&mut self, latency_ms: f64) -> bool {
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(latency_ms);
        self.count += 1;

        if latency_ms >= self.timeout_ms {
            self.timeouts += 1;
            warn!(latency_ms, timeout_ms = self.timeout_ms, "Call latency timeout");
            true
        } else {
            if latency_ms >= self.alert_threshold_ms {
                self.alerts += 1;
                warn!(latency_ms, threshold_ms = self.alert_threshold_ms, "Call latency alert");
            }
            false
        }
    }

    /// Nearest-rank percentile statistics over the retained window.
    ///
    /// `p99` falls back to the max unless more than 100 samples are
    /// retained; `p999` unless more than 1000. All zeros when empty.
    pub fn stats(&self) -> LatencyStats {
        if self.window.is_empty() {
            return LatencyStats {
                p50: 0.0,
                p99: 0.0,
                p999: 0.0,
                mean: 0.0,
                max: 0.0,
                timeouts: self.timeouts,
                alerts: self.alerts,
                count: self.count,
            };
        }

        let mut sorted: Vec<f64> = self.window.iter().copied().collect();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let n = sorted.len();
        let last = sorted[n - 1];

        let p50 = sorted[(n as f64 * 0.50) as usize];
        let p99 = if n > 100 { sorted[(n as f64 * 0.99) as usize] } else { last };
        let p999 = if n > 1000 { sorted[(n as f64 * 0.999) as usize] } else { last };
        let mean = sorted.iter().sum::<f64>() / n as f64;

        LatencyStats {
            p50,
            p99,
            p999,
            mean,
            max: last,
            timeouts: self.timeouts,
            alerts: self.alerts,
            count: self.count,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
