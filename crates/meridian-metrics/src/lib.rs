//! Latency tracking with HdrHistogram.
//!
//! One histogram per command kind, recorded in nanoseconds by the engine
//! thread and summarised after a run.

use hdrhistogram::Histogram;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("failed to create histogram: {0}")]
    Creation(#[from] hdrhistogram::CreationError),
}

/// High-precision latency histogram.
pub struct LatencyHistogram {
    histogram: Histogram<u64>,
}

impl LatencyHistogram {
    /// Create a new histogram with 3 significant digits.
    pub fn new() -> Result<Self, MetricsError> {
        Self::with_precision(3)
    }

    /// Create with custom precision (1-5 significant digits).
    pub fn with_precision(sigfig: u8) -> Result<Self, MetricsError> {
        Ok(Self { histogram: Histogram::new(sigfig)? })
    }

    /// Record a latency value in nanoseconds.
    #[inline(always)]
    pub fn record(&mut self, nanos: u64) {
        // Auto-resizing histogram; a failed record only means a value of 0.
        let _ = self.histogram.record(nanos.max(1));
    }

    /// Get value at percentile (0.0 - 100.0).
    pub fn value_at_percentile(&self, percentile: f64) -> u64 {
        self.histogram.value_at_quantile(percentile / 100.0)
    }

    pub fn count(&self) -> u64 {
        self.histogram.len()
    }

    pub fn reset(&mut self) {
        self.histogram.reset();
    }

    pub fn summary(&self) -> LatencySummary {
        LatencySummary {
            count: self.count(),
            p50: self.value_at_percentile(50.0),
            p90: self.value_at_percentile(90.0),
            p99: self.value_at_percentile(99.0),
            p999: self.value_at_percentile(99.9),
            max: self.histogram.max(),
            mean: self.histogram.mean(),
        }
    }

    /// Format latency with appropriate units.
    pub fn format_latency(nanos: u64) -> String {
        if nanos < 1_000 {
            format!("{} ns", nanos)
        } else if nanos < 1_000_000 {
            format!("{:.2} μs", nanos as f64 / 1_000.0)
        } else if nanos < 1_000_000_000 {
            format!("{:.2} ms", nanos as f64 / 1_000_000.0)
        } else {
            format!("{:.2} s", nanos as f64 / 1_000_000_000.0)
        }
    }
}

/// Point-in-time percentiles of one histogram, in nanoseconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct LatencySummary {
    pub count: u64,
    pub p50: u64,
    pub p90: u64,
    pub p99: u64,
    pub p999: u64,
    pub max: u64,
    pub mean: f64,
}

impl LatencySummary {
    /// Emit the summary as one structured log line.
    pub fn log(&self, label: &str) {
        if self.count == 0 {
            info!(label, "no samples");
            return;
        }
        info!(
            label,
            count = self.count,
            p50 = %LatencyHistogram::format_latency(self.p50),
            p90 = %LatencyHistogram::format_latency(self.p90),
            p99 = %LatencyHistogram::format_latency(self.p99),
            p999 = %LatencyHistogram::format_latency(self.p999),
            max = %LatencyHistogram::format_latency(self.max),
            "latency"
        );
    }
}

/// Which engine operation a sample belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandKind {
    Submit,
    Cancel,
    Rejected,
}

/// Per-command-kind latency histograms.
pub struct CommandLatency {
    submit: LatencyHistogram,
    cancel: LatencyHistogram,
    rejected: LatencyHistogram,
}

impl CommandLatency {
    pub fn new() -> Result<Self, MetricsError> {
        Ok(Self {
            submit: LatencyHistogram::new()?,
            cancel: LatencyHistogram::new()?,
            rejected: LatencyHistogram::new()?,
        })
    }

    #[inline]
    pub fn record(&mut self, kind: CommandKind, nanos: u64) {
        self.histogram_mut(kind).record(nanos);
    }

    pub fn histogram(&self, kind: CommandKind) -> &LatencyHistogram {
        match kind {
            CommandKind::Submit => &self.submit,
            CommandKind::Cancel => &self.cancel,
            CommandKind::Rejected => &self.rejected,
        }
    }

    fn histogram_mut(&mut self, kind: CommandKind) -> &mut LatencyHistogram {
        match kind {
            CommandKind::Submit => &mut self.submit,
            CommandKind::Cancel => &mut self.cancel,
            CommandKind::Rejected => &mut self.rejected,
        }
    }

    pub fn total(&self) -> u64 {
        self.submit.count() + self.cancel.count() + self.rejected.count()
    }

    pub fn log_summary(&self) {
        self.submit.summary().log("submit");
        self.cancel.summary().log("cancel");
        self.rejected.summary().log("rejected");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_histogram_basic() {
        let mut h = LatencyHistogram::new().unwrap();

        for i in 1..=100 {
            h.record(i * 100);
        }

        let summary = h.summary();
        assert_eq!(summary.count, 100);
        assert!(summary.p50 >= 4900 && summary.p50 <= 5100);
        // HdrHistogram may round max value slightly
        assert!(summary.max >= 10000 && summary.max <= 10100);
    }

    #[test]
    fn test_zero_sample_is_counted() {
        let mut h = LatencyHistogram::new().unwrap();
        h.record(0);
        assert_eq!(h.count(), 1);
        h.reset();
        assert_eq!(h.count(), 0);
    }

    #[test]
    fn test_invalid_precision() {
        assert!(LatencyHistogram::with_precision(9).is_err());
    }

    #[test]
    fn test_command_latency_buckets() {
        let mut latency = CommandLatency::new().unwrap();
        latency.record(CommandKind::Submit, 250);
        latency.record(CommandKind::Submit, 300);
        latency.record(CommandKind::Cancel, 120);

        assert_eq!(latency.histogram(CommandKind::Submit).count(), 2);
        assert_eq!(latency.histogram(CommandKind::Cancel).count(), 1);
        assert_eq!(latency.histogram(CommandKind::Rejected).count(), 0);
        assert_eq!(latency.total(), 3);
    }

    #[test]
    fn test_format_latency() {
        assert_eq!(LatencyHistogram::format_latency(500), "500 ns");
        assert_eq!(LatencyHistogram::format_latency(5000), "5.00 μs");
        assert_eq!(LatencyHistogram::format_latency(5_000_000), "5.00 ms");
    }
}
