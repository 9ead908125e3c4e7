//! Metrics infrastructure for the AUX serial bridge.
//!
//! This crate declares every metric the link and device layers record as a
//! structured [`Metric`] constant, so names are spelled in one place and the
//! descriptions can be registered with whichever recorder the application
//! installs. It re-exports the `metrics` crate for convenience.
//!
//! # Example
//!
//! ```rust,ignore
//! use auxbridge_metrics::{describe_metrics, metric_defs, ExchangeLabels};
//!
//! describe_metrics();
//!
//! let labels = ExchangeLabels::new("focuser", "get-position");
//! metrics::counter!(metric_defs::LINK_ATTEMPTS.name, &labels.to_labels()).increment(1);
//! ```

pub use metrics;

use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};

/// How a metric is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// Only ever increases.
    Counter,
    /// Last value wins.
    Gauge,
    /// Distribution of samples.
    Histogram,
}

impl MetricKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name, kind and description of one metric.
///
/// ```rust
/// use auxbridge_metrics::{Metric, MetricKind};
/// use metrics::Unit;
///
/// const FRAMES: Metric = Metric::counter("auxbridge.test.frames")
///     .with_description("Frames seen")
///     .with_unit(Unit::Count)
///     .with_labels(&["target"]);
///
/// assert_eq!(FRAMES.name, "auxbridge.test.frames");
/// assert_eq!(FRAMES.kind, MetricKind::Counter);
/// ```
#[derive(Debug, Clone)]
pub struct Metric {
    /// The metric name (e.g., "auxbridge.link.attempts").
    pub name: &'static str,
    pub kind: MetricKind,
    /// Shown by exporters that support descriptions.
    pub description: &'static str,
    pub unit: Option<Unit>,
    /// Label keys recorded with every sample.
    pub labels: &'static [&'static str],
}

impl Metric {
    const fn new(name: &'static str, kind: MetricKind) -> Self {
        Metric {
            name,
            kind,
            description: "",
            unit: None,
            labels: &[],
        }
    }

    pub const fn counter(name: &'static str) -> Self {
        Self::new(name, MetricKind::Counter)
    }

    pub const fn gauge(name: &'static str) -> Self {
        Self::new(name, MetricKind::Gauge)
    }

    pub const fn histogram(name: &'static str) -> Self {
        Self::new(name, MetricKind::Histogram)
    }

    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    pub const fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    pub const fn with_labels(mut self, labels: &'static [&'static str]) -> Self {
        self.labels = labels;
        self
    }

    /// Register the description with the installed recorder.
    pub fn describe(&self) {
        match (self.kind, self.unit) {
            (MetricKind::Counter, Some(unit)) => {
                describe_counter!(self.name, unit, self.description);
            }
            (MetricKind::Counter, None) => {
                describe_counter!(self.name, self.description);
            }
            (MetricKind::Gauge, Some(unit)) => {
                describe_gauge!(self.name, unit, self.description);
            }
            (MetricKind::Gauge, None) => {
                describe_gauge!(self.name, self.description);
            }
            (MetricKind::Histogram, Some(unit)) => {
                describe_histogram!(self.name, unit, self.description);
            }
            (MetricKind::Histogram, None) => {
                describe_histogram!(self.name, self.description);
            }
        }
    }
}

/// All metric definitions for the bridge.
pub mod metric_defs {
    use super::{Metric, Unit};

    // ========================================================================
    // Standard Label Keys
    // ========================================================================

    /// Labels present on every exchange-scoped metric.
    pub const EXCHANGE_LABELS: &[&str] = &["target", "command"];

    // ========================================================================
    // Link Metrics
    // ========================================================================

    /// Request/response attempts started.
    ///
    /// Labels: target, command
    pub const LINK_ATTEMPTS: Metric = Metric::counter("auxbridge.link.attempts")
        .with_description("Request/response attempts started")
        .with_unit(Unit::Count)
        .with_labels(EXCHANGE_LABELS);

    /// Attempts that failed and were retried or abandoned.
    ///
    /// Labels: target, command, reason
    ///
    /// `reason` is one of `short_write`, `no_data`, `closed`, `io`,
    /// `too_short`, `bad_header`, `size_mismatch`, `checksum`,
    /// `unexpected_response`.
    pub const LINK_ATTEMPT_FAILURES: Metric = Metric::counter("auxbridge.link.attempt_failures")
        .with_description("Request/response attempts that failed")
        .with_unit(Unit::Count)
        .with_labels(&["target", "command", "reason"]);

    /// Commands that exhausted every retry.
    ///
    /// Labels: target, command
    pub const LINK_COMMAND_FAILURES: Metric = Metric::counter("auxbridge.link.command_failures")
        .with_description("Commands that failed after all retries")
        .with_unit(Unit::Count)
        .with_labels(EXCHANGE_LABELS);

    /// Time from first write to accepted response.
    ///
    /// Labels: target, command
    pub const LINK_COMMAND_LATENCY: Metric = Metric::histogram("auxbridge.link.command_latency_ms")
        .with_description("Latency of successful commands including retries")
        .with_unit(Unit::Milliseconds)
        .with_labels(EXCHANGE_LABELS);

    /// Fire-and-forget commands written.
    ///
    /// Labels: target, command
    pub const LINK_BLIND_WRITES: Metric = Metric::counter("auxbridge.link.blind_writes")
        .with_description("Commands written without waiting for a response")
        .with_unit(Unit::Count)
        .with_labels(EXCHANGE_LABELS);

    /// Bytes written to the transport.
    pub const LINK_TX_BYTES: Metric = Metric::counter("auxbridge.link.tx_bytes")
        .with_description("Bytes written to the transport")
        .with_unit(Unit::Bytes);

    /// Frames assembled and decoded successfully.
    pub const LINK_RX_FRAMES: Metric = Metric::counter("auxbridge.link.rx_frames")
        .with_description("Frames received and decoded")
        .with_unit(Unit::Count);

    /// Frames that arrived without their leading sentinel.
    pub const LINK_RX_MISSING_SENTINEL: Metric = Metric::counter("auxbridge.link.rx_missing_sentinel")
        .with_description("Received frames that were missing the start byte")
        .with_unit(Unit::Count);

    /// Unread bytes discarded before a request was written.
    pub const LINK_STALE_BYTES: Metric = Metric::counter("auxbridge.link.stale_bytes_discarded")
        .with_description("Stale input bytes discarded before writing a request")
        .with_unit(Unit::Bytes);

    // ========================================================================
    // Focuser Metrics
    // ========================================================================

    /// Last position reported by the focuser.
    pub const FOCUSER_POSITION: Metric = Metric::gauge("auxbridge.focuser.position")
        .with_description("Last position reported by the focuser");

    /// Whether the focuser answered its last exchange (1) or not (0).
    pub const FOCUSER_CONNECTED: Metric = Metric::gauge("auxbridge.focuser.connected")
        .with_description("1 when the focuser is responding, 0 otherwise");

    /// Every declared metric.
    pub const ALL: &[Metric] = &[
        LINK_ATTEMPTS,
        LINK_ATTEMPT_FAILURES,
        LINK_COMMAND_FAILURES,
        LINK_COMMAND_LATENCY,
        LINK_BLIND_WRITES,
        LINK_TX_BYTES,
        LINK_RX_FRAMES,
        LINK_RX_MISSING_SENTINEL,
        LINK_STALE_BYTES,
        FOCUSER_POSITION,
        FOCUSER_CONNECTED,
    ];
}

/// Labels identifying one exchange on the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeLabels {
    /// Destination device name.
    pub target: String,
    /// Command name.
    pub command: String,
}

impl ExchangeLabels {
    /// Creates labels for an exchange.
    pub fn new(target: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            command: command.into(),
        }
    }

    /// Converts to the slice form accepted by the `metrics` macros.
    pub fn to_labels(&self) -> Vec<(&'static str, String)> {
        vec![
            ("target", self.target.clone()),
            ("command", self.command.clone()),
        ]
    }

    /// Returns labels with additional key-value pairs.
    pub fn with(&self, extra: &[(&'static str, String)]) -> Vec<(&'static str, String)> {
        let mut labels = self.to_labels();
        labels.extend_from_slice(extra);
        labels
    }
}

/// Describes all metrics used by the bridge.
///
/// Call once at startup, after installing a recorder.
pub fn describe_metrics() {
    for metric in metric_defs::ALL {
        metric.describe();
    }
}
