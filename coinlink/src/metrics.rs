//! Metrics sink seam and severity policy.
//!
//! Connectors wrap every public operation in a [`Measurement`] scoped to
//! `(daemon, asset, operation)`. Failures are tagged with a [`Severity`]
//! looked up in a [`SeverityPolicy`], which is built once at startup and
//! handed to each connector.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rust_decimal::Decimal;

use crate::payment::Asset;

/// Operational importance of a reported error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    /// Cosmetic or caller-input problems.
    Low,
    /// Degraded but self-healing.
    Middle,
    /// Needs an operator.
    High,
}

impl Severity {
    /// Label used by exporters.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Middle => "middle",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Place in a connector where an error can surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailurePoint {
    /// Reading chain identity at start.
    BlockchainInfo,
    /// Asking the daemon for a new address.
    CreateAddress,
    /// Caller passed an undecodable address.
    DecodeAddress,
    /// Caller passed an unusable amount.
    DecodeAmount,
    /// Reading wallet balances.
    Balance,
    /// Broadcasting a transaction.
    SendTx,
    /// Looking up a broadcast transaction.
    LookupTx,
    /// Writing a payment record.
    SavePayment,
    /// A sync pass failed.
    Sync,
    /// Daemon history is shorter than the persisted cursor.
    HistoryInconsistency,
    /// Daemon listed a transaction category the connector does not know.
    UnknownCategory,
    /// Fee estimate fell back to the configured rate.
    FeeFallback,
    /// A metrics report pass failed.
    Report,
}

/// Explicit failure-point to severity table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeverityPolicy {
    table: HashMap<FailurePoint, Severity>,
    fallback: Severity,
}

impl Default for SeverityPolicy {
    fn default() -> Self {
        use FailurePoint as P;
        use Severity::{High, Low, Middle};

        let table = [
            (P::BlockchainInfo, High),
            (P::CreateAddress, High),
            (P::DecodeAddress, Low),
            (P::DecodeAmount, Low),
            (P::Balance, Middle),
            (P::SendTx, High),
            (P::LookupTx, High),
            (P::SavePayment, High),
            (P::Sync, Middle),
            (P::HistoryInconsistency, High),
            (P::UnknownCategory, High),
            (P::FeeFallback, High),
            (P::Report, Middle),
        ]
        .into_iter()
        .collect();
        Self {
            table,
            fallback: Middle,
        }
    }
}

impl SeverityPolicy {
    /// Overrides the severity of one failure point.
    #[must_use]
    pub fn with_severity(mut self, point: FailurePoint, severity: Severity) -> Self {
        self.table.insert(point, severity);
        self
    }

    /// Severity of `point`.
    #[must_use]
    pub fn severity(&self, point: FailurePoint) -> Severity {
        self.table.get(&point).copied().unwrap_or(self.fallback)
    }
}

/// Scope of one measurement.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetricScope {
    /// Daemon display name, e.g. `bitcoind`.
    pub daemon: String,
    /// Asset served by the connector.
    pub asset: Asset,
    /// Operation name, e.g. `send_payment`.
    pub operation: &'static str,
}

/// Lifetime aggregates reported by the metrics loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gauge {
    /// Confirmed wallet balance.
    CurrentFunds,
    /// Sum of completed incoming amounts.
    OverallReceived,
    /// Sum of completed outgoing amounts.
    OverallSent,
    /// Sum of fees on completed outgoing payments.
    OverallFee,
}

impl Gauge {
    /// Label used by exporters.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CurrentFunds => "current_funds",
            Self::OverallReceived => "overall_received",
            Self::OverallSent => "overall_sent",
            Self::OverallFee => "overall_fee",
        }
    }
}

/// Receiver of connector metrics.
pub trait MetricsBackend: Send + Sync + fmt::Debug {
    /// An operation started.
    fn add_request(&self, scope: &MetricScope);

    /// An operation failed.
    fn add_error(&self, scope: &MetricScope, severity: Severity);

    /// An operation finished after `elapsed`.
    fn add_request_duration(&self, scope: &MetricScope, elapsed: Duration);

    /// Sets a lifetime gauge.
    fn set_gauge(&self, daemon: &str, asset: Asset, gauge: Gauge, value: Decimal);
}

/// Backend that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl MetricsBackend for NoopMetrics {
    fn add_request(&self, _scope: &MetricScope) {}
    fn add_error(&self, _scope: &MetricScope, _severity: Severity) {}
    fn add_request_duration(&self, _scope: &MetricScope, _elapsed: Duration) {}
    fn set_gauge(&self, _daemon: &str, _asset: Asset, _gauge: Gauge, _value: Decimal) {}
}

/// Event recorded by [`MemoryMetrics`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricEvent {
    /// See [`MetricsBackend::add_request`].
    Request(&'static str),
    /// See [`MetricsBackend::add_error`].
    Error(&'static str, Severity),
    /// See [`MetricsBackend::add_request_duration`].
    Finished(&'static str),
    /// See [`MetricsBackend::set_gauge`].
    Gauge(Gauge, Decimal),
}

/// Backend that keeps events in memory for inspection.
#[derive(Debug, Default)]
pub struct MemoryMetrics {
    events: Mutex<Vec<MetricEvent>>,
}

impl MemoryMetrics {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, event: MetricEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }

    /// Copy of everything recorded so far.
    #[must_use]
    pub fn events(&self) -> Vec<MetricEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Errors recorded for `operation`.
    #[must_use]
    pub fn errors_for(&self, operation: &str) -> Vec<Severity> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                MetricEvent::Error(op, severity) if op == operation => Some(severity),
                _ => None,
            })
            .collect()
    }

    /// Last value set for `gauge`.
    #[must_use]
    pub fn gauge(&self, gauge: Gauge) -> Option<Decimal> {
        self.events().into_iter().rev().find_map(|e| match e {
            MetricEvent::Gauge(g, v) if g == gauge => Some(v),
            _ => None,
        })
    }
}

impl MetricsBackend for MemoryMetrics {
    fn add_request(&self, scope: &MetricScope) {
        self.push(MetricEvent::Request(scope.operation));
    }

    fn add_error(&self, scope: &MetricScope, severity: Severity) {
        self.push(MetricEvent::Error(scope.operation, severity));
    }

    fn add_request_duration(&self, scope: &MetricScope, _elapsed: Duration) {
        self.push(MetricEvent::Finished(scope.operation));
    }

    fn set_gauge(&self, _daemon: &str, _asset: Asset, gauge: Gauge, value: Decimal) {
        self.push(MetricEvent::Gauge(gauge, value));
    }
}

/// One in-flight operation.
///
/// Counts a request on creation and reports its duration when dropped.
#[derive(Debug)]
pub struct Measurement {
    backend: Arc<dyn MetricsBackend>,
    scope: MetricScope,
    started: Instant,
}

impl Measurement {
    /// Starts measuring `operation`.
    #[must_use]
    pub fn start(
        backend: Arc<dyn MetricsBackend>,
        daemon: impl Into<String>,
        asset: Asset,
        operation: &'static str,
    ) -> Self {
        let scope = MetricScope {
            daemon: daemon.into(),
            asset,
            operation,
        };
        backend.add_request(&scope);
        Self {
            backend,
            scope,
            started: Instant::now(),
        }
    }

    /// Tags the operation as failed.
    pub fn add_error(&self, severity: Severity) {
        self.backend.add_error(&self.scope, severity);
    }

    /// Scope of this measurement.
    #[must_use]
    pub const fn scope(&self) -> &MetricScope {
        &self.scope
    }
}

impl Drop for Measurement {
    fn drop(&mut self) {
        self.backend
            .add_request_duration(&self.scope, self.started.elapsed());
    }
}
