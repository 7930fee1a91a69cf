//! OpenTelemetry metrics sink.
//!
//! [`OtelMetrics`] implements [`MetricsBackend`] on top of an OTel [`Meter`];
//! [`init_meter_provider`] installs a global provider exporting over OTLP
//! gRPC. Every instrument carries `daemon`, `asset` and `operation`
//! attributes so one dashboard covers all connectors.

use std::fmt;
use std::time::Duration;

use coinlink::Asset;
use coinlink::metrics::{Gauge, MetricScope, MetricsBackend, Severity};
use opentelemetry::metrics::{Counter, Gauge as ValueGauge, Histogram, Meter};
use opentelemetry::{KeyValue, global};
use opentelemetry_otlp::{ExporterBuildError, MetricExporter, WithExportConfig};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::config::TelemetryConfig;

/// Instrumentation scope name.
pub const METER_NAME: &str = "coinlink";

/// Failure to set up metric export.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The OTLP exporter rejected its configuration.
    #[error("unable to build OTLP metric exporter: {0}")]
    Exporter(#[from] ExporterBuildError),
}

/// Builds an OTLP meter provider and installs it globally.
///
/// The returned provider must be shut down on exit to flush the last batch.
///
/// # Errors
///
/// Returns [`TelemetryError`] if the exporter cannot be built.
pub fn init_meter_provider(config: &TelemetryConfig) -> Result<SdkMeterProvider, TelemetryError> {
    let mut exporter = MetricExporter::builder().with_tonic();
    if let Some(endpoint) = &config.endpoint {
        exporter = exporter.with_endpoint(endpoint.clone());
    }
    let reader = PeriodicReader::builder(exporter.build()?)
        .with_interval(Duration::from_secs(config.export_interval_secs))
        .build();
    let provider = SdkMeterProvider::builder()
        .with_reader(reader)
        .with_resource(
            Resource::builder()
                .with_service_name(env!("CARGO_PKG_NAME"))
                .build(),
        )
        .build();
    global::set_meter_provider(provider.clone());
    tracing::info!(
        endpoint = config.endpoint.as_deref().unwrap_or("default"),
        interval_secs = config.export_interval_secs,
        "OpenTelemetry metrics enabled"
    );
    Ok(provider)
}

/// [`MetricsBackend`] recording into OpenTelemetry instruments.
#[derive(Clone)]
pub struct OtelMetrics {
    requests: Counter<u64>,
    errors: Counter<u64>,
    panics: Counter<u64>,
    durations: Histogram<f64>,
    wallet: ValueGauge<f64>,
}

impl fmt::Debug for OtelMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OtelMetrics").finish_non_exhaustive()
    }
}

fn scope_attributes(scope: &MetricScope) -> [KeyValue; 3] {
    [
        KeyValue::new("daemon", scope.daemon.clone()),
        KeyValue::new("asset", scope.asset.symbol()),
        KeyValue::new("operation", scope.operation),
    ]
}

impl OtelMetrics {
    /// Instruments created on `meter`.
    #[must_use]
    pub fn new(meter: &Meter) -> Self {
        Self {
            requests: meter
                .u64_counter("coinlink.requests")
                .with_description("Connector operations started")
                .build(),
            errors: meter
                .u64_counter("coinlink.errors")
                .with_description("Connector operations failed, by severity")
                .build(),
            panics: meter
                .u64_counter("coinlink.panics")
                .with_description("Panics caught by the process hook")
                .build(),
            durations: meter
                .f64_histogram("coinlink.request.duration")
                .with_unit("s")
                .with_description("Connector operation latency")
                .build(),
            wallet: meter
                .f64_gauge("coinlink.wallet")
                .with_description("Wallet funds and lifetime payment totals")
                .build(),
        }
    }

    /// Instruments on the global meter provider.
    #[must_use]
    pub fn global() -> Self {
        Self::new(&global::meter(METER_NAME))
    }

    /// Counts every panic before handing it to the previous hook.
    pub fn install_panic_hook(&self) {
        let panics = self.panics.clone();
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            panics.add(1, &[]);
            previous(info);
        }));
    }
}

impl MetricsBackend for OtelMetrics {
    fn add_request(&self, scope: &MetricScope) {
        self.requests.add(1, &scope_attributes(scope));
    }

    fn add_error(&self, scope: &MetricScope, severity: Severity) {
        let [daemon, asset, operation] = scope_attributes(scope);
        self.errors.add(
            1,
            &[daemon, asset, operation, KeyValue::new("severity", severity.as_str())],
        );
    }

    fn add_request_duration(&self, scope: &MetricScope, elapsed: Duration) {
        self.durations
            .record(elapsed.as_secs_f64(), &scope_attributes(scope));
    }

    fn set_gauge(&self, daemon: &str, asset: Asset, gauge: Gauge, value: Decimal) {
        let Some(value) = value.to_f64() else {
            tracing::warn!(asset = %asset, gauge = gauge.as_str(), %value, "Gauge value out of range");
            return;
        };
        self.wallet.record(
            value,
            &[
                KeyValue::new("daemon", daemon.to_owned()),
                KeyValue::new("asset", asset.symbol()),
                KeyValue::new("kind", gauge.as_str()),
            ],
        );
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Arc;

    use coinlink::metrics::Measurement;
    use opentelemetry::metrics::MeterProvider;
    use opentelemetry_sdk::metrics::InMemoryMetricExporter;

    use super::*;

    #[test]
    fn test_instruments_are_exported() {
        let exporter = InMemoryMetricExporter::default();
        let provider = SdkMeterProvider::builder()
            .with_reader(PeriodicReader::builder(exporter.clone()).build())
            .build();
        let metrics = Arc::new(OtelMetrics::new(&provider.meter("test")));

        let m = Measurement::start(
            Arc::clone(&metrics) as Arc<dyn MetricsBackend>,
            "bitcoind",
            Asset::Btc,
            "send_payment",
        );
        m.add_error(Severity::High);
        drop(m);
        metrics.set_gauge("bitcoind", Asset::Btc, Gauge::CurrentFunds, Decimal::new(15, 1));
        provider.force_flush().unwrap();

        let exported = exporter.get_finished_metrics().unwrap();
        let names: BTreeSet<String> = exported
            .iter()
            .flat_map(|resource| resource.scope_metrics())
            .flat_map(|scope| scope.metrics())
            .map(|metric| metric.name().to_owned())
            .collect();
        for name in [
            "coinlink.requests",
            "coinlink.errors",
            "coinlink.request.duration",
            "coinlink.wallet",
        ] {
            assert!(names.contains(name), "{name} missing from {names:?}");
        }

        provider.shutdown().unwrap();
    }

    #[test]
    fn test_default_export_interval() {
        assert_eq!(TelemetryConfig::default().export_interval_secs, 30);
    }
}
