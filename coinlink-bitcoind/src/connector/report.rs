//! Lifetime totals reported by the metrics loop.

use coinlink::metrics::{FailurePoint, Gauge};
use coinlink::store::PaymentFilter;
use coinlink::{Media, Payment, PaymentDirection, PaymentStatus, PaymentSystem};
use rust_decimal::Decimal;

use super::Engine;
use super::error::ConnectorError;

/// Sums over completed external blockchain payments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Totals {
    /// Incoming amounts.
    pub received: Decimal,
    /// Outgoing amounts.
    pub sent: Decimal,
    /// Fees of outgoing payments.
    pub fee: Decimal,
}

impl Totals {
    /// Aggregates `payments`, ignoring internal ones.
    #[must_use]
    pub fn from_payments<'a>(payments: impl IntoIterator<Item = &'a Payment>) -> Self {
        payments
            .into_iter()
            .filter(|p| p.system == PaymentSystem::External)
            .fold(Self::default(), |mut totals, p| {
                match p.direction {
                    PaymentDirection::Incoming => totals.received += p.amount,
                    PaymentDirection::Outgoing => {
                        totals.sent += p.amount;
                        totals.fee += p.media_fee;
                    }
                    PaymentDirection::Internal => {}
                }
                totals
            })
    }
}

impl Engine {
    /// Publishes lifetime totals and the confirmed balance.
    pub(crate) async fn report_metrics(&self) -> Result<Totals, ConnectorError> {
        let m = self.measure("report_metrics");
        let severity = self.severity.severity(FailurePoint::Report);
        let daemon = self.daemon.daemon_name();
        let asset = self.config.asset;

        let filter = PaymentFilter::all()
            .with_asset(asset)
            .with_status(PaymentStatus::Completed)
            .with_media(Media::Blockchain);
        let payments = self.payments.list_payments(&filter).await.map_err(|err| {
            m.add_error(severity);
            ConnectorError::store("unable to list payments")(err)
        })?;

        let totals = Totals::from_payments(&payments);
        self.metrics.set_gauge(daemon, asset, Gauge::OverallReceived, totals.received);
        self.metrics.set_gauge(daemon, asset, Gauge::OverallSent, totals.sent);
        self.metrics.set_gauge(daemon, asset, Gauge::OverallFee, totals.fee);

        let funds = self.confirmed_balance().await.map_err(|err| {
            m.add_error(severity);
            err
        })?;
        self.metrics.set_gauge(daemon, asset, Gauge::CurrentFunds, funds);

        tracing::info!(
            asset = %asset,
            funds = %funds,
            received = %totals.received,
            sent = %totals.sent,
            fee = %totals.fee,
            "Metrics reported"
        );
        Ok(totals)
    }
}
