//! Connector engine for bitcoind-family daemons.
//!
//! A [`BitcoindConnector`] owns two periodic background tasks once started:
//!
//! - the sync loop, which turns wallet history into payment records
//!   (see [`sync`])
//! - the metrics loop, which publishes lifetime totals (see [`report`])
//!
//! Both observe one [`CancellationToken`] and are joined by
//! [`BlockchainConnector::stop`]. Public operations run on the caller's
//! task.

pub mod config;
pub mod error;
pub mod fee;
pub mod report;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use coinlink::address::{AddressStrategy, strategy_for};
use coinlink::amount::{AmountError, to_minor_units};
use coinlink::detail::PaymentDetail;
use coinlink::metrics::{FailurePoint, Measurement, MetricsBackend, NoopMetrics, SeverityPolicy};
use coinlink::net::{NetAliases, Network};
use coinlink::payment::normalize_fee;
use coinlink::store::{PaymentStore, StateStore};
use coinlink::timestamp::UnixMillis;
use coinlink::{
    Asset, BlockchainConnector, Media, Payment, PaymentDirection, PaymentId, PaymentStatus,
    PaymentSystem,
};
use rust_decimal::Decimal;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::instrument;

use crate::rpc::{ALL_LABELS, DaemonClient};

pub use config::{BitcoindConfig, ConfigError};
pub use error::ConnectorError;
pub use fee::{FeeRate, FeeRateSource, REFERENCE_TX_SIZE};
pub use report::Totals;
pub use sync::SyncOutcome;

/// State shared between the public handle and the background loops.
pub(crate) struct Engine {
    config: BitcoindConfig,
    network: Network,
    daemon: Arc<dyn DaemonClient>,
    payments: Arc<dyn PaymentStore>,
    state: Arc<dyn StateStore>,
    metrics: Arc<dyn MetricsBackend>,
    severity: SeverityPolicy,
    aliases: NetAliases,
    addresses: &'static dyn AddressStrategy,
}

impl Engine {
    fn measure(&self, operation: &'static str) -> Measurement {
        Measurement::start(
            Arc::clone(&self.metrics),
            self.daemon.daemon_name(),
            self.config.asset,
            operation,
        )
    }

    async fn confirmed_balance(&self) -> Result<Decimal, ConnectorError> {
        let m = self.measure("confirmed_balance");
        self.daemon
            .balance(ALL_LABELS, self.config.min_confirmations)
            .await
            .map_err(|err| {
                m.add_error(self.severity.severity(FailurePoint::Balance));
                ConnectorError::rpc("unable to get confirmed balance")(err)
            })
    }

    async fn pending_balance(&self) -> Result<Decimal, ConnectorError> {
        let m = self.measure("pending_balance");
        let severity = self.severity.severity(FailurePoint::Balance);
        let overall = self.daemon.balance(ALL_LABELS, 0).await.map_err(|err| {
            m.add_error(severity);
            ConnectorError::rpc("unable to get overall balance")(err)
        })?;
        let confirmed = self
            .daemon
            .balance(ALL_LABELS, self.config.min_confirmations)
            .await
            .map_err(|err| {
                m.add_error(severity);
                ConnectorError::rpc("unable to get confirmed balance")(err)
            })?;
        Ok(overall - confirmed)
    }

    /// Runs `tick` every `period` until `cancel` fires. The first tick comes
    /// one period after the start.
    async fn run_periodic<F, Fut>(
        self: Arc<Self>,
        name: &'static str,
        period: Duration,
        cancel: CancellationToken,
        tick: F,
    ) where
        F: Fn(Arc<Self>) -> Fut,
        Fut: Future<Output = ()>,
    {
        tracing::info!(asset = %self.config.asset, task = name, "Start background task");
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => tick(Arc::clone(&self)).await,
            }
        }
        tracing::info!(asset = %self.config.asset, task = name, "Quit background task");
    }
}

/// Collects the dependencies of a [`BitcoindConnector`].
#[must_use]
pub struct ConnectorBuilder {
    config: BitcoindConfig,
    daemon: Option<Arc<dyn DaemonClient>>,
    payments: Option<Arc<dyn PaymentStore>>,
    state: Option<Arc<dyn StateStore>>,
    metrics: Arc<dyn MetricsBackend>,
    severity: SeverityPolicy,
    aliases: NetAliases,
}

impl fmt::Debug for ConnectorBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectorBuilder")
            .field("config", &self.config)
            .field("daemon", &self.daemon.as_ref().map(|d| d.daemon_name().to_owned()))
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}

impl ConnectorBuilder {
    /// Daemon the connector talks to.
    pub fn daemon(mut self, daemon: Arc<dyn DaemonClient>) -> Self {
        self.daemon = Some(daemon);
        self
    }

    /// Ledger the connector writes payments to.
    pub fn payment_store(mut self, payments: Arc<dyn PaymentStore>) -> Self {
        self.payments = Some(payments);
        self
    }

    /// Durable sync cursor of this connector.
    pub fn state_store(mut self, state: Arc<dyn StateStore>) -> Self {
        self.state = Some(state);
        self
    }

    /// Metrics sink; [`NoopMetrics`] by default.
    pub fn metrics(mut self, metrics: Arc<dyn MetricsBackend>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Severity table; [`SeverityPolicy::default`] by default.
    pub fn severity_policy(mut self, severity: SeverityPolicy) -> Self {
        self.severity = severity;
        self
    }

    /// Accepted network-name pairs; [`NetAliases::default`] by default.
    pub fn net_aliases(mut self, aliases: NetAliases) -> Self {
        self.aliases = aliases;
        self
    }

    /// Validates everything and builds the connector.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::Config`] on an invalid config or a missing
    /// dependency.
    pub fn build(self) -> Result<BitcoindConnector, ConnectorError> {
        self.config.validate()?;
        let network = self.config.network()?;
        let engine = Engine {
            network,
            addresses: strategy_for(self.config.asset),
            daemon: self.daemon.ok_or(ConfigError::Missing("rpc client"))?,
            payments: self.payments.ok_or(ConfigError::Missing("payment store"))?,
            state: self.state.ok_or(ConfigError::Missing("state store"))?,
            metrics: self.metrics,
            severity: self.severity,
            aliases: self.aliases,
            config: self.config,
        };
        Ok(BitcoindConnector {
            engine: Arc::new(engine),
            started: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            tracker: TaskTracker::new(),
        })
    }
}

/// Connector serving one bitcoind-family asset.
pub struct BitcoindConnector {
    engine: Arc<Engine>,
    started: AtomicBool,
    shutdown: AtomicBool,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl fmt::Debug for BitcoindConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BitcoindConnector")
            .field("asset", &self.engine.config.asset)
            .field("net", &self.engine.config.net)
            .field("daemon", &self.engine.daemon.daemon_name())
            .field("started", &self.started.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl BitcoindConnector {
    /// Starts building a connector for `config`.
    pub fn builder(config: BitcoindConfig) -> ConnectorBuilder {
        ConnectorBuilder {
            config,
            daemon: None,
            payments: None,
            state: None,
            metrics: Arc::new(NoopMetrics),
            severity: SeverityPolicy::default(),
            aliases: NetAliases::default(),
        }
    }

    /// Configuration in effect.
    #[must_use]
    pub fn config(&self) -> &BitcoindConfig {
        &self.engine.config
    }

    /// Runs one sync pass now, outside the sync loop.
    ///
    /// # Errors
    ///
    /// Propagates daemon and store failures and reports truncated daemon
    /// history as [`ConnectorError::HistoryInconsistency`].
    pub async fn sync_now(&self) -> Result<SyncOutcome, ConnectorError> {
        self.engine.sync_payment_state().await
    }

    /// Fee rate the next estimate would use.
    pub async fn fee_rate(&self) -> FeeRate {
        self.engine.fee_rate().await
    }

    async fn launch(&self) -> Result<(), ConnectorError> {
        let engine = &self.engine;
        let m = engine.measure("start");
        let info = engine.daemon.blockchain_info().await.map_err(|err| {
            m.add_error(engine.severity.severity(FailurePoint::BlockchainInfo));
            ConnectorError::rpc("unable to get type of network")(err)
        })?;

        if !engine.aliases.is_proper_net(&engine.config.net, &info.chain) {
            return Err(ConnectorError::NetworkMismatch {
                desired: engine.config.net.clone(),
                actual: info.chain,
            });
        }
        tracing::info!(
            asset = %engine.config.asset,
            net = %engine.config.net,
            daemon = engine.daemon.daemon_name(),
            blocks = info.blocks,
            "Init connector"
        );

        self.tracker.spawn(Arc::clone(engine).run_periodic(
            "sync",
            engine.config.sync_interval,
            self.cancel.clone(),
            |engine| async move {
                if let Err(err) = engine.sync_payment_state().await {
                    tracing::error!(
                        asset = %engine.config.asset,
                        error = %err,
                        "Unable to sync payment state"
                    );
                }
            },
        ));
        self.tracker.spawn(Arc::clone(engine).run_periodic(
            "metrics",
            engine.config.report_interval,
            self.cancel.clone(),
            |engine| async move {
                if let Err(err) = engine.report_metrics().await {
                    tracing::error!(
                        asset = %engine.config.asset,
                        error = %err,
                        "Unable to report metrics"
                    );
                }
            },
        ));
        Ok(())
    }
}

#[async_trait]
impl BlockchainConnector for BitcoindConnector {
    type Error = ConnectorError;

    fn asset(&self) -> Asset {
        self.engine.config.asset
    }

    async fn start(&self) -> Result<(), ConnectorError> {
        if self
            .started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::warn!(asset = %self.engine.config.asset, "Connector already started");
            return Ok(());
        }
        let result = self.launch().await;
        if result.is_err() {
            self.started.store(false, Ordering::Release);
        }
        result
    }

    async fn stop(&self, reason: &str) {
        if self
            .shutdown
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::warn!(asset = %self.engine.config.asset, "Connector already shutting down");
            return;
        }
        tracing::info!(asset = %self.engine.config.asset, reason, "Connector shutting down");
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        tracing::info!(asset = %self.engine.config.asset, "Connector stopped");
    }

    #[instrument(skip(self), fields(asset = %self.engine.config.asset), err)]
    async fn create_address(&self) -> Result<String, ConnectorError> {
        let m = self.engine.measure("create_address");
        self.engine.daemon.new_address("").await.map_err(|err| {
            m.add_error(self.engine.severity.severity(FailurePoint::CreateAddress));
            ConnectorError::rpc("unable to generate new address")(err)
        })
    }

    #[instrument(skip(self), fields(asset = %self.engine.config.asset), err)]
    async fn confirmed_balance(&self) -> Result<Decimal, ConnectorError> {
        self.engine.confirmed_balance().await
    }

    #[instrument(skip(self), fields(asset = %self.engine.config.asset), err)]
    async fn pending_balance(&self) -> Result<Decimal, ConnectorError> {
        self.engine.pending_balance().await
    }

    #[instrument(skip(self), fields(asset = %self.engine.config.asset), err)]
    async fn send_payment(&self, address: &str, amount: Decimal) -> Result<Payment, ConnectorError> {
        let engine = &self.engine;
        let config = &engine.config;
        let m = engine.measure("send_payment");
        let fail = |point: FailurePoint| m.add_error(engine.severity.severity(point));

        let decoded = engine.addresses.decode(address, &config.net).map_err(|err| {
            fail(FailurePoint::DecodeAddress);
            err
        })?;
        let units = to_minor_units(amount, config.asset.decimals())
            .and_then(|units| u64::try_from(units).map_err(|_| AmountError::Overflow))
            .map_err(|err| {
                fail(FailurePoint::DecodeAmount);
                err
            })?;

        let tx_id = engine
            .daemon
            .send_to_address(&decoded.encoded, units)
            .await
            .map_err(|err| {
                fail(FailurePoint::SendTx);
                ConnectorError::rpc("unable to send transaction")(err)
            })?;
        let tx = engine.daemon.transaction(&tx_id).await.map_err(|err| {
            fail(FailurePoint::LookupTx);
            ConnectorError::rpc("unable to get transaction by hash")(err)
        })?;

        let confirmations = u64::try_from(tx.confirmations).unwrap_or(0);
        let payment = Payment {
            payment_id: PaymentId::default(),
            updated_at: UnixMillis::now(),
            status: PaymentStatus::Pending,
            direction: PaymentDirection::Outgoing,
            system: PaymentSystem::External,
            receipt: address.to_owned(),
            asset: config.asset,
            media: Media::Blockchain,
            amount: amount.normalize(),
            media_fee: normalize_fee(tx.fee),
            media_id: tx_id,
            detail: None,
        }
        .with_computed_id()
        .with_detail(PaymentDetail::pending(
            confirmations,
            u64::from(config.min_confirmations),
        ));

        engine
            .payments
            .save_payment(payment.clone())
            .await
            .map_err(|err| {
                fail(FailurePoint::SavePayment);
                ConnectorError::store("unable to save payment")(err)
            })?;
        tracing::info!(
            asset = %config.asset,
            payment_id = %payment.payment_id,
            tx_id = %payment.media_id,
            "Payment sent"
        );
        Ok(payment)
    }

    fn validate_address(&self, address: &str) -> Result<(), ConnectorError> {
        let engine = &self.engine;
        let m = engine.measure("validate_address");
        engine
            .addresses
            .validate(address, &engine.config.net)
            .map_err(|err| {
                m.add_error(engine.severity.severity(FailurePoint::DecodeAddress));
                ConnectorError::from(err)
            })
    }

    #[instrument(skip_all, fields(asset = %self.engine.config.asset), err)]
    async fn estimate_fee(&self, _amount: Decimal) -> Result<Decimal, ConnectorError> {
        self.engine.estimate_fee().await
    }
}
