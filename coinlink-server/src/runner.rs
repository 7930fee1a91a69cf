//! Connector wiring.
//!
//! [`Runner`] builds one [`BitcoindConnector`] per configured asset. All of
//! them share a single file-backed payment ledger; each keeps its own sync
//! cursor file under the data directory.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use coinlink::metrics::MetricsBackend;
use coinlink::store::{FilePaymentStore, FileStateStore, PaymentStore, StoreError};
use coinlink::{Asset, BlockchainConnector};
use coinlink_bitcoind::{BitcoindConnector, ConnectorError, RpcClient, RpcError, flavor_for};
use futures_util::future::join_all;

use crate::config::{ConnectorConfig, ServerConfig, ServerConfigError};

/// Payment ledger file inside the data directory.
pub const PAYMENTS_FILE: &str = "payments.json";

/// Errors raised while wiring or starting connectors.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// Invalid server configuration.
    #[error(transparent)]
    Config(#[from] ServerConfigError),
    /// The data directory could not be created.
    #[error("unable to create data directory {path}: {source}")]
    DataDir {
        /// Directory that was requested.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// No bitcoind-family daemon serves this asset.
    #[error("{0}: asset is not served by a bitcoind-family daemon")]
    Unsupported(Asset),
    /// The RPC client could not be built.
    #[error("{asset}: {source}")]
    Rpc {
        /// Connector asset.
        asset: Asset,
        /// Underlying error.
        #[source]
        source: RpcError,
    },
    /// The shared payment ledger could not be opened.
    #[error("unable to open payment store: {0}")]
    Store(#[from] StoreError),
    /// A connector failed to build or start.
    #[error("{asset}: {source}")]
    Connector {
        /// Connector asset.
        asset: Asset,
        /// Underlying error.
        #[source]
        source: ConnectorError,
    },
}

/// Every connector of the process.
#[derive(Debug)]
pub struct Runner {
    connectors: Vec<BitcoindConnector>,
}

fn rpc_client(asset: Asset, section: &ConnectorConfig) -> Result<RpcClient, RunnerError> {
    let flavor = flavor_for(asset).ok_or(RunnerError::Unsupported(asset))?;
    let mut client = RpcClient::try_new(&section.rpc_url, flavor)
        .map_err(|source| RunnerError::Rpc { asset, source })?;
    if let Some(user) = &section.rpc_user {
        client = client.with_credentials(
            user.clone(),
            section.rpc_password.clone().unwrap_or_default(),
        );
    }
    if let Some(secs) = section.rpc_timeout_secs {
        client = client.with_timeout(Duration::from_secs(secs));
    }
    Ok(client)
}

impl Runner {
    /// Builds a connector for every `[connectors.<ASSET>]` table.
    ///
    /// # Errors
    ///
    /// Fails on invalid configuration, an unsupported asset, or when the
    /// data directory or payment ledger cannot be opened.
    pub async fn from_config(
        config: &ServerConfig,
        metrics: Arc<dyn MetricsBackend>,
    ) -> Result<Self, RunnerError> {
        let assets = config.assets()?;
        tokio::fs::create_dir_all(&config.data_dir)
            .await
            .map_err(|source| RunnerError::DataDir {
                path: config.data_dir.clone(),
                source,
            })?;
        let payments: Arc<dyn PaymentStore> =
            Arc::new(FilePaymentStore::open(config.data_dir.join(PAYMENTS_FILE)).await?);

        let mut connectors = Vec::with_capacity(assets.len());
        for (asset, section) in assets {
            let connector = BitcoindConnector::builder(section.bitcoind_config(asset))
                .daemon(Arc::new(rpc_client(asset, section)?))
                .payment_store(Arc::clone(&payments))
                .state_store(Arc::new(FileStateStore::new(&config.data_dir, asset)))
                .metrics(Arc::clone(&metrics))
                .build()
                .map_err(|source| RunnerError::Connector { asset, source })?;
            tracing::info!(asset = %asset, net = %section.net, "Connector configured");
            connectors.push(connector);
        }
        Ok(Self { connectors })
    }

    /// Configured connectors, in ticker order.
    #[must_use]
    pub fn connectors(&self) -> &[BitcoindConnector] {
        &self.connectors
    }

    /// Starts every connector. If any fails, all are stopped again.
    ///
    /// # Errors
    ///
    /// Returns the first connector failure.
    pub async fn start(&self) -> Result<(), RunnerError> {
        let results = join_all(self.connectors.iter().map(|connector| async move {
            connector
                .start()
                .await
                .map_err(|source| RunnerError::Connector {
                    asset: connector.asset(),
                    source,
                })
        }))
        .await;
        if let Some(err) = results.into_iter().find_map(Result::err) {
            self.stop("startup failed").await;
            return Err(err);
        }
        tracing::info!(connectors = self.connectors.len(), "All connectors started");
        Ok(())
    }

    /// Stops every connector and waits for their loops.
    pub async fn stop(&self, reason: &str) {
        join_all(self.connectors.iter().map(|connector| connector.stop(reason))).await;
    }
}
