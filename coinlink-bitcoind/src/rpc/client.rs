//! JSON-RPC 1.0 over HTTP, as spoken by bitcoind and its forks.
//!
//! [`RpcClient`] posts `{"jsonrpc": "1.0", "id", "method", "params"}` with
//! HTTP basic auth and unwraps the `{"result", "error"}` envelope.
//!
//! ## Error Handling
//!
//! bitcoind replies to failed calls with HTTP 500 (or 404 for unknown
//! methods) and a regular JSON-RPC envelope, so the body is always decoded
//! first:
//! - an `error` object becomes [`RpcError::Daemon`] whatever the status
//! - a non-envelope body with a non-200 status becomes [`RpcError::HttpStatus`]
//! - a 200 body that is not an envelope becomes
//!   [`RpcError::JsonDeserialization`]
//!
//! Amounts are sent as decimal strings, which bitcoind accepts wherever it
//! accepts numbers, so no value ever passes through a float.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use coinlink::amount::from_minor_units;
use http::StatusCode;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use url::Url;

use super::error::RpcError;
use super::flavor::{DaemonFlavor, FEE_CONF_TARGET, decode};
use super::types::{BlockchainInfo, ListTransactionsEntry, SignedTransaction, TxInput, WalletTransaction};
use super::DaemonClient;

/// Decimal places of every bitcoind-family coin.
const COIN_DECIMALS: u32 = 8;

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: &'a [Value],
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Clone)]
struct Credentials {
    user: String,
    password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A client for one bitcoind-family daemon.
#[derive(Clone, Debug)]
pub struct RpcClient {
    /// Daemon RPC endpoint, e.g. `http://127.0.0.1:8332/`
    url: Url,
    /// Shared Reqwest HTTP client
    client: Client,
    /// Optional `rpcuser`/`rpcpassword`
    credentials: Option<Credentials>,
    /// Optional request timeout
    timeout: Option<Duration>,
    /// Daemon-specific calls
    flavor: &'static dyn DaemonFlavor,
    /// JSON-RPC request id sequence
    next_id: Arc<AtomicU64>,
}

impl RpcClient {
    /// Constructs a client for the daemon at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::UrlParse`] if `url` is not a valid URL.
    pub fn try_new(url: &str, flavor: &'static dyn DaemonFlavor) -> Result<Self, RpcError> {
        let url = Url::parse(url).map_err(|source| RpcError::UrlParse {
            context: "Failed to parse daemon url",
            source,
        })?;
        Ok(Self {
            url,
            client: Client::new(),
            credentials: None,
            timeout: None,
            flavor,
            next_id: Arc::new(AtomicU64::new(1)),
        })
    }

    /// Authenticates every request with HTTP basic auth.
    #[must_use]
    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials {
            user: user.into(),
            password: password.into(),
        });
        self
    }

    /// Sets a timeout for all future requests.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Returns the daemon endpoint.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Returns the configured timeout, if any.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Calls `method` and decodes its result as `R`.
    ///
    /// # Errors
    ///
    /// See the module documentation.
    pub async fn call<R>(&self, method: &'static str, params: &[Value]) -> Result<R, RpcError>
    where
        R: DeserializeOwned,
    {
        let raw = self.call_raw(method, params).await?;
        decode(method, raw)
    }

    /// Calls `method` and returns its undecoded result.
    ///
    /// # Errors
    ///
    /// See the module documentation.
    pub async fn call_raw(&self, method: &'static str, params: &[Value]) -> Result<Value, RpcError> {
        let request = RpcRequest {
            jsonrpc: "1.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };
        let mut req = self.client.post(self.url.clone()).json(&request);
        if let Some(credentials) = &self.credentials {
            req = req.basic_auth(&credentials.user, Some(&credentials.password));
        }
        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }
        let http_response = req.send().await.map_err(|source| RpcError::Http {
            context: method,
            source,
        })?;

        let status = http_response.status();
        let body = http_response
            .text()
            .await
            .map_err(|source| RpcError::ResponseBodyRead {
                context: method,
                source,
            })?;

        let result = match serde_json::from_str::<RpcResponse>(&body) {
            Ok(RpcResponse {
                error: Some(error), ..
            }) => Err(RpcError::Daemon {
                context: method,
                code: error.code,
                message: error.message,
            }),
            Ok(RpcResponse { result, .. }) if status == StatusCode::OK => Ok(result),
            Err(source) if status == StatusCode::OK => Err(RpcError::JsonDeserialization {
                context: method,
                source,
            }),
            _ => Err(RpcError::HttpStatus {
                context: method,
                status,
                body,
            }),
        };

        record_result(method, &result);
        result
    }
}

fn record_result<R>(method: &'static str, result: &Result<R, RpcError>) {
    match result {
        Ok(_) => tracing::trace!(method, "RPC call succeeded"),
        Err(err) => tracing::debug!(method, error = %err, "RPC call failed"),
    }
}

fn coins(context: &'static str, units: u64) -> Result<Value, RpcError> {
    let amount = from_minor_units(u128::from(units), COIN_DECIMALS)
        .map_err(|e| RpcError::rejected(context, e.to_string()))?;
    Ok(Value::String(amount.to_string()))
}

#[async_trait]
impl DaemonClient for RpcClient {
    fn daemon_name(&self) -> &str {
        self.flavor.daemon_name()
    }

    async fn blockchain_info(&self) -> Result<BlockchainInfo, RpcError> {
        let raw = self.call_raw("getblockchaininfo", &[]).await?;
        self.flavor.parse_chain_info(raw)
    }

    async fn new_address(&self, label: &str) -> Result<String, RpcError> {
        self.call("getnewaddress", &[json!(label)]).await
    }

    async fn raw_change_address(&self) -> Result<String, RpcError> {
        self.call("getrawchangeaddress", &[]).await
    }

    async fn balance(&self, label: &str, min_conf: u32) -> Result<Decimal, RpcError> {
        self.call("getbalance", &[json!(label), json!(min_conf)])
            .await
    }

    async fn create_raw_transaction(
        &self,
        inputs: &[TxInput],
        outputs: &[(String, u64)],
    ) -> Result<String, RpcError> {
        const METHOD: &str = "createrawtransaction";
        let mut out = Map::new();
        for (address, units) in outputs {
            out.insert(address.clone(), coins(METHOD, *units)?);
        }
        let inputs: Vec<Value> = inputs
            .iter()
            .map(|input| json!({"txid": input.txid, "vout": input.vout}))
            .collect();
        self.call(METHOD, &[Value::Array(inputs), Value::Object(out), json!(0)])
            .await
    }

    async fn sign_raw_transaction(&self, tx_hex: &str) -> Result<String, RpcError> {
        const METHOD: &str = "signrawtransactionwithwallet";
        let signed: SignedTransaction = self.call(METHOD, &[json!(tx_hex)]).await?;
        if !signed.complete {
            return Err(RpcError::rejected(METHOD, "unable to sign all inputs"));
        }
        Ok(signed.hex)
    }

    async fn send_raw_transaction(&self, tx_hex: &str) -> Result<String, RpcError> {
        self.call("sendrawtransaction", &[json!(tx_hex)]).await
    }

    async fn send_to_address(&self, address: &str, amount_units: u64) -> Result<String, RpcError> {
        const METHOD: &str = "sendtoaddress";
        let amount = coins(METHOD, amount_units)?;
        self.call(METHOD, &[json!(address), amount]).await
    }

    async fn transaction(&self, tx_id: &str) -> Result<WalletTransaction, RpcError> {
        self.call("gettransaction", &[json!(tx_id)]).await
    }

    async fn list_transactions(
        &self,
        label: &str,
        count: u32,
        skip: u32,
    ) -> Result<Vec<ListTransactionsEntry>, RpcError> {
        self.call(
            "listtransactions",
            &[json!(label), json!(count), json!(skip)],
        )
        .await
    }

    async fn estimate_fee(&self) -> Result<Decimal, RpcError> {
        let (method, params) = self.flavor.fee_request(FEE_CONF_TARGET);
        let raw = self.call_raw(method, &params).await?;
        self.flavor.parse_fee(FEE_CONF_TARGET, raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::flavor::{BitcoinCashFlavor, BitcoinFlavor};
    use wiremock::matchers::{body_partial_json, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn envelope(result: Value) -> Value {
        json!({"result": result, "error": null, "id": 1})
    }

    async fn client(server: &MockServer) -> RpcClient {
        RpcClient::try_new(&server.uri(), &BitcoinFlavor)
            .unwrap()
            .with_credentials("user", "pass")
    }

    #[tokio::test]
    async fn test_call_sends_basic_auth_and_params() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .and(header_exists("authorization"))
            .and(body_partial_json(json!({
                "jsonrpc": "1.0",
                "method": "getbalance",
                "params": ["*", 3]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!(1.25))))
            .expect(1)
            .mount(&mock_server)
            .await;

        let balance = client(&mock_server).await.balance("*", 3).await.unwrap();
        assert_eq!(balance, Decimal::new(125, 2));
    }

    #[tokio::test]
    async fn test_daemon_error_on_http_500() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "result": null,
                "error": {"code": -6, "message": "Insufficient funds"},
                "id": 1
            })))
            .mount(&mock_server)
            .await;

        let err = client(&mock_server)
            .await
            .send_to_address("2MsFDzHRUAMpjHxKyoEHU3aMCMsVtMqs1PV", 150_000_000)
            .await
            .unwrap_err();
        match err {
            RpcError::Daemon {
                context,
                code,
                message,
            } => {
                assert_eq!(context, "sendtoaddress");
                assert_eq!(code, -6);
                assert_eq!(message, "Insufficient funds");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_amount_sent_as_exact_string() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "method": "sendtoaddress",
                "params": ["mnf5Lfsm6QWrHDdW1DoKn5WBhSTiaW4NY7", "0.10000001"]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!("ab01"))))
            .expect(1)
            .mount(&mock_server)
            .await;

        let tx_id = client(&mock_server)
            .await
            .send_to_address("mnf5Lfsm6QWrHDdW1DoKn5WBhSTiaW4NY7", 10_000_001)
            .await
            .unwrap();
        assert_eq!(tx_id, "ab01");
    }

    #[tokio::test]
    async fn test_unauthorized_is_http_status() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&mock_server)
            .await;

        let err = client(&mock_server).await.blockchain_info().await.unwrap_err();
        assert!(matches!(
            err,
            RpcError::HttpStatus {
                status: StatusCode::UNAUTHORIZED,
                ..
            }
        ));
        assert_eq!(err.kind(), coinlink::ErrorKind::Config);
    }

    #[tokio::test]
    async fn test_list_transactions() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "method": "listtransactions",
                "params": ["*", 32767, 0]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!([
                {"address": "a", "category": "receive", "amount": 0.5, "confirmations": 6, "txid": "t1"},
                {"address": "b", "category": "send", "amount": -0.2, "fee": -0.0001, "confirmations": 0, "txid": "t2"}
            ]))))
            .mount(&mock_server)
            .await;

        let txs = client(&mock_server)
            .await
            .list_transactions("*", 32767, 0)
            .await
            .unwrap();
        assert_eq!(txs.len(), 2);
        assert_eq!(txs[1].fee, Some(Decimal::new(-1, 4)));
    }

    #[tokio::test]
    async fn test_incomplete_signature_rejected() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(envelope(json!({"hex": "0200", "complete": false}))),
            )
            .mount(&mock_server)
            .await;

        let err = client(&mock_server)
            .await
            .sign_raw_transaction("0200")
            .await
            .unwrap_err();
        assert!(matches!(err, RpcError::Rejected { .. }));
    }

    #[tokio::test]
    async fn test_raw_change_address() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "getrawchangeaddress", "params": []})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(envelope(json!("mnf5Lfsm6QWrHDdW1DoKn5WBhSTiaW4NY7"))),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let address = client(&mock_server).await.raw_change_address().await.unwrap();
        assert_eq!(address, "mnf5Lfsm6QWrHDdW1DoKn5WBhSTiaW4NY7");
    }

    #[tokio::test]
    async fn test_create_raw_transaction_wire_shape() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "method": "createrawtransaction",
                "params": [
                    [{"txid": "f00d", "vout": 1}],
                    {
                        "mnf5Lfsm6QWrHDdW1DoKn5WBhSTiaW4NY7": "0.5",
                        "n3mK9MiauLXGjFXgvW8V15mFkVM5hMXy5V": "0.00000001"
                    },
                    0
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!("0200beef"))))
            .expect(1)
            .mount(&mock_server)
            .await;

        let inputs = [TxInput {
            txid: "f00d".to_owned(),
            vout: 1,
        }];
        let outputs = [
            ("mnf5Lfsm6QWrHDdW1DoKn5WBhSTiaW4NY7".to_owned(), 50_000_000),
            ("n3mK9MiauLXGjFXgvW8V15mFkVM5hMXy5V".to_owned(), 1),
        ];
        let hex = client(&mock_server)
            .await
            .create_raw_transaction(&inputs, &outputs)
            .await
            .unwrap();
        assert_eq!(hex, "0200beef");
    }

    #[tokio::test]
    async fn test_signed_transaction_hex_returned() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "method": "signrawtransactionwithwallet",
                "params": ["0200beef"]
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(envelope(json!({"hex": "0200cafe", "complete": true}))),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let signed = client(&mock_server)
            .await
            .sign_raw_transaction("0200beef")
            .await
            .unwrap();
        assert_eq!(signed, "0200cafe");
    }

    #[tokio::test]
    async fn test_send_raw_transaction() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "method": "sendrawtransaction",
                "params": ["0200cafe"]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!("ab02"))))
            .expect(1)
            .mount(&mock_server)
            .await;

        let tx_id = client(&mock_server)
            .await
            .send_raw_transaction("0200cafe")
            .await
            .unwrap();
        assert_eq!(tx_id, "ab02");
    }

    #[tokio::test]
    async fn test_broadcast_rejection_is_daemon_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "result": null,
                "error": {"code": -26, "message": "min relay fee not met"},
                "id": 1
            })))
            .mount(&mock_server)
            .await;

        let err = client(&mock_server)
            .await
            .send_raw_transaction("0200cafe")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RpcError::Daemon {
                context: "sendrawtransaction",
                code: -26,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_flavor_fee_call() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "estimatefee", "params": [2]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!(0.00002))))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = RpcClient::try_new(&mock_server.uri(), &BitcoinCashFlavor).unwrap();
        assert_eq!(client.daemon_name(), "bitcoincashd");
        assert_eq!(client.estimate_fee().await.unwrap(), Decimal::new(2, 5));
    }

    #[tokio::test]
    async fn test_non_envelope_ok_body() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&mock_server)
            .await;

        let err = client(&mock_server).await.new_address("").await.unwrap_err();
        assert!(matches!(err, RpcError::JsonDeserialization { .. }));
    }

    #[test]
    fn test_invalid_url() {
        let err = RpcClient::try_new("not a url", &BitcoinFlavor).unwrap_err();
        assert_eq!(err.kind(), coinlink::ErrorKind::Config);
    }
}
