use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::account::AccountId;
use crate::error::{Error, Result};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Hash of a broadcast extrinsic, as reported by the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtrinsicHash(pub [u8; 32]);

impl fmt::Display for ExtrinsicHash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// The chain-node boundary. The submitter broadcasts through this trait and
/// never polls for inclusion; confirmation is the caller's concern.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// Whether `address` holds at least the existential deposit.
    async fn account_exists(&self, address: &AccountId) -> Result<bool>;

    /// Broadcast one signed extrinsic. A node-side rejection surfaces as
    /// `Error::SubmissionRejected` with the node's message verbatim.
    async fn submit_extrinsic(&self, extrinsic: &[u8]) -> Result<ExtrinsicHash>;
}

/// JSON-RPC 2.0 client for a chain node.
#[derive(Debug)]
pub struct JsonRpcClient {
    url: String,
    address_prefix: u16,
    existential_deposit: u128,
    http: reqwest::Client,
    request_timeout: Duration,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(url: impl Into<String>, address_prefix: u16, existential_deposit: u128) -> Self {
        Self {
            url: url.into(),
            address_prefix,
            existential_deposit,
            http: reqwest::Client::new(),
            request_timeout: DEFAULT_TIMEOUT,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
            "method": method,
            "params": params,
        });
        let response = self
            .http
            .post(&self.url)
            .timeout(self.request_timeout)
            .json(&body)
            .send()
            .await
            .map_err(|source| Error::Transport {
                endpoint: self.url.clone(),
                source,
            })?;
        if !response.status().is_success() {
            return Err(Error::ApiStatus {
                endpoint: self.url.clone(),
                status: response.status(),
            });
        }
        let reply: RpcReply<T> = response
            .json()
            .await
            .map_err(|e| Error::Schema(format!("invalid response from {}: {e}", self.url)))?;
        if let Some(error) = reply.error {
            return Err(Error::SubmissionRejected(error.message));
        }
        reply
            .result
            .ok_or_else(|| Error::Schema(format!("empty result for {method} from {}", self.url)))
    }
}

#[async_trait]
impl ChainRpc for JsonRpcClient {
    async fn account_exists(&self, address: &AccountId) -> Result<bool> {
        let balance: String = self
            .call(
                "system_accountBalance",
                json!([address.to_ss58(self.address_prefix)]),
            )
            .await
            // a balance probe failure is not a chain rejection
            .map_err(|e| match e {
                Error::SubmissionRejected(message) => {
                    Error::Schema(format!("balance query failed: {message}"))
                }
                other => other,
            })?;
        let balance: u128 = balance
            .parse()
            .map_err(|e| Error::Schema(format!("invalid balance {balance:?}: {e}")))?;
        debug!(%address, balance, "queried account balance");
        Ok(balance >= self.existential_deposit)
    }

    async fn submit_extrinsic(&self, extrinsic: &[u8]) -> Result<ExtrinsicHash> {
        let encoded = format!("0x{}", hex::encode(extrinsic));
        let hash: String = self.call("author_submitExtrinsic", json!([encoded])).await?;
        let raw = hash.strip_prefix("0x").unwrap_or(&hash);
        let bytes = hex::decode(raw)
            .map_err(|e| Error::Schema(format!("invalid extrinsic hash {hash:?}: {e}")))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| Error::Schema(format!("extrinsic hash {hash:?} is not 32 bytes")))?;
        debug!(hash = %hash, "extrinsic accepted by node");
        Ok(ExtrinsicHash(bytes))
    }
}

#[derive(Deserialize)]
struct RpcReply<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Deserialize)]
struct RpcError {
    #[allow(dead_code)]
    code: i64,
    message: String,
}
