use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::account::AccountId;
use crate::call::{CallHash, EncodedCall};
use crate::error::{Error, Result};

pub const DEFAULT_PAGE_SIZE: u32 = 10;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

// indexer-side status markers
const STATUS_APPROVAL: &str = "Approval";
const STATUS_EXECUTED: &str = "Executed";
const STATUS_CANCELLED: &str = "Cancelled";

/// A pending multisig call as reported by the list endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEntry {
    pub multi_id: String,
    pub call_hash: CallHash,
    pub threshold: u16,
    /// Present once some approver has supplied the full call bytes.
    pub call_data: Option<EncodedCall>,
}

/// One lifecycle event for a call hash: who did what, when.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallEvent {
    pub timestamp: u64,
    pub status: EventStatus,
    pub signatory: AccountId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventStatus {
    Approval,
    Executed,
    Cancelled,
    Other(String),
}

impl EventStatus {
    fn parse(s: &str) -> Self {
        match s {
            STATUS_APPROVAL => EventStatus::Approval,
            STATUS_EXECUTED => EventStatus::Executed,
            STATUS_CANCELLED => EventStatus::Cancelled,
            other => EventStatus::Other(other.to_string()),
        }
    }
}

/// The call-indexing service boundary. The aggregator only ever talks to
/// this trait, so passes can run against an in-memory index in tests.
#[async_trait]
pub trait CallIndexer: Send + Sync {
    /// Entries awaiting approval for `account`. `page` is 1-indexed here;
    /// the wire speaks 0-indexed pages.
    async fn list_pending(
        &self,
        account: &AccountId,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<PendingEntry>>;

    /// All lifecycle events recorded for one call hash, in no particular
    /// order.
    async fn call_detail(&self, multi_id: &str, call_hash: &CallHash) -> Result<Vec<CallEvent>>;
}

/// HTTP client for a Subscan-compatible call index.
#[derive(Debug, Clone)]
pub struct SubscanClient {
    base_url: String,
    api_key: Option<String>,
    address_prefix: u16,
    http: reqwest::Client,
    request_timeout: Duration,
}

impl SubscanClient {
    pub fn new(base_url: impl Into<String>, address_prefix: u16) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            address_prefix,
            http: reqwest::Client::new(),
            request_timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<Option<T>> {
        let url = self.endpoint(path);
        let mut request = self
            .http
            .post(&url)
            .timeout(self.request_timeout)
            .json(body);
        if let Some(key) = &self.api_key {
            request = request.header("X-API-Key", key);
        }
        let response = request.send().await.map_err(|source| Error::Transport {
            endpoint: url.clone(),
            source,
        })?;
        if !response.status().is_success() {
            return Err(Error::ApiStatus {
                endpoint: url,
                status: response.status(),
            });
        }
        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| Error::Schema(format!("invalid response from {url}: {e}")))?;
        if envelope.code != 0 {
            return Err(Error::Schema(format!(
                "indexer error {} from {url}: {}",
                envelope.code, envelope.message
            )));
        }
        Ok(envelope.data)
    }
}

#[async_trait]
impl CallIndexer for SubscanClient {
    async fn list_pending(
        &self,
        account: &AccountId,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<PendingEntry>> {
        let body = ListRequest {
            row: page_size,
            page: wire_page(page),
            account: account.to_ss58(self.address_prefix),
        };
        let data: Option<ListData> = self.post("/api/scan/multisigs", &body).await?;
        let raw = data.and_then(|d| d.multisig).unwrap_or_default();
        let entries = pending_entries(raw)?;
        debug!(account = %body.account, page, entries = entries.len(), "listed pending calls");
        Ok(entries)
    }

    async fn call_detail(&self, multi_id: &str, call_hash: &CallHash) -> Result<Vec<CallEvent>> {
        let body = DetailRequest {
            multi_id,
            call_hash: call_hash.to_string(),
        };
        let data: Option<DetailData> = self.post("/api/scan/multisig", &body).await?;
        let raw = data.and_then(|d| d.process).unwrap_or_default();
        let events = call_events(raw)?;
        debug!(%call_hash, events = events.len(), "fetched call detail");
        Ok(events)
    }
}

/// Callers ask for page 1 and up; the indexer counts from 0.
fn wire_page(page: u32) -> u32 {
    page.saturating_sub(1)
}

fn pending_entries(raw: Vec<RawPendingEntry>) -> Result<Vec<PendingEntry>> {
    raw.into_iter()
        // the list endpoint reports every known call; only those still
        // awaiting approval belong in the queue
        .filter(|entry| entry.status == STATUS_APPROVAL)
        .map(|entry| {
            Ok(PendingEntry {
                call_hash: entry.call_hash.parse()?,
                call_data: entry
                    .call_data
                    .as_deref()
                    .map(EncodedCall::from_hex)
                    .transpose()?,
                multi_id: entry.multi_id,
                threshold: entry.threshold,
            })
        })
        .collect()
}

fn call_events(raw: Vec<RawCallEvent>) -> Result<Vec<CallEvent>> {
    raw.into_iter()
        .map(|event| {
            Ok(CallEvent {
                timestamp: event.timestamp,
                status: EventStatus::parse(&event.status),
                signatory: event.account_display.address.parse()?,
            })
        })
        .collect()
}

// === Wire types ===

#[derive(Serialize)]
struct ListRequest {
    row: u32,
    page: u32,
    account: String,
}

#[derive(Serialize)]
struct DetailRequest<'a> {
    multi_id: &'a str,
    call_hash: String,
}

#[derive(Deserialize)]
struct Envelope<T> {
    code: i64,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

#[derive(Deserialize)]
struct ListData {
    multisig: Option<Vec<RawPendingEntry>>,
}

#[derive(Deserialize)]
struct RawPendingEntry {
    multi_id: String,
    call_hash: String,
    status: String,
    threshold: u16,
    #[serde(default)]
    call_data: Option<String>,
}

#[derive(Deserialize)]
struct DetailData {
    process: Option<Vec<RawCallEvent>>,
}

#[derive(Deserialize)]
struct RawCallEvent {
    timestamp: u64,
    status: String,
    account_display: RawAccountDisplay,
}

#[derive(Deserialize)]
struct RawAccountDisplay {
    address: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::GENERIC_ADDRESS_PREFIX;

    #[test]
    fn caller_pages_are_one_indexed() {
        assert_eq!(wire_page(1), 0);
        assert_eq!(wire_page(2), 1);
        assert_eq!(wire_page(0), 0);
    }

    #[test]
    fn only_entries_awaiting_approval_are_kept() {
        let hash = |b: u8| CallHash([b; 32]).to_string();
        let raw = vec![
            RawPendingEntry {
                multi_id: "m1".into(),
                call_hash: hash(1),
                status: "Approval".into(),
                threshold: 2,
                call_data: None,
            },
            RawPendingEntry {
                multi_id: "m2".into(),
                call_hash: hash(2),
                status: "Executed".into(),
                threshold: 2,
                call_data: None,
            },
            RawPendingEntry {
                multi_id: "m3".into(),
                call_hash: hash(3),
                status: "Cancelled".into(),
                threshold: 2,
                call_data: Some("0x0001".into()),
            },
        ];
        let entries = pending_entries(raw).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].multi_id, "m1");
        assert_eq!(entries[0].call_hash, CallHash([1; 32]));
    }

    #[test]
    fn malformed_call_hash_is_a_schema_error() {
        let raw = vec![RawPendingEntry {
            multi_id: "m1".into(),
            call_hash: "0xnothex".into(),
            status: "Approval".into(),
            threshold: 2,
            call_data: None,
        }];
        assert!(matches!(pending_entries(raw), Err(Error::Schema(_))));
    }

    #[test]
    fn detail_events_parse_statuses_and_addresses() {
        let signer = AccountId([5; 32]);
        let raw = vec![
            RawCallEvent {
                timestamp: 100,
                status: "Approval".into(),
                account_display: RawAccountDisplay {
                    address: signer.to_ss58(GENERIC_ADDRESS_PREFIX),
                },
            },
            RawCallEvent {
                timestamp: 200,
                status: "Executed".into(),
                account_display: RawAccountDisplay {
                    address: signer.to_ss58(GENERIC_ADDRESS_PREFIX),
                },
            },
            RawCallEvent {
                timestamp: 300,
                status: "Pending".into(),
                account_display: RawAccountDisplay {
                    address: signer.to_ss58(GENERIC_ADDRESS_PREFIX),
                },
            },
        ];
        let events = call_events(raw).unwrap();
        assert_eq!(events[0].status, EventStatus::Approval);
        assert_eq!(events[0].signatory, signer);
        assert_eq!(events[1].status, EventStatus::Executed);
        assert_eq!(events[2].status, EventStatus::Other("Pending".into()));
    }

    #[test]
    fn envelope_with_error_code_is_rejected() {
        let json = r#"{"code": 10001, "message": "invalid key", "data": null}"#;
        let envelope: Envelope<ListData> = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.code, 10001);
        assert_eq!(envelope.message, "invalid key");
        assert!(envelope.data.is_none());
    }

    #[test]
    fn list_response_parses_from_wire_shape() {
        let json = format!(
            r#"{{
                "code": 0,
                "message": "Success",
                "data": {{
                    "multisig": [
                        {{
                            "multi_id": "abc",
                            "call_hash": "{}",
                            "status": "Approval",
                            "threshold": 3,
                            "call_data": "0x00010203"
                        }}
                    ]
                }}
            }}"#,
            CallHash([9; 32])
        );
        let envelope: Envelope<ListData> = serde_json::from_str(&json).unwrap();
        let entries = pending_entries(envelope.data.unwrap().multisig.unwrap()).unwrap();
        assert_eq!(entries[0].threshold, 3);
        assert_eq!(
            entries[0].call_data.as_ref().unwrap().as_bytes(),
            &[0, 1, 2, 3]
        );
    }
}
