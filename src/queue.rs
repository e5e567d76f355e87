use std::fmt;

use futures::future::join_all;
use serde::Serialize;
use serde_json::json;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::account::AccountId;
use crate::call::{CallHash, EncodedCall};
use crate::error::{Error, Result};
use crate::indexer::{CallEvent, CallIndexer, EventStatus, PendingEntry};
use crate::network::Network;
use crate::status::{derive_status, ProposalStatus};

/// Canonical record for one pending or settled multisig call.
///
/// Rebuilt from indexer data on every pass; snapshots handed out are never
/// mutated afterwards. Status is derived on read, not stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Proposal {
    pub call_hash: CallHash,
    pub call_data: Option<EncodedCall>,
    pub multisig_address: AccountId,
    pub network: Network,
    pub threshold: u16,
    /// One record per approving signatory, ordered by (timestamp, address).
    pub approvals: Vec<ApprovalRecord>,
    /// Timestamp of the earliest approval. The chain has no separate
    /// creation event: a call hash exists from its first approval.
    pub created_at: u64,
    pub executed: bool,
    pub cancelled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ApprovalRecord {
    pub signatory: AccountId,
    pub timestamp: u64,
}

impl Proposal {
    pub fn status(&self) -> ProposalStatus {
        derive_status(
            self.approvals.len(),
            self.threshold,
            self.executed,
            self.cancelled,
        )
    }

    pub fn approvers(&self) -> Vec<AccountId> {
        self.approvals.iter().map(|a| a.signatory).collect()
    }

    pub fn has_approved(&self, who: &AccountId) -> bool {
        self.approvals.iter().any(|a| a.signatory == *who)
    }

    pub fn latest_activity(&self) -> u64 {
        self.approvals
            .iter()
            .map(|a| a.timestamp)
            .max()
            .unwrap_or(self.created_at)
    }
}

impl fmt::Display for Proposal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match serde_json::to_value(self) {
            Ok(mut value) => {
                value["status"] = json!(self.status());
                match serde_json::to_string_pretty(&value) {
                    Ok(text) => write!(f, "{text}"),
                    Err(e) => write!(f, "<failed to serialize proposal: {e}>"),
                }
            }
            Err(e) => write!(f, "<failed to serialize proposal: {e}>"),
        }
    }
}

/// A detail fetch that failed; the rest of the pass is unaffected.
#[derive(Debug)]
pub struct EntryFailure {
    pub call_hash: CallHash,
    pub error: Error,
}

/// Outcome of one reconciliation pass. A cancelled pass is a valid outcome,
/// not an error.
#[derive(Debug)]
pub enum QueuePass {
    Completed {
        /// In indexer page order.
        proposals: Vec<Proposal>,
        failures: Vec<EntryFailure>,
    },
    Cancelled,
}

/// Fires the cancellation signal for an in-flight pass.
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Observed by a pass: once set, no further detail fetches start; in-flight
/// ones run to completion and their results are discarded.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// A signal that never fires, for callers without a cancel path.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }
}

pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelSignal { rx })
}

/// One reconciliation pass: list the requested page of pending calls, fan
/// out one detail fetch per entry, and assemble canonical proposals.
///
/// A failed detail fetch drops only its own entry, reported in
/// `failures`. Output order follows the page order regardless of fetch
/// completion order. Rerunning against an unchanged index yields identical
/// records.
pub async fn fetch_queue<I: CallIndexer + ?Sized>(
    indexer: &I,
    multisig_address: &AccountId,
    network: Network,
    page: u32,
    page_size: u32,
    cancel: &CancelSignal,
) -> Result<QueuePass> {
    if cancel.is_cancelled() {
        return Ok(QueuePass::Cancelled);
    }
    let entries = indexer.list_pending(multisig_address, page, page_size).await?;

    let fetches = entries.iter().map(|entry| {
        let cancel = cancel.clone();
        async move {
            if cancel.is_cancelled() {
                return None;
            }
            Some(indexer.call_detail(&entry.multi_id, &entry.call_hash).await)
        }
    });
    // join_all buffers by index, so completion order cannot reorder the page
    let details = join_all(fetches).await;

    if cancel.is_cancelled() {
        debug!(page, "pass cancelled, discarding results");
        return Ok(QueuePass::Cancelled);
    }

    let mut proposals = Vec::with_capacity(entries.len());
    let mut failures = Vec::new();
    for (entry, detail) in entries.iter().zip(details) {
        let events = match detail {
            Some(Ok(events)) => events,
            Some(Err(error)) => {
                warn!(call_hash = %entry.call_hash, %error, "dropping entry from pass");
                failures.push(EntryFailure {
                    call_hash: entry.call_hash,
                    error,
                });
                continue;
            }
            // a skipped fetch means the signal fired mid-pass
            None => return Ok(QueuePass::Cancelled),
        };
        match build_proposal(entry, &events, multisig_address, network) {
            Ok(proposal) => proposals.push(proposal),
            Err(error) => {
                warn!(call_hash = %entry.call_hash, %error, "dropping entry from pass");
                failures.push(EntryFailure {
                    call_hash: entry.call_hash,
                    error,
                });
            }
        }
    }
    Ok(QueuePass::Completed {
        proposals,
        failures,
    })
}

fn build_proposal(
    entry: &PendingEntry,
    events: &[CallEvent],
    multisig_address: &AccountId,
    network: Network,
) -> Result<Proposal> {
    // the detail stream carries every lifecycle event; only approval events
    // may contribute to the approver set and the creation time
    let mut approvals: Vec<ApprovalRecord> = events
        .iter()
        .filter(|e| e.status == EventStatus::Approval)
        .map(|e| ApprovalRecord {
            signatory: e.signatory,
            timestamp: e.timestamp,
        })
        .collect();
    // one approval per signatory, keeping the earliest
    approvals.sort_by_key(|a| (a.signatory, a.timestamp));
    approvals.dedup_by_key(|a| a.signatory);
    approvals.sort_by_key(|a| (a.timestamp, a.signatory));

    let created_at = match approvals.first() {
        Some(first) => first.timestamp,
        None => {
            return Err(Error::Schema(format!(
                "no approval events for {}",
                entry.call_hash
            )))
        }
    };
    Ok(Proposal {
        call_hash: entry.call_hash,
        call_data: entry.call_data.clone(),
        multisig_address: *multisig_address,
        network,
        threshold: entry.threshold,
        approvals,
        created_at,
        executed: events.iter().any(|e| e.status == EventStatus::Executed),
        cancelled: events.iter().any(|e| e.status == EventStatus::Cancelled),
    })
}
