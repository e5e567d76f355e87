pub mod account;
pub mod call;
pub mod error;
pub mod indexer;
pub mod network;
pub mod queue;
pub mod rpc;
pub mod status;
pub mod submit;

use std::sync::Arc;

pub use crate::account::{AccountId, MultisigAccount};
pub use crate::call::{CallHash, EncodedCall, TransferIntent};
pub use crate::error::{Error, Result};
pub use crate::network::{ChainProperties, Network};
pub use crate::queue::{cancel_pair, CancelSignal, Proposal, QueuePass};
pub use crate::status::ProposalStatus;
pub use crate::submit::{Signer, Submission};

use crate::call::build_call;
use crate::indexer::{SubscanClient, DEFAULT_PAGE_SIZE};
use crate::rpc::JsonRpcClient;

// a call hash not found within this many pages is treated as not yet indexed
const MAX_LOOKUP_PAGES: u32 = 10;

/// Front door of the SDK: one instance per network, owning the indexer and
/// node clients. Holds no per-pass state; every queue read is rebuilt from
/// source data.
pub struct WalletClient {
    network: Network,
    indexer: Arc<SubscanClient>,
    rpc: Arc<JsonRpcClient>,
}

impl WalletClient {
    // === Constructors ===

    pub fn new_polkadot() -> Self {
        Self::new(Network::Polkadot)
    }

    pub fn new_kusama() -> Self {
        Self::new(Network::Kusama)
    }

    pub fn new(network: Network) -> Self {
        let props = network.properties();
        Self {
            network,
            indexer: Arc::new(SubscanClient::new(props.indexer_url, props.address_prefix)),
            rpc: Arc::new(JsonRpcClient::new(
                props.rpc_url,
                props.address_prefix,
                props.existential_deposit,
            )),
        }
    }

    /// Point the client at self-hosted services, e.g. a local indexer.
    pub fn new_with_endpoints(
        network: Network,
        indexer_url: &str,
        rpc_url: &str,
        api_key: Option<String>,
    ) -> Self {
        let props = network.properties();
        let mut indexer = SubscanClient::new(indexer_url, props.address_prefix);
        if let Some(key) = api_key {
            indexer = indexer.with_api_key(key);
        }
        Self {
            network,
            indexer: Arc::new(indexer),
            rpc: Arc::new(JsonRpcClient::new(
                rpc_url,
                props.address_prefix,
                props.existential_deposit,
            )),
        }
    }

    // === Queue ===

    /// One reconciliation pass over the requested page of the pending queue.
    pub async fn pending_queue(
        &self,
        multisig_address: &AccountId,
        page: u32,
        page_size: u32,
        cancel: &CancelSignal,
    ) -> Result<QueuePass> {
        queue::fetch_queue(
            self.indexer.as_ref(),
            multisig_address,
            self.network,
            page,
            page_size,
            cancel,
        )
        .await
    }

    /// Look up the live proposal for a call hash, if the indexer already
    /// shows one. A just-broadcast submission may not be visible yet; the
    /// indexer lags the chain and this read must not be treated as
    /// read-after-write.
    pub async fn find_proposal(
        &self,
        multisig_address: &AccountId,
        call_hash: &CallHash,
    ) -> Result<Option<Proposal>> {
        for page in 1..=MAX_LOOKUP_PAGES {
            let pass = self
                .pending_queue(
                    multisig_address,
                    page,
                    DEFAULT_PAGE_SIZE,
                    &CancelSignal::never(),
                )
                .await?;
            let QueuePass::Completed {
                proposals,
                mut failures,
            } = pass
            else {
                return Ok(None);
            };
            if let Some(found) = proposals.iter().find(|p| p.call_hash == *call_hash) {
                return Ok(Some(found.clone()));
            }
            // if the entry we are after is the one that failed, say so
            // instead of pretending it does not exist
            if let Some(at) = failures.iter().position(|f| f.call_hash == *call_hash) {
                return Err(failures.swap_remove(at).error);
            }
            if proposals.is_empty() && failures.is_empty() {
                return Ok(None);
            }
        }
        Ok(None)
    }

    // === Submission ===

    /// Build the transfer call and broadcast this signer's approval for it,
    /// opening the proposal if the indexer does not show one yet.
    pub async fn send_transfer(
        &self,
        account: &MultisigAccount,
        intent: &TransferIntent,
        signer: &dyn Signer,
    ) -> Result<Submission> {
        let (_, call_hash) = build_call(intent)?;
        let existing = self.find_proposal(account.address(), &call_hash).await?;
        submit::submit_transfer(self.rpc.as_ref(), account, intent, existing.as_ref(), signer).await
    }

    /// Approve an existing call hash. `call_data` is only needed when this
    /// approval reaches the threshold and the indexer never surfaced the
    /// bytes.
    pub async fn approve(
        &self,
        account: &MultisigAccount,
        call_hash: CallHash,
        call_data: Option<EncodedCall>,
        signer: &dyn Signer,
    ) -> Result<Submission> {
        let existing = self.find_proposal(account.address(), &call_hash).await?;
        submit::submit_approval(
            self.rpc.as_ref(),
            account,
            call_hash,
            call_data,
            existing.as_ref(),
            signer,
        )
        .await
    }

    // === Getters ===

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn properties(&self) -> ChainProperties {
        self.network.properties()
    }

    pub fn indexer(&self) -> &SubscanClient {
        &self.indexer
    }

    pub fn rpc(&self) -> &JsonRpcClient {
        &self.rpc
    }
}
