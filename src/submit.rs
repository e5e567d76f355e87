use serde::Serialize;
use tracing::info;

use crate::account::{AccountId, MultisigAccount};
use crate::call::{build_call, CallHash, EncodedCall, TransferIntent};
use crate::error::{Error, Result};
use crate::queue::Proposal;
use crate::rpc::{ChainRpc, ExtrinsicHash};

/// An opaque signing capability bound to one chain address. The engine
/// never sees key material.
pub trait Signer: Send + Sync {
    fn address(&self) -> AccountId;
    fn sign(&self, payload: &[u8]) -> Result<Signature>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Signature(pub Vec<u8>);

/// Which multisig extrinsic a submission turned into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionKind {
    /// First approval, opens the proposal and stores the call data.
    Proposed,
    /// Intermediate approval, references the call hash only.
    Approved,
    /// The approval that reaches the threshold; carries the call data and
    /// a weight bound so the chain executes atomically.
    FinalApproval,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Submission {
    pub kind: SubmissionKind,
    pub call_hash: CallHash,
    pub extrinsic_hash: ExtrinsicHash,
}

// Multisig pallet calls, bcs-encoded into the extrinsic body.
#[derive(Serialize)]
enum MultisigCall {
    AsMulti {
        threshold: u16,
        other_signatories: Vec<AccountId>,
        call: EncodedCall,
        max_weight: u64,
    },
    ApproveAsMulti {
        threshold: u16,
        other_signatories: Vec<AccountId>,
        call_hash: CallHash,
        max_weight: u64,
    },
}

#[derive(Serialize)]
struct Extrinsic {
    signer: AccountId,
    signature: Signature,
    call: MultisigCall,
}

/// Upper bound for the dispatch weight of an executed call: a flat
/// overhead plus a per-byte charge. The chain re-weighs on execution, so
/// the estimate only has to be stable and generous.
pub fn estimate_weight(call: &EncodedCall) -> u64 {
    const BASE_WEIGHT: u64 = 250_000_000;
    const WEIGHT_PER_BYTE: u64 = 1_000;
    BASE_WEIGHT + WEIGHT_PER_BYTE * call.as_bytes().len() as u64
}

/// Build and broadcast the extrinsic for a transfer intent: opens a new
/// proposal, or contributes this signer's approval to an existing one.
pub async fn submit_transfer(
    rpc: &dyn ChainRpc,
    account: &MultisigAccount,
    intent: &TransferIntent,
    existing: Option<&Proposal>,
    signer: &dyn Signer,
) -> Result<Submission> {
    let (call, call_hash) = build_call(intent)?;
    submit_call(rpc, account, call_hash, Some(call), existing, signer).await
}

/// Approve an already-proposed call hash. Call data is only needed for the
/// executing approval; when absent it is taken from the proposal record if
/// the indexer surfaced it.
pub async fn submit_approval(
    rpc: &dyn ChainRpc,
    account: &MultisigAccount,
    call_hash: CallHash,
    call_data: Option<EncodedCall>,
    existing: Option<&Proposal>,
    signer: &dyn Signer,
) -> Result<Submission> {
    let call_data = call_data.or_else(|| existing.and_then(|p| p.call_data.clone()));
    submit_call(rpc, account, call_hash, call_data, existing, signer).await
}

async fn submit_call(
    rpc: &dyn ChainRpc,
    account: &MultisigAccount,
    call_hash: CallHash,
    call_data: Option<EncodedCall>,
    existing: Option<&Proposal>,
    signer: &dyn Signer,
) -> Result<Submission> {
    let who = signer.address();
    if !account.is_signatory(&who) {
        return Err(Error::SignerUnavailable(who));
    }
    if let Some(proposal) = existing {
        if proposal.call_hash != call_hash {
            return Err(Error::InvalidIntent(format!(
                "proposal {} does not match call hash {call_hash}",
                proposal.call_hash
            )));
        }
        let status = proposal.status();
        if status.is_terminal() {
            return Err(Error::InvalidIntent(format!(
                "proposal {call_hash} is already {status}"
            )));
        }
        if proposal.has_approved(&who) {
            return Err(Error::InvalidIntent(format!(
                "{who} has already approved {call_hash}"
            )));
        }
    }
    if !rpc.account_exists(account.address()).await? {
        return Err(Error::AccountNotOnChain(*account.address()));
    }

    let other_signatories = account.other_signatories(&who)?;
    let threshold = account.threshold();
    let (kind, multisig_call) = match existing {
        None => {
            let call = call_data.ok_or_else(|| {
                Error::InvalidIntent("call data is required to open a proposal".into())
            })?;
            check_call_matches(&call, &call_hash)?;
            (
                SubmissionKind::Proposed,
                MultisigCall::AsMulti {
                    threshold,
                    other_signatories,
                    call,
                    max_weight: 0,
                },
            )
        }
        Some(proposal) if proposal.approvals.len() + 1 < usize::from(threshold) => (
            SubmissionKind::Approved,
            MultisigCall::ApproveAsMulti {
                threshold,
                other_signatories,
                call_hash,
                max_weight: 0,
            },
        ),
        Some(_) => {
            // this approval reaches the threshold; the chain executes the
            // call as part of the extrinsic, so it needs the full bytes
            let call = call_data.ok_or_else(|| {
                Error::InvalidIntent("call data is required for the executing approval".into())
            })?;
            check_call_matches(&call, &call_hash)?;
            let max_weight = estimate_weight(&call);
            (
                SubmissionKind::FinalApproval,
                MultisigCall::AsMulti {
                    threshold,
                    other_signatories,
                    call,
                    max_weight,
                },
            )
        }
    };

    let payload = bcs::to_bytes(&multisig_call)
        .map_err(|e| Error::InvalidIntent(format!("extrinsic encoding failed: {e}")))?;
    let signature = signer.sign(&payload)?;
    let extrinsic = bcs::to_bytes(&Extrinsic {
        signer: who,
        signature,
        call: multisig_call,
    })
    .map_err(|e| Error::InvalidIntent(format!("extrinsic encoding failed: {e}")))?;

    let extrinsic_hash = rpc.submit_extrinsic(&extrinsic).await?;
    info!(%call_hash, ?kind, %extrinsic_hash, "extrinsic broadcast");
    Ok(Submission {
        kind,
        call_hash,
        extrinsic_hash,
    })
}

fn check_call_matches(call: &EncodedCall, call_hash: &CallHash) -> Result<()> {
    if call.hash() != *call_hash {
        return Err(Error::InvalidIntent(format!(
            "call data does not hash to {call_hash}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Network;
    use crate::queue::ApprovalRecord;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn account_id(byte: u8) -> AccountId {
        AccountId([byte; 32])
    }

    fn multisig_2_of_3() -> MultisigAccount {
        MultisigAccount::new(vec![account_id(1), account_id(2), account_id(3)], 2).unwrap()
    }

    struct StubSigner(AccountId);

    impl Signer for StubSigner {
        fn address(&self) -> AccountId {
            self.0
        }

        fn sign(&self, payload: &[u8]) -> Result<Signature> {
            let mut bytes = self.0 .0.to_vec();
            bytes.extend_from_slice(payload);
            Ok(Signature(bytes))
        }
    }

    struct StubRpc {
        exists: bool,
        reject: Option<String>,
        submitted: Mutex<Vec<Vec<u8>>>,
    }

    impl StubRpc {
        fn new(exists: bool) -> Self {
            Self {
                exists,
                reject: None,
                submitted: Mutex::new(Vec::new()),
            }
        }

        fn rejecting(message: &str) -> Self {
            Self {
                exists: true,
                reject: Some(message.to_string()),
                submitted: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChainRpc for StubRpc {
        async fn account_exists(&self, _address: &AccountId) -> Result<bool> {
            Ok(self.exists)
        }

        async fn submit_extrinsic(&self, extrinsic: &[u8]) -> Result<ExtrinsicHash> {
            if let Some(message) = &self.reject {
                return Err(Error::SubmissionRejected(message.clone()));
            }
            self.submitted.lock().unwrap().push(extrinsic.to_vec());
            Ok(ExtrinsicHash(crate::account::blake2_256(extrinsic)))
        }
    }

    fn proposal_with_approvals(call_hash: CallHash, approvers: &[u8], threshold: u16) -> Proposal {
        Proposal {
            call_hash,
            call_data: None,
            multisig_address: account_id(99),
            network: Network::Polkadot,
            threshold,
            approvals: approvers
                .iter()
                .enumerate()
                .map(|(i, b)| ApprovalRecord {
                    signatory: account_id(*b),
                    timestamp: 100 + i as u64,
                })
                .collect(),
            created_at: 100,
            executed: false,
            cancelled: false,
        }
    }

    fn intent() -> TransferIntent {
        TransferIntent::keep_alive(account_id(50), 1_000)
    }

    #[tokio::test]
    async fn first_submission_opens_a_proposal() {
        let rpc = StubRpc::new(true);
        let submission = submit_transfer(
            &rpc,
            &multisig_2_of_3(),
            &intent(),
            None,
            &StubSigner(account_id(1)),
        )
        .await
        .unwrap();
        assert_eq!(submission.kind, SubmissionKind::Proposed);
        assert_eq!(rpc.submitted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn intermediate_approval_references_only_the_hash() {
        // 3-of-3 so the second approval is not yet the executing one
        let account =
            MultisigAccount::new(vec![account_id(1), account_id(2), account_id(3)], 3).unwrap();
        let (_, call_hash) = build_call(&intent()).unwrap();
        let existing = proposal_with_approvals(call_hash, &[1], 3);
        let submission = submit_approval(
            &StubRpc::new(true),
            &account,
            call_hash,
            None,
            Some(&existing),
            &StubSigner(account_id(2)),
        )
        .await
        .unwrap();
        assert_eq!(submission.kind, SubmissionKind::Approved);
    }

    #[tokio::test]
    async fn executing_approval_carries_call_data_and_weight() {
        let (call, call_hash) = build_call(&intent()).unwrap();
        let mut existing = proposal_with_approvals(call_hash, &[1], 2);
        existing.call_data = Some(call);
        let submission = submit_approval(
            &StubRpc::new(true),
            &multisig_2_of_3(),
            call_hash,
            None,
            Some(&existing),
            &StubSigner(account_id(2)),
        )
        .await
        .unwrap();
        assert_eq!(submission.kind, SubmissionKind::FinalApproval);
    }

    #[tokio::test]
    async fn executing_approval_without_call_data_is_rejected() {
        let (_, call_hash) = build_call(&intent()).unwrap();
        let existing = proposal_with_approvals(call_hash, &[1], 2);
        let result = submit_approval(
            &StubRpc::new(true),
            &multisig_2_of_3(),
            call_hash,
            None,
            Some(&existing),
            &StubSigner(account_id(2)),
        )
        .await;
        assert!(matches!(result, Err(Error::InvalidIntent(_))));
    }

    #[tokio::test]
    async fn non_signatory_cannot_submit() {
        let result = submit_transfer(
            &StubRpc::new(true),
            &multisig_2_of_3(),
            &intent(),
            None,
            &StubSigner(account_id(9)),
        )
        .await;
        assert!(matches!(result, Err(Error::SignerUnavailable(_))));
    }

    #[tokio::test]
    async fn missing_existential_deposit_is_surfaced() {
        let result = submit_transfer(
            &StubRpc::new(false),
            &multisig_2_of_3(),
            &intent(),
            None,
            &StubSigner(account_id(1)),
        )
        .await;
        assert!(matches!(result, Err(Error::AccountNotOnChain(_))));
    }

    #[tokio::test]
    async fn duplicate_approval_is_rejected() {
        let (_, call_hash) = build_call(&intent()).unwrap();
        let existing = proposal_with_approvals(call_hash, &[1], 2);
        let result = submit_approval(
            &StubRpc::new(true),
            &multisig_2_of_3(),
            call_hash,
            None,
            Some(&existing),
            &StubSigner(account_id(1)),
        )
        .await;
        assert!(matches!(result, Err(Error::InvalidIntent(_))));
    }

    #[tokio::test]
    async fn chain_rejection_reaches_the_caller_verbatim() {
        let result = submit_transfer(
            &StubRpc::rejecting("Inability to pay some fees"),
            &multisig_2_of_3(),
            &intent(),
            None,
            &StubSigner(account_id(1)),
        )
        .await;
        match result {
            Err(Error::SubmissionRejected(message)) => {
                assert_eq!(message, "Inability to pay some fees");
            }
            other => panic!("expected a rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn terminal_proposal_cannot_be_approved() {
        let (_, call_hash) = build_call(&intent()).unwrap();
        let mut existing = proposal_with_approvals(call_hash, &[1], 2);
        existing.executed = true;
        let result = submit_approval(
            &StubRpc::new(true),
            &multisig_2_of_3(),
            call_hash,
            None,
            Some(&existing),
            &StubSigner(account_id(2)),
        )
        .await;
        assert!(matches!(result, Err(Error::InvalidIntent(_))));
    }
}
