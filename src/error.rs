use thiserror::Error;

use crate::account::AccountId;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{endpoint} returned status {status}")]
    ApiStatus {
        endpoint: String,
        status: reqwest::StatusCode,
    },
    #[error("unexpected response schema: {0}")]
    Schema(String),
    #[error("invalid multisig configuration: {0}")]
    InvalidAccount(String),
    #[error("no signing capability for {0}")]
    SignerUnavailable(AccountId),
    #[error("multisig account {0} is not on chain; fund it above the existential deposit before submitting")]
    AccountNotOnChain(AccountId),
    #[error("invalid submission: {0}")]
    InvalidIntent(String),
    #[error("submission rejected by node: {0}")]
    SubmissionRejected(String),
}
