use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::account::{blake2_256, AccountId};
use crate::error::{Error, Result};

/// Content hash of an encoded call; the identity of a proposal.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallHash(pub [u8; 32]);

impl fmt::Display for CallHash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for CallHash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "CallHash({self})")
    }
}

impl FromStr for CallHash {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let raw = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(raw)
            .map_err(|e| Error::Schema(format!("invalid call hash {s:?}: {e}")))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| Error::Schema(format!("call hash {s:?} is not 32 bytes")))?;
        Ok(Self(bytes))
    }
}

impl Serialize for CallHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_string())
        } else {
            self.0.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for CallHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            s.parse().map_err(D::Error::custom)
        } else {
            Ok(Self(<[u8; 32]>::deserialize(deserializer)?))
        }
    }
}

/// Fully encoded call bytes, as broadcast on chain and as surfaced by the
/// indexer once some approver has supplied them.
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedCall(Vec<u8>);

impl EncodedCall {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let raw = s.strip_prefix("0x").unwrap_or(s);
        Ok(Self(hex::decode(raw).map_err(|e| {
            Error::Schema(format!("invalid call data {s:?}: {e}"))
        })?))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn hash(&self) -> CallHash {
        CallHash(blake2_256(&self.0))
    }
}

impl fmt::Display for EncodedCall {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "0x{}", hex::encode(&self.0))
    }
}

impl fmt::Debug for EncodedCall {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "EncodedCall({self})")
    }
}

impl Serialize for EncodedCall {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_string())
        } else {
            self.0.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for EncodedCall {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            Self::from_hex(&s).map_err(D::Error::custom)
        } else {
            Ok(Self(Vec::<u8>::deserialize(deserializer)?))
        }
    }
}

/// What the user wants the multisig to do: move `amount` to `recipient`.
/// With `keep_alive` set the transfer fails rather than reaping the sender
/// below the existential deposit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferIntent {
    pub recipient: AccountId,
    pub amount: u128,
    pub keep_alive: bool,
}

impl TransferIntent {
    pub fn keep_alive(recipient: AccountId, amount: u128) -> Self {
        Self {
            recipient,
            amount,
            keep_alive: true,
        }
    }

    pub fn allow_death(recipient: AccountId, amount: u128) -> Self {
        Self {
            recipient,
            amount,
            keep_alive: false,
        }
    }
}

// The canonical call encoding. Variant indices are part of the bytes, so
// reordering variants changes every hash.
#[derive(Serialize)]
enum RuntimeCall {
    Balances(BalancesCall),
}

#[derive(Serialize)]
enum BalancesCall {
    Transfer { dest: AccountId, value: u128 },
    TransferKeepAlive { dest: AccountId, value: u128 },
}

/// Encode an intent into its canonical call bytes and content hash.
///
/// Byte-stable: two signatories independently building the same intent get
/// the same hash and therefore converge on one proposal. Nothing
/// non-deterministic may enter the encoded payload.
pub fn build_call(intent: &TransferIntent) -> Result<(EncodedCall, CallHash)> {
    if intent.amount == 0 {
        return Err(Error::InvalidIntent("transfer amount must be non-zero".into()));
    }
    let call = if intent.keep_alive {
        BalancesCall::TransferKeepAlive {
            dest: intent.recipient,
            value: intent.amount,
        }
    } else {
        BalancesCall::Transfer {
            dest: intent.recipient,
            value: intent.amount,
        }
    };
    let bytes = bcs::to_bytes(&RuntimeCall::Balances(call))
        .map_err(|e| Error::InvalidIntent(format!("call encoding failed: {e}")))?;
    let encoded = EncodedCall(bytes);
    let hash = encoded.hash();
    Ok((encoded, hash))
}
