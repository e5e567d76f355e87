use std::fmt;
use std::str::FromStr;

use blake2::digest::consts::U32;
use blake2::{Blake2b, Blake2b512, Digest};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// Prefix used when rendering an address without a network context.
pub const GENERIC_ADDRESS_PREFIX: u16 = 42;

const SS58_CHECKSUM_CONTEXT: &[u8] = b"SS58PRE";
const MULTI_ACCOUNT_TAG: &[u8] = b"modlpy/utilisuba";

type Blake2b256 = Blake2b<U32>;

pub(crate) fn blake2_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// 32-byte chain account identifier.
///
/// Text form is SS58; binary form (used in extrinsic encoding and hashing)
/// is the raw 32 bytes.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AccountId(pub [u8; 32]);

impl AccountId {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_ss58(&self, prefix: u16) -> String {
        let mut data = Vec::with_capacity(35);
        if prefix < 64 {
            data.push(prefix as u8);
        } else {
            // two-byte form for prefixes 64..=16383
            data.push(((prefix & 0b0000_0000_1111_1100) >> 2) as u8 | 0b0100_0000);
            data.push((prefix >> 8) as u8 | ((prefix & 0b0000_0000_0000_0011) << 6) as u8);
        }
        data.extend_from_slice(&self.0);
        let checksum = ss58_checksum(&data);
        data.extend_from_slice(&checksum[..2]);
        bs58::encode(data).into_string()
    }

    pub fn from_ss58(s: &str) -> Result<Self> {
        let data = bs58::decode(s)
            .into_vec()
            .map_err(|e| Error::Schema(format!("invalid base58 address {s:?}: {e}")))?;
        let prefix_len = match data.first() {
            Some(b) if *b < 64 => 1,
            Some(b) if *b < 128 => 2,
            _ => return Err(Error::Schema(format!("invalid address prefix in {s:?}"))),
        };
        if data.len() != prefix_len + 32 + 2 {
            return Err(Error::Schema(format!("invalid address length in {s:?}")));
        }
        let (body, checksum) = data.split_at(data.len() - 2);
        let expected = ss58_checksum(body);
        if checksum != &expected[..2] {
            return Err(Error::Schema(format!("address checksum mismatch in {s:?}")));
        }
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&body[prefix_len..]);
        Ok(Self(bytes))
    }
}

fn ss58_checksum(data: &[u8]) -> [u8; 64] {
    let mut hasher = Blake2b512::new();
    hasher.update(SS58_CHECKSUM_CONTEXT);
    hasher.update(data);
    hasher.finalize().into()
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_ss58(GENERIC_ADDRESS_PREFIX))
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "AccountId({self})")
    }
}

impl FromStr for AccountId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_ss58(s)
    }
}

impl Serialize for AccountId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_string())
        } else {
            self.0.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for AccountId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            Self::from_ss58(&s).map_err(D::Error::custom)
        } else {
            Ok(Self(<[u8; 32]>::deserialize(deserializer)?))
        }
    }
}

/// A threshold account jointly controlled by a fixed signatory set.
///
/// The address is a pure function of the sorted signatories and the
/// threshold; the fields are private so the three can never drift apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultisigAccount {
    address: AccountId,
    signatories: Vec<AccountId>,
    threshold: u16,
}

impl MultisigAccount {
    pub fn new(mut signatories: Vec<AccountId>, threshold: u16) -> Result<Self> {
        signatories.sort();
        signatories.dedup();
        if signatories.len() < 2 {
            return Err(Error::InvalidAccount(
                "at least 2 distinct signatories are required".into(),
            ));
        }
        if threshold < 2 || usize::from(threshold) > signatories.len() {
            return Err(Error::InvalidAccount(format!(
                "threshold must be between 2 and {}, got {threshold}",
                signatories.len()
            )));
        }
        let address = multi_account_id(&signatories, threshold);
        Ok(Self {
            address,
            signatories,
            threshold,
        })
    }

    pub fn address(&self) -> &AccountId {
        &self.address
    }

    pub fn signatories(&self) -> &[AccountId] {
        &self.signatories
    }

    pub fn threshold(&self) -> u16 {
        self.threshold
    }

    pub fn is_signatory(&self, who: &AccountId) -> bool {
        self.signatories.binary_search(who).is_ok()
    }

    /// The sorted signatory set minus `who`, as the multisig extrinsics
    /// expect it.
    pub fn other_signatories(&self, who: &AccountId) -> Result<Vec<AccountId>> {
        if !self.is_signatory(who) {
            return Err(Error::SignerUnavailable(*who));
        }
        Ok(self
            .signatories
            .iter()
            .filter(|s| *s != who)
            .copied()
            .collect())
    }
}

/// Deterministic multisig address: blake2b-256 over the chain's
/// multi-account tag, the sorted signatory set and the threshold.
fn multi_account_id(sorted_signatories: &[AccountId], threshold: u16) -> AccountId {
    let encoded = bcs::to_bytes(&(sorted_signatories, threshold))
        .expect("encoding account ids and a threshold cannot fail");
    let mut hasher = Blake2b256::new();
    hasher.update(MULTI_ACCOUNT_TAG);
    hasher.update(&encoded);
    AccountId(hasher.finalize().into())
}
