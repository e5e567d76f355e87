use blake2::digest::consts::U32;
use blake2::{Blake2b, Blake2b512, Digest};
use multisig_wallet_sdk::submit::Signature;
use multisig_wallet_sdk::{AccountId, Signer};

type Blake2b256 = Blake2b<U32>;

/// Deterministic signer derived from a passphrase. The signature is a keyed
/// hash, not a real curve signature, so it is only accepted by dev nodes
/// that skip signature verification.
pub struct DevSigner {
    seed: [u8; 32],
    address: AccountId,
}

impl DevSigner {
    pub fn from_phrase(phrase: &str) -> Self {
        let seed: [u8; 32] = Blake2b256::digest(phrase.as_bytes()).into();
        let address = AccountId::from_bytes(Blake2b256::digest(seed).into());
        Self { seed, address }
    }
}

impl Signer for DevSigner {
    fn address(&self) -> AccountId {
        self.address
    }

    fn sign(&self, payload: &[u8]) -> multisig_wallet_sdk::Result<Signature> {
        let mut hasher = Blake2b512::new();
        hasher.update(self.seed);
        hasher.update(payload);
        Ok(Signature(hasher.finalize().to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_phrase_same_address_and_signature() {
        let a = DevSigner::from_phrase("alice");
        let b = DevSigner::from_phrase("alice");
        assert_eq!(a.address(), b.address());
        assert_eq!(a.sign(b"payload").unwrap(), b.sign(b"payload").unwrap());
        assert_ne!(a.address(), DevSigner::from_phrase("bob").address());
    }
}
