//! Recovery of the wallet address that signed a message.

use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use sha3::{Digest, Keccak256};

use crate::error::{Error, Result};
use crate::model::common::Address;

/// Recover the address that produced `signature` over `message`.
pub trait SignatureRecovery: Send + Sync {
    fn recover(&self, message: &str, signature: &[u8]) -> Result<Address>;
}

/// EIP-191 `personal_sign` over secp256k1, as produced by browser wallets.
#[derive(Debug, Default, Clone, Copy)]
pub struct PersonalSign;

impl PersonalSign {
    /// Length of an `r || s || v` signature.
    pub const SIGNATURE_LEN: usize = 65;

    /// The digest a wallet actually signs for `message`.
    pub fn digest(message: &str) -> [u8; 32] {
        let mut hasher = Keccak256::new();
        hasher.update(format!("\x19Ethereum Signed Message:\n{}", message.len()));
        hasher.update(message);
        let mut digest = [0; 32];
        digest.copy_from_slice(&hasher.finalize());
        digest
    }

    pub fn address_of(key: &VerifyingKey) -> Address {
        let point = key.to_encoded_point(false);
        let hash = Keccak256::digest(&point.as_bytes()[1..]);
        let mut address = [0; Address::LEN];
        address.copy_from_slice(&hash[hash.len() - Address::LEN..]);
        Address::from_bytes(address)
    }
}

impl SignatureRecovery for PersonalSign {
    fn recover(&self, message: &str, signature: &[u8]) -> Result<Address> {
        if signature.len() != Self::SIGNATURE_LEN {
            return Err(Error::InvalidSignature(format!(
                "expected {} bytes, found {}",
                Self::SIGNATURE_LEN,
                signature.len()
            )));
        }
        let (rs, v) = signature.split_at(64);
        let v = match v[0] {
            v @ (0 | 1) => v,
            v @ (27 | 28) => v - 27,
            v => return Err(Error::InvalidSignature(format!("bad recovery byte {v}"))),
        };
        let mut recovery_id = RecoveryId::from_byte(v)
            .ok_or_else(|| Error::InvalidSignature(format!("bad recovery byte {v}")))?;
        let mut signature =
            Signature::from_slice(rs).map_err(|e| Error::InvalidSignature(e.to_string()))?;
        // Recovery only accepts low-s signatures; flip the parity to match.
        if let Some(normalized) = signature.normalize_s() {
            signature = normalized;
            recovery_id = RecoveryId::new(!recovery_id.is_y_odd(), recovery_id.is_x_reduced());
        }

        let key = VerifyingKey::recover_from_prehash(&Self::digest(message), &signature, recovery_id)
            .map_err(|e| Error::InvalidSignature(e.to_string()))?;
        Ok(Self::address_of(&key))
    }
}

/// Test wallets.
#[cfg(test)]
pub(crate) mod wallet {
    use k256::ecdsa::SigningKey;

    use super::PersonalSign;
    use crate::model::common::Address;

    pub struct Wallet(SigningKey);

    impl Wallet {
        pub fn from_hex(key: &str) -> Self {
            let bytes = data_encoding::HEXLOWER_PERMISSIVE
                .decode(key.trim_start_matches("0x").as_bytes())
                .unwrap();
            Self(SigningKey::from_slice(&bytes).unwrap())
        }

        pub fn address(&self) -> Address {
            PersonalSign::address_of(self.0.verifying_key())
        }

        /// `personal_sign`, with `v` in the 27/28 form wallets emit.
        pub fn sign(&self, message: &str) -> Vec<u8> {
            let (signature, recovery_id) = self
                .0
                .sign_prehash_recoverable(&PersonalSign::digest(message))
                .unwrap();
            let mut bytes = signature.to_bytes().to_vec();
            bytes.push(recovery_id.to_byte() + 27);
            bytes
        }
    }
}
