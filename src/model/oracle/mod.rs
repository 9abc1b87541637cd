//! The boundary to the Confidential Compute Oracle.
//!
//! The ledger never looks inside a ciphertext: it only passes opaque handles
//! and byte blobs to these traits. [`ComputeOracle`] is the synchronous view the
//! ledger uses inside a transaction, [`DecryptionOracle`] is the asynchronous
//! public-decryption entry point used by the relay.

use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;

use data_encoding::{HEXLOWER, HEXLOWER_PERMISSIVE};
use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::model::common::{election::VoteCount, Address, HexBytes};

mod http;
mod local;

pub use http::HttpOracle;
pub use local::LocalOracle;

/// Opaque identifier of a ciphertext held by the oracle.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId([u8; HandleId::LEN]);

impl HandleId {
    pub const LEN: usize = 32;

    pub const fn from_bytes(bytes: [u8; Self::LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; Self::LEN] {
        &self.0
    }
}

impl Display for HandleId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", HEXLOWER.encode(&self.0))
    }
}

impl Debug for HandleId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "HandleId({self})")
    }
}

impl FromStr for HandleId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.strip_prefix("0x").unwrap_or(s);
        let bytes = HEXLOWER_PERMISSIVE
            .decode(hex.as_bytes())
            .map_err(|e| e.to_string())?;
        let bytes: [u8; Self::LEN] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| format!("handle must be {} bytes, found {}", Self::LEN, b.len()))?;
        Ok(Self(bytes))
    }
}

impl Serialize for HandleId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for HandleId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

/// An encrypted value living inside the oracle, e.g. a running tally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accumulator(HandleId);

impl Accumulator {
    pub fn new(handle: HandleId) -> Self {
        Self(handle)
    }

    pub fn handle(&self) -> HandleId {
        self.0
    }
}

/// A ciphertext produced off-ledger, together with the proof that it is well formed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedInput {
    pub ciphertext: HexBytes,
    pub input_proof: HexBytes,
}

/// The result of a public decryption: the cleartext and the proof that it is correct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decryption {
    pub cleartext: HexBytes,
    pub proof: HexBytes,
}

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("input proof rejected")]
    InvalidInputProof,
    #[error("input proof does not show an encrypted zero")]
    NotZero,
    #[error("unknown handle {0}")]
    UnknownHandle(HandleId),
    #[error("handle {0} is not publicly decryptable")]
    NotPubliclyDecryptable(HandleId),
    #[error("decryption proof does not certify the given handles and cleartext")]
    InvalidDecryptionProof,
    #[error("oracle request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("oracle returned an unexpected response: {0}")]
    Protocol(String),
}

impl OracleError {
    /// Did the oracle refuse the request (as opposed to being unreachable)?
    pub fn is_rejection(&self) -> bool {
        !matches!(self, Self::Transport(_) | Self::Protocol(_))
    }
}

/// Homomorphic operations and access control, as seen from inside a ledger transaction.
pub trait ComputeOracle: Send + Sync {
    /// Verify an externally produced ciphertext and bring it under oracle management.
    fn ingest(&self, input: &EncryptedInput) -> Result<Accumulator, OracleError>;

    /// As [`Self::ingest`], for inputs whose proof must also show the value is zero.
    fn ingest_zero(&self, input: &EncryptedInput) -> Result<Accumulator, OracleError>;

    /// Homomorphically add two encrypted values, producing a new one.
    fn add(&self, lhs: &Accumulator, rhs: &Accumulator) -> Result<Accumulator, OracleError>;

    /// Grant `principal` the right to request decryption of `value`.
    fn allow(&self, value: &Accumulator, principal: &Address) -> Result<(), OracleError>;

    /// Irrevocably allow anyone to publicly decrypt `value`.
    fn make_publicly_decryptable(&self, value: &Accumulator) -> Result<Accumulator, OracleError>;

    fn to_handle_id(&self, value: &Accumulator) -> HandleId {
        value.handle()
    }

    /// Succeeds iff `proof` certifies that `handles` decrypt to exactly `cleartext`.
    fn verify_decryption(
        &self,
        handles: &[HandleId],
        cleartext: &[u8],
        proof: &[u8],
    ) -> Result<(), OracleError>;
}

/// The public decryption entry point.
#[rocket::async_trait]
pub trait DecryptionOracle: Send + Sync {
    async fn public_decrypt(&self, handle: &HandleId) -> Result<Decryption, OracleError>;
}

/// Width of an ABI-encoded word.
const WORD: usize = 32;

/// ABI-encode a count as a single `uint32` word.
pub fn encode_count(count: VoteCount) -> Vec<u8> {
    let mut word = vec![0; WORD];
    word[WORD - 4..].copy_from_slice(&count.to_be_bytes());
    word
}

/// Decode a single ABI-encoded `uint32` word. Returns `None` for anything else.
pub fn decode_count(cleartext: &[u8]) -> Option<VoteCount> {
    if cleartext.len() != WORD || cleartext[..WORD - 4].iter().any(|b| *b != 0) {
        return None;
    }
    let mut be = [0; 4];
    be.copy_from_slice(&cleartext[WORD - 4..]);
    Some(VoteCount::from_be_bytes(be))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_encoding() {
        let encoded = encode_count(258);
        assert_eq!(encoded.len(), 32);
        assert_eq!(&encoded[28..], &[0, 0, 1, 2]);
        assert_eq!(decode_count(&encoded), Some(258));
    }

    #[test]
    fn count_decoding_rejects_other_shapes() {
        assert_eq!(decode_count(&[0, 0, 0, 1]), None);
        let mut too_big = encode_count(1);
        too_big[0] = 1;
        assert_eq!(decode_count(&too_big), None);
        assert_eq!(decode_count(&[0; 64]), None);
    }

    #[test]
    fn handle_round_trips_through_json() {
        let handle = HandleId::from_bytes([7; 32]);
        let json = rocket::serde::json::serde_json::to_string(&handle).unwrap();
        assert_eq!(json, format!("\"0x{}\"", "07".repeat(32)));
        let parsed: HandleId = rocket::serde::json::serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, handle);
    }
}
