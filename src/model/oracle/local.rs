//! A development oracle that keeps values in the clear.
//!
//! It exists so the server and its tests can run without a confidential
//! compute network. Values are stored as plaintext counters behind random
//! handles, and proofs are HMAC-SHA256 tags keyed by the configured secret.
//! The capability rules match a real oracle: only inputs it issued can be
//! ingested, only handles marked public can be decrypted, and a decryption
//! proof only verifies for the exact handles and cleartext it was made for.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha256;

use crate::model::common::{election::VoteCount, Address, HexBytes};

use super::{
    encode_count, Accumulator, ComputeOracle, Decryption, DecryptionOracle, EncryptedInput,
    HandleId, OracleError,
};

type HmacSha256 = Hmac<Sha256>;

const INPUT_DOMAIN: &[u8] = b"private-poll/input";
const DECRYPTION_DOMAIN: &[u8] = b"private-poll/decryption";

#[derive(Clone)]
pub struct LocalOracle {
    inner: Arc<Inner>,
}

struct Inner {
    key: Vec<u8>,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    /// Ciphertexts handed out by [`LocalOracle::encrypt`], with their values.
    inputs: HashMap<Vec<u8>, VoteCount>,
    /// Values under oracle management.
    slots: HashMap<HandleId, Slot>,
}

struct Slot {
    value: VoteCount,
    public: bool,
    allowed: HashSet<Address>,
}

impl LocalOracle {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            inner: Arc::new(Inner {
                key: secret.as_ref().to_vec(),
                state: Mutex::default(),
            }),
        }
    }

    /// Client-side encryption of a value, as a wallet SDK would do it.
    pub fn encrypt(&self, value: VoteCount) -> EncryptedInput {
        let mut ciphertext = vec![0; 32];
        rand::thread_rng().fill(&mut ciphertext[..]);
        let input_proof = self
            .tag(&[INPUT_DOMAIN, &ciphertext[..]])
            .finalize()
            .into_bytes();
        self.state().inputs.insert(ciphertext.clone(), value);
        EncryptedInput {
            ciphertext: ciphertext.into(),
            input_proof: HexBytes::from(&input_proof[..]),
        }
    }

    /// Has `principal` been granted access to `handle`?
    pub fn is_allowed(&self, handle: &HandleId, principal: &Address) -> bool {
        self.state()
            .slots
            .get(handle)
            .map_or(false, |slot| slot.allowed.contains(principal))
    }

    pub fn is_publicly_decryptable(&self, handle: &HandleId) -> bool {
        self.state()
            .slots
            .get(handle)
            .map_or(false, |slot| slot.public)
    }

    /// Produce a decryption proof for an arbitrary statement. The oracle
    /// itself only certifies cleartexts it actually decrypted.
    pub fn certify(&self, handles: &[HandleId], cleartext: &[u8]) -> HexBytes {
        let proof = self.decryption_tag(handles, cleartext).finalize().into_bytes();
        HexBytes::from(&proof[..])
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Check the input proof and look up the value behind the ciphertext.
    fn verify_input(
        &self,
        input: &EncryptedInput,
    ) -> Result<(MutexGuard<'_, State>, VoteCount), OracleError> {
        self.tag(&[INPUT_DOMAIN, &input.ciphertext[..]])
            .verify_slice(&input.input_proof)
            .map_err(|_| OracleError::InvalidInputProof)?;
        let state = self.state();
        let value = *state
            .inputs
            .get(&input.ciphertext[..])
            .ok_or(OracleError::InvalidInputProof)?;
        Ok((state, value))
    }

    fn tag(&self, parts: &[&[u8]]) -> HmacSha256 {
        let mut mac =
            HmacSha256::new_from_slice(&self.inner.key).expect("HMAC accepts keys of any length");
        for part in parts {
            mac.update(part);
        }
        mac
    }

    fn decryption_tag(&self, handles: &[HandleId], cleartext: &[u8]) -> HmacSha256 {
        let count = (handles.len() as u32).to_be_bytes();
        let mut mac = self.tag(&[DECRYPTION_DOMAIN, &count[..]]);
        for handle in handles {
            mac.update(handle.as_bytes());
        }
        mac.update(cleartext);
        mac
    }

    fn insert(state: &mut State, value: VoteCount) -> Accumulator {
        let mut bytes = [0; HandleId::LEN];
        rand::thread_rng().fill(&mut bytes);
        let handle = HandleId::from_bytes(bytes);
        state.slots.insert(
            handle,
            Slot {
                value,
                public: false,
                allowed: HashSet::new(),
            },
        );
        Accumulator::new(handle)
    }
}

impl ComputeOracle for LocalOracle {
    fn ingest(&self, input: &EncryptedInput) -> Result<Accumulator, OracleError> {
        let (mut state, value) = self.verify_input(input)?;
        Ok(Self::insert(&mut state, value))
    }

    fn ingest_zero(&self, input: &EncryptedInput) -> Result<Accumulator, OracleError> {
        let (mut state, value) = self.verify_input(input)?;
        if value != 0 {
            return Err(OracleError::NotZero);
        }
        Ok(Self::insert(&mut state, value))
    }

    fn add(&self, lhs: &Accumulator, rhs: &Accumulator) -> Result<Accumulator, OracleError> {
        let mut state = self.state();
        let value_of = |handle: HandleId| {
            state
                .slots
                .get(&handle)
                .map(|slot| slot.value)
                .ok_or(OracleError::UnknownHandle(handle))
        };
        let sum = value_of(lhs.handle())?.wrapping_add(value_of(rhs.handle())?);
        Ok(Self::insert(&mut state, sum))
    }

    fn allow(&self, value: &Accumulator, principal: &Address) -> Result<(), OracleError> {
        let mut state = self.state();
        let slot = state
            .slots
            .get_mut(&value.handle())
            .ok_or(OracleError::UnknownHandle(value.handle()))?;
        slot.allowed.insert(*principal);
        Ok(())
    }

    fn make_publicly_decryptable(&self, value: &Accumulator) -> Result<Accumulator, OracleError> {
        let mut state = self.state();
        let slot = state
            .slots
            .get_mut(&value.handle())
            .ok_or(OracleError::UnknownHandle(value.handle()))?;
        slot.public = true;
        Ok(value.clone())
    }

    fn verify_decryption(
        &self,
        handles: &[HandleId],
        cleartext: &[u8],
        proof: &[u8],
    ) -> Result<(), OracleError> {
        self.decryption_tag(handles, cleartext)
            .verify_slice(proof)
            .map_err(|_| OracleError::InvalidDecryptionProof)
    }
}

#[rocket::async_trait]
impl DecryptionOracle for LocalOracle {
    async fn public_decrypt(&self, handle: &HandleId) -> Result<Decryption, OracleError> {
        let value = {
            let state = self.state();
            let slot = state
                .slots
                .get(handle)
                .ok_or(OracleError::UnknownHandle(*handle))?;
            if !slot.public {
                return Err(OracleError::NotPubliclyDecryptable(*handle));
            }
            slot.value
        };
        let cleartext = encode_count(value);
        Ok(Decryption {
            proof: self.certify(&[*handle], &cleartext),
            cleartext: cleartext.into(),
        })
    }
}
