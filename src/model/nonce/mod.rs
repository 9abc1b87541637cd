//! Single-use, short-lived nonces for signature-gated actions.
//!
//! A client fetches a nonce for a resource, embeds it in a fixed message
//! template, signs the message with its wallet and submits all three. The
//! authority answers with the recovered signer; deciding whether that signer
//! may act is up to the caller.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use data_encoding::HEXLOWER;
use rand::RngCore;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::model::common::Address;

mod message;
mod signature;
mod sweeper;

pub use message::{SignIn, SignedIntent, ToggleHidden};
pub use signature::{PersonalSign, SignatureRecovery};
pub use sweeper::NonceSweeper;

#[cfg(test)]
pub(crate) use signature::wallet;

/// What a nonce was issued for: an election id, or `session`.
pub type ResourceId = String;

/// Bytes of randomness per nonce.
const NONCE_BYTES: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedNonce {
    pub nonce: String,
    #[serde(skip)]
    pub resource_id: ResourceId,
    pub expires_at: DateTime<Utc>,
}

/// Shared handle to the nonce store.
#[derive(Clone)]
pub struct NonceAuthority {
    nonces: Arc<Mutex<HashMap<String, IssuedNonce>>>,
    ttl: Duration,
    recovery: Arc<dyn SignatureRecovery>,
}

impl NonceAuthority {
    pub fn new(ttl: Duration, recovery: Arc<dyn SignatureRecovery>) -> Self {
        Self {
            nonces: Arc::default(),
            ttl,
            recovery,
        }
    }

    fn nonces(&self) -> MutexGuard<'_, HashMap<String, IssuedNonce>> {
        self.nonces.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Issue a fresh nonce for `resource_id`. Issuance is public.
    pub fn issue(&self, resource_id: impl Into<ResourceId>) -> IssuedNonce {
        self.issue_at(resource_id, Utc::now())
    }

    pub fn issue_at(&self, resource_id: impl Into<ResourceId>, now: DateTime<Utc>) -> IssuedNonce {
        let mut bytes = [0; NONCE_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        let issued = IssuedNonce {
            nonce: HEXLOWER.encode(&bytes),
            resource_id: resource_id.into(),
            expires_at: now + self.ttl,
        };
        trace!(
            "Issued nonce for {}, valid until {}",
            issued.resource_id,
            issued.expires_at
        );
        self.nonces().insert(issued.nonce.clone(), issued.clone());
        issued
    }

    /// Consume `nonce` and check that `signature` signs `message`, a rendering
    /// of intent `I` for `expected_resource` and this very nonce.
    ///
    /// The nonce is gone after this call whatever the outcome.
    pub fn consume_and_verify<I: SignedIntent>(
        &self,
        nonce: &str,
        expected_resource: &str,
        message: &str,
        signature: &[u8],
    ) -> Result<(Address, I)> {
        self.consume_and_verify_at(nonce, expected_resource, message, signature, Utc::now())
    }

    pub fn consume_and_verify_at<I: SignedIntent>(
        &self,
        nonce: &str,
        expected_resource: &str,
        message: &str,
        signature: &[u8],
        now: DateTime<Utc>,
    ) -> Result<(Address, I)> {
        self.consume_at(nonce, Some(expected_resource), message, signature, now)
    }

    /// Like [`Self::consume_and_verify`], for intents that name their own
    /// resource. The nonce must have been issued for the resource `message`
    /// names.
    pub fn consume_and_verify_named<I: SignedIntent>(
        &self,
        nonce: &str,
        message: &str,
        signature: &[u8],
    ) -> Result<(Address, I)> {
        self.consume_at(nonce, None, message, signature, Utc::now())
    }

    fn consume_at<I: SignedIntent>(
        &self,
        nonce: &str,
        expected_resource: Option<&str>,
        message: &str,
        signature: &[u8],
        now: DateTime<Utc>,
    ) -> Result<(Address, I)> {
        let issued = self
            .nonces()
            .remove(nonce)
            .ok_or(Error::InvalidOrExpiredNonce)?;
        if let Some(expected) = expected_resource {
            if issued.resource_id != expected {
                debug!(
                    "Nonce issued for {} presented for {expected}",
                    issued.resource_id
                );
                return Err(Error::InvalidOrExpiredNonce);
            }
        }
        if issued.expires_at < now {
            return Err(Error::InvalidOrExpiredNonce);
        }

        let signer = self.recovery.recover(message, signature)?;

        let intent = I::parse(message).ok_or(Error::MessageMismatch)?;
        if intent.nonce() != issued.nonce {
            return Err(Error::MessageMismatch);
        }
        if intent.resource_id() != issued.resource_id {
            return Err(match expected_resource {
                Some(_) => Error::MessageMismatch,
                None => {
                    debug!(
                        "Nonce issued for {} presented for {}",
                        issued.resource_id,
                        intent.resource_id()
                    );
                    Error::InvalidOrExpiredNonce
                }
            });
        }
        Ok((signer, intent))
    }

    /// Remove every nonce that expired before `now`. Returns how many.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let mut nonces = self.nonces();
        let before = nonces.len();
        nonces.retain(|_, issued| issued.expires_at >= now);
        before - nonces.len()
    }

    /// Number of outstanding nonces.
    pub fn len(&self) -> usize {
        self.nonces().len()
    }
}
