//! The fixed message templates a wallet signs.
//!
//! Templates are exact: a message is only accepted if rendering the parsed
//! fields reproduces it byte for byte.

use crate::model::common::election::ElectionId;

use super::ResourceId;

/// A signed statement of intent, bound to a resource and a nonce.
pub trait SignedIntent: Sized {
    fn parse(message: &str) -> Option<Self>;

    fn resource_id(&self) -> ResourceId;

    fn nonce(&self) -> &str;
}

/// `"Toggle hidden for election {id} with nonce {nonce}"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleHidden {
    pub election: ElectionId,
    pub nonce: String,
}

impl ToggleHidden {
    const PREFIX: &'static str = "Toggle hidden for election ";
    const NONCE: &'static str = " with nonce ";

    pub fn message(election: ElectionId, nonce: &str) -> String {
        format!("{}{election}{}{nonce}", Self::PREFIX, Self::NONCE)
    }
}

impl SignedIntent for ToggleHidden {
    fn parse(message: &str) -> Option<Self> {
        let (election, nonce) = message
            .strip_prefix(Self::PREFIX)?
            .split_once(Self::NONCE)?;
        if !is_token(nonce) || !election.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let intent = Self {
            election: election.parse().ok()?,
            nonce: nonce.to_string(),
        };
        (Self::message(intent.election, &intent.nonce) == message).then_some(intent)
    }

    fn resource_id(&self) -> ResourceId {
        self.election.to_string()
    }

    fn nonce(&self) -> &str {
        &self.nonce
    }
}

/// `"Sign in to private polls with nonce {nonce}"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignIn {
    pub nonce: String,
}

impl SignIn {
    /// Resource that session nonces are issued for.
    pub const RESOURCE: &'static str = "session";
    const PREFIX: &'static str = "Sign in to private polls with nonce ";

    pub fn message(nonce: &str) -> String {
        format!("{}{nonce}", Self::PREFIX)
    }
}

impl SignedIntent for SignIn {
    fn parse(message: &str) -> Option<Self> {
        let nonce = message.strip_prefix(Self::PREFIX)?;
        is_token(nonce).then(|| Self {
            nonce: nonce.to_string(),
        })
    }

    fn resource_id(&self) -> ResourceId {
        Self::RESOURCE.to_string()
    }

    fn nonce(&self) -> &str {
        &self.nonce
    }
}

fn is_token(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_alphanumeric())
}
