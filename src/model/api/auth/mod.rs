mod token;
mod user;

pub use token::{AuthToken, AUTH_TOKEN_COOKIE};
pub use user::{Owner, Rights, User, Voter};

use serde::{Deserialize, Serialize};

use crate::model::common::{Address, HexBytes};

/// A message signed by a wallet, bound to a nonce from `GET /nonce`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedMessage {
    pub message: String,
    pub signature: HexBytes,
    pub nonce: String,
}

/// Who a session belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub address: Address,
    pub rights: Rights,
}
