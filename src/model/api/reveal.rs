use serde::{Deserialize, Serialize};

use crate::model::{
    common::{
        election::{ChoiceIndex, ElectionId, VoteCount},
        HexBytes,
    },
    oracle::HandleId,
};

/// Acknowledgement of a reveal request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevealReceipt {
    pub election_id: ElectionId,
    pub choice_index: ChoiceIndex,
    /// The handle a decryption proof must be bound to.
    pub handle: HandleId,
    /// Whether this server will relay the decryption itself.
    pub relayed: bool,
}

/// A public decryption of a requested choice, submitted by anyone.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevealSubmission {
    pub cleartext: HexBytes,
    pub decryption_proof: HexBytes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevealedChoice {
    pub election_id: ElectionId,
    pub choice_index: ChoiceIndex,
    pub vote_count: VoteCount,
}
