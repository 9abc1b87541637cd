use serde::{Deserialize, Serialize};

use crate::model::{
    common::election::{ChoiceIndex, ElectionId},
    ledger::VoteRecord,
    oracle::{EncryptedInput, HandleId},
};

/// A vote the voter wishes to cast: the encrypted one, and the choice whose
/// tally it is added to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BallotSpec {
    pub choice_index: ChoiceIndex,
    #[serde(flatten)]
    pub input: EncryptedInput,
}

/// Proof of a cast vote. Only the voter may decrypt `handle`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteReceipt {
    pub election_id: ElectionId,
    pub handle: HandleId,
}

/// The caller's own participation in an election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnVote {
    pub has_voted: bool,
    pub ciphertext_handle: Option<HandleId>,
}

impl From<Option<VoteRecord>> for OwnVote {
    fn from(record: Option<VoteRecord>) -> Self {
        match record {
            Some(record) => Self {
                has_voted: record.has_voted,
                ciphertext_handle: record.ciphertext_handle,
            },
            None => Self {
                has_voted: false,
                ciphertext_handle: None,
            },
        }
    }
}
