use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::model::common::election::{ChoiceIndex, ElectionId, VoteCount};
use crate::model::common::Address;
use crate::model::oracle::HandleId;

/// Observable ledger events, in commit order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum LedgerEvent {
    #[serde(rename_all = "camelCase")]
    ElectionCreated {
        id: ElectionId,
        title: String,
        choices: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    ElectionOpened { id: ElectionId },
    #[serde(rename_all = "camelCase")]
    ElectionClosed { id: ElectionId },
    #[serde(rename_all = "camelCase")]
    VoteCast {
        id: ElectionId,
        voter: Address,
        choice_index: ChoiceIndex,
    },
    #[serde(rename_all = "camelCase")]
    ChoiceRevealRequested {
        id: ElectionId,
        choice_index: ChoiceIndex,
        handle: HandleId,
    },
    #[serde(rename_all = "camelCase")]
    ChoiceRevealed {
        id: ElectionId,
        choice_index: ChoiceIndex,
        vote_count: VoteCount,
    },
    #[serde(rename_all = "camelCase")]
    ElectionFullyRevealed { id: ElectionId },
}

impl LedgerEvent {
    pub fn election_id(&self) -> ElectionId {
        match self {
            Self::ElectionCreated { id, .. }
            | Self::ElectionOpened { id }
            | Self::ElectionClosed { id }
            | Self::VoteCast { id, .. }
            | Self::ChoiceRevealRequested { id, .. }
            | Self::ChoiceRevealed { id, .. }
            | Self::ElectionFullyRevealed { id } => *id,
        }
    }
}

impl Display for LedgerEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ElectionCreated { id, title, choices } => {
                write!(f, "ElectionCreated({id}, {title:?}, {choices:?})")
            }
            Self::ElectionOpened { id } => write!(f, "ElectionOpened({id})"),
            Self::ElectionClosed { id } => write!(f, "ElectionClosed({id})"),
            Self::VoteCast {
                id,
                voter,
                choice_index,
            } => write!(f, "VoteCast({id}, {voter}, {choice_index})"),
            Self::ChoiceRevealRequested {
                id,
                choice_index,
                handle,
            } => write!(f, "ChoiceRevealRequested({id}, {choice_index}, {handle})"),
            Self::ChoiceRevealed {
                id,
                choice_index,
                vote_count,
            } => write!(f, "ChoiceRevealed({id}, {choice_index}, {vote_count})"),
            Self::ElectionFullyRevealed { id } => write!(f, "ElectionFullyRevealed({id})"),
        }
    }
}
