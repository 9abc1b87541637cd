use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    common::election::{ElectionId, ElectionState, VoteCount},
    ledger::{ElectionView, RevealState, RevealStatus, Winner},
    oracle::{EncryptedInput, HandleId},
};

/// An election the owner wishes to create.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewElection {
    pub title: String,
    pub choices: Vec<String>,
    /// One encrypted zero per choice, to seed the tallies.
    pub zero_ciphertexts: Vec<EncryptedInput>,
}

/// An API-friendly election description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionDescription {
    pub id: ElectionId,
    pub title: String,
    pub choices: Vec<String>,
    pub state: ElectionState,
    pub hidden: bool,
    pub created_at: DateTime<Utc>,
    pub voter_count: usize,
    pub revealed_choice_count: usize,
    pub reveals: Vec<RevealDescription>,
}

/// The reveal progress of one choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevealDescription {
    pub state: RevealState,
    pub expected_handle: Option<HandleId>,
    pub count: Option<VoteCount>,
}

impl From<&RevealStatus> for RevealDescription {
    fn from(status: &RevealStatus) -> Self {
        Self {
            state: status.state,
            expected_handle: status.expected_handle,
            count: status.count,
        }
    }
}

impl From<&ElectionView> for ElectionDescription {
    fn from(view: &ElectionView) -> Self {
        Self {
            id: view.id,
            title: view.title.clone(),
            choices: view.choices.clone(),
            state: view.state,
            hidden: view.hidden,
            created_at: view.created_at,
            voter_count: view.voter_count,
            revealed_choice_count: view.revealed_choice_count,
            reveals: view.reveals.iter().map(RevealDescription::from).collect(),
        }
    }
}

/// A summary of an election, shorter than the full `ElectionDescription`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionSummary {
    pub id: ElectionId,
    pub title: String,
    pub state: ElectionState,
    pub hidden: bool,
}

impl From<&ElectionView> for ElectionSummary {
    fn from(view: &ElectionView) -> Self {
        Self {
            id: view.id,
            title: view.title.clone(),
            state: view.state,
            hidden: view.hidden,
        }
    }
}

/// Revealed counts so far, and the winner once every choice is revealed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionResults {
    pub id: ElectionId,
    pub counts: Vec<Option<VoteCount>>,
    pub fully_revealed: bool,
    pub winner: Option<Winner>,
}

impl From<&ElectionView> for ElectionResults {
    fn from(view: &ElectionView) -> Self {
        Self {
            id: view.id,
            counts: view.revealed_results(),
            fully_revealed: view.is_fully_revealed(),
            winner: view.winner().ok(),
        }
    }
}
