use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::common::election::{ChoiceIndex, ElectionId, VoteCount};
use crate::model::oracle::HandleId;

/// Where a single choice is in the reveal protocol.
///
/// `NotRequested -> Requested -> Resolved`, never backwards. A request whose
/// proof never verifies stays `Requested` for good.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealRequest {
    NotRequested,
    Requested {
        expected_handle: HandleId,
    },
    Resolved {
        expected_handle: HandleId,
        count: VoteCount,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RevealState {
    NotRequested,
    Requested,
    Resolved,
}

impl RevealRequest {
    pub fn state(&self) -> RevealState {
        match self {
            Self::NotRequested => RevealState::NotRequested,
            Self::Requested { .. } => RevealState::Requested,
            Self::Resolved { .. } => RevealState::Resolved,
        }
    }

    pub fn expected_handle(&self) -> Option<HandleId> {
        match self {
            Self::NotRequested => None,
            Self::Requested { expected_handle } | Self::Resolved { expected_handle, .. } => {
                Some(*expected_handle)
            }
        }
    }

    pub fn count(&self) -> Option<VoteCount> {
        match self {
            Self::Resolved { count, .. } => Some(*count),
            _ => None,
        }
    }
}

/// The per-choice reveal requests of one election.
#[derive(Debug)]
pub struct RevealProtocol {
    requests: Vec<RevealRequest>,
    revealed_choice_count: usize,
}

impl RevealProtocol {
    pub fn new(choice_count: usize) -> Self {
        Self {
            requests: vec![RevealRequest::NotRequested; choice_count],
            revealed_choice_count: 0,
        }
    }

    pub fn requests(&self) -> &[RevealRequest] {
        &self.requests
    }

    pub fn revealed_choice_count(&self) -> usize {
        self.revealed_choice_count
    }

    pub fn is_complete(&self) -> bool {
        self.revealed_choice_count == self.requests.len()
    }

    /// Fails unless the choice at `position` has never been requested.
    pub fn ensure_requestable(
        &self,
        position: usize,
        election: ElectionId,
        choice: ChoiceIndex,
    ) -> Result<()> {
        match self.requests.get(position) {
            Some(RevealRequest::NotRequested) => Ok(()),
            Some(_) => Err(Error::InvalidState(format!(
                "reveal already requested for choice {choice} of election {election}"
            ))),
            None => Err(Error::InvalidChoiceIndex(choice)),
        }
    }

    pub fn mark_requested(&mut self, position: usize, expected_handle: HandleId) {
        self.requests[position] = RevealRequest::Requested { expected_handle };
    }

    /// The handle bound at request time, provided the choice is still awaiting
    /// its cleartext.
    pub fn pending_handle(
        &self,
        position: usize,
        election: ElectionId,
        choice: ChoiceIndex,
    ) -> Result<HandleId> {
        match self.requests.get(position) {
            Some(RevealRequest::Requested { expected_handle }) => Ok(*expected_handle),
            Some(RevealRequest::NotRequested) => {
                Err(Error::RevealNotRequested { election, choice })
            }
            Some(RevealRequest::Resolved { .. }) => Err(Error::AlreadyRevealed { election, choice }),
            None => Err(Error::InvalidChoiceIndex(choice)),
        }
    }

    /// Commit a verified count. Returns the number of choices now revealed.
    pub fn mark_resolved(&mut self, position: usize, count: VoteCount) -> usize {
        if let RevealRequest::Requested { expected_handle } = self.requests[position] {
            self.requests[position] = RevealRequest::Resolved {
                expected_handle,
                count,
            };
            self.revealed_choice_count += 1;
        }
        self.revealed_choice_count
    }
}

/// The winning choice of a fully revealed election.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Winner {
    pub choice_index: ChoiceIndex,
    pub vote_count: VoteCount,
}

/// Linear scan for the highest count. A later choice only takes the lead with
/// a strictly greater count, so ties go to the lowest index.
pub fn winner(counts: &[VoteCount]) -> Option<Winner> {
    let mut best: Option<Winner> = None;
    for (index, count) in counts.iter().enumerate() {
        if best.map_or(true, |best| *count > best.vote_count) {
            best = Some(Winner {
                choice_index: index as ChoiceIndex,
                vote_count: *count,
            });
        }
    }
    best
}
