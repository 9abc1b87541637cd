use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::model::common::election::{
    ChoiceIndex, ElectionId, ElectionState, MAX_CHOICES, MIN_CHOICES,
};

/// The ordered, length-validated list of choice labels of an election.
///
/// Every lookup by [`ChoiceIndex`] is bounds-checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choices(Vec<String>);

impl Choices {
    /// Validate a list of labels: between [`MIN_CHOICES`] and [`MAX_CHOICES`]
    /// entries, none of them blank.
    pub fn new(labels: Vec<String>) -> Result<Self> {
        if labels.len() < MIN_CHOICES {
            return Err(Error::TooFewChoices(labels.len()));
        }
        if labels.len() > MAX_CHOICES {
            return Err(Error::TooManyChoices(labels.len()));
        }
        if let Some(blank) = labels.iter().position(|label| label.trim().is_empty()) {
            return Err(Error::EmptyChoiceLabel(blank));
        }
        Ok(Self(labels))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Convert a choice index into a position in the backing list.
    pub fn position(&self, choice: ChoiceIndex) -> Result<usize> {
        usize::try_from(choice)
            .ok()
            .filter(|position| *position < self.0.len())
            .ok_or(Error::InvalidChoiceIndex(choice))
    }

    pub fn labels(&self) -> &[String] {
        &self.0
    }
}

/// An election's identity and lifecycle.
#[derive(Debug, Clone)]
pub struct Election {
    pub id: ElectionId,
    pub title: String,
    pub choices: Choices,
    /// Metadata only: hides the election from public listings.
    pub hidden: bool,
    pub created_at: DateTime<Utc>,
    state: ElectionState,
}

impl Election {
    pub fn new(id: ElectionId, title: String, choices: Choices) -> Self {
        Self {
            id,
            title,
            choices,
            hidden: false,
            created_at: Utc::now(),
            state: ElectionState::Created,
        }
    }

    pub fn state(&self) -> ElectionState {
        self.state
    }

    /// Move to the state after `from`, provided the election is in `from`.
    fn advance(&mut self, from: ElectionState) -> bool {
        match self.state.next() {
            Some(next) if self.state == from => {
                self.state = next;
                true
            }
            _ => false,
        }
    }

    /// `Created -> Open`.
    pub fn open(&mut self) -> Result<()> {
        if !self.advance(ElectionState::Created) {
            return Err(Error::invalid_state(self.id, self.state, "open"));
        }
        Ok(())
    }

    /// `Open -> Closed`. There is no automatic close; the owner decides when
    /// the tallies freeze.
    pub fn close(&mut self) -> Result<()> {
        if !self.advance(ElectionState::Open) {
            return Err(Error::ElectionNotOpen(self.id));
        }
        Ok(())
    }

    /// `Closed -> Revealed`, once every choice has been resolved.
    /// Returns whether the transition happened; a repeat call is a no-op.
    pub fn advance_if_fully_revealed(&mut self) -> bool {
        self.advance(ElectionState::Closed)
    }
}
