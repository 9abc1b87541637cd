use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::model::common::Address;
use crate::model::oracle::{Accumulator, ComputeOracle, HandleId};

/// The encrypted running total of one choice.
///
/// A tally starts out private. Disclosing it is one-way: nothing turns a
/// [`DisclosedTally`] back into a private one, and only private tallies accept
/// further additions.
#[derive(Debug, Clone)]
pub enum ChoiceTally {
    Private(Accumulator),
    Disclosed(DisclosedTally),
}

/// A tally that has been marked publicly decryptable.
#[derive(Debug, Clone)]
pub struct DisclosedTally {
    accumulator: Accumulator,
}

impl ChoiceTally {
    pub fn accumulator(&self) -> &Accumulator {
        match self {
            Self::Private(accumulator) => accumulator,
            Self::Disclosed(disclosed) => &disclosed.accumulator,
        }
    }
}

/// A voter's participation in one election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRecord {
    pub has_voted: bool,
    /// The voter's own encrypted choice. Only the voter is granted access to it.
    pub ciphertext_handle: Option<HandleId>,
    pub cast_at: DateTime<Utc>,
}

/// Per-choice encrypted accumulators plus the set of addresses that have voted.
#[derive(Debug)]
pub struct ConfidentialTallyStore {
    tallies: Vec<ChoiceTally>,
    voters: HashMap<Address, VoteRecord>,
}

impl ConfidentialTallyStore {
    /// Start every choice at the given encrypted zero.
    pub fn seeded(zeros: Vec<Accumulator>) -> Self {
        Self {
            tallies: zeros.into_iter().map(ChoiceTally::Private).collect(),
            voters: HashMap::new(),
        }
    }

    /// Replace the accumulator at `position` with `old + ciphertext`, and let
    /// `owner` request decryption of the new value later.
    ///
    /// Nothing is modified unless every oracle call succeeds.
    pub fn add(
        &mut self,
        oracle: &dyn ComputeOracle,
        position: usize,
        ciphertext: &Accumulator,
        owner: &Address,
    ) -> Result<()> {
        let tally = self
            .tallies
            .get_mut(position)
            .ok_or_else(|| Error::BadRequest(format!("no tally at position {position}")))?;
        let current = match tally {
            ChoiceTally::Private(accumulator) => accumulator,
            ChoiceTally::Disclosed(_) => {
                return Err(Error::InvalidState(format!(
                    "tally at position {position} is frozen"
                )))
            }
        };
        let sum = oracle.add(current, ciphertext)?;
        oracle.allow(&sum, owner)?;
        *tally = ChoiceTally::Private(sum);
        Ok(())
    }

    /// The handle of the current accumulator at `position`.
    pub fn snapshot(&self, oracle: &dyn ComputeOracle, position: usize) -> Option<HandleId> {
        self.tallies
            .get(position)
            .map(|tally| oracle.to_handle_id(tally.accumulator()))
    }

    /// Mark the accumulator at `position` publicly decryptable and return the
    /// handle that a decryption proof must later be bound to.
    pub fn disclose(&mut self, oracle: &dyn ComputeOracle, position: usize) -> Result<HandleId> {
        let tally = self
            .tallies
            .get_mut(position)
            .ok_or_else(|| Error::BadRequest(format!("no tally at position {position}")))?;
        let accumulator = match tally {
            ChoiceTally::Private(accumulator) => accumulator,
            ChoiceTally::Disclosed(_) => {
                return Err(Error::InvalidState(format!(
                    "tally at position {position} is already publicly decryptable"
                )))
            }
        };
        let accumulator = oracle.make_publicly_decryptable(accumulator)?;
        let handle = oracle.to_handle_id(&accumulator);
        *tally = ChoiceTally::Disclosed(DisclosedTally { accumulator });
        Ok(handle)
    }

    pub fn has_voted(&self, voter: &Address) -> bool {
        self.voters
            .get(voter)
            .map_or(false, |record| record.has_voted)
    }

    pub fn record_vote(&mut self, voter: Address, ciphertext_handle: HandleId) {
        self.voters.insert(
            voter,
            VoteRecord {
                has_voted: true,
                ciphertext_handle: Some(ciphertext_handle),
                cast_at: Utc::now(),
            },
        );
    }

    pub fn vote_record(&self, voter: &Address) -> Option<&VoteRecord> {
        self.voters.get(voter)
    }

    pub fn voter_count(&self) -> usize {
        self.voters.len()
    }

    pub fn len(&self) -> usize {
        self.tallies.len()
    }
}
