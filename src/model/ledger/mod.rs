//! The election ledger: lifecycle, encrypted tallies and the reveal protocol.
//!
//! Every mutating operation runs as one transaction against a single
//! election. All checks happen before the first state change, so a failed
//! operation leaves no trace. Successful transactions publish their events
//! and a fresh read snapshot of the election before the election is unlocked,
//! which keeps event order identical to commit order.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use rocket::tokio::sync::broadcast;

use crate::error::{Error, Result};
use crate::model::common::election::{ChoiceIndex, ElectionId, ElectionState, VoteCount};
use crate::model::common::Address;
use crate::model::oracle::{
    decode_count, Accumulator, ComputeOracle, EncryptedInput, HandleId, OracleError,
};

mod election;
mod event;
mod reveal;
mod tally;


pub use election::{Choices, Election};
pub use event::LedgerEvent;
pub use reveal::{RevealRequest, RevealState, Winner};
pub use tally::{ChoiceTally, VoteRecord};

use reveal::RevealProtocol;
use tally::ConfidentialTallyStore;

/// Capacity of the live event channel. Slow subscribers see `Lagged`.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Shared handle to the ledger.
#[derive(Clone)]
pub struct Ledger {
    inner: Arc<Inner>,
}

struct Inner {
    owner: Address,
    oracle: Arc<dyn ComputeOracle>,
    elections: RwLock<Vec<Arc<ElectionCell>>>,
    events: broadcast::Sender<LedgerEvent>,
}

struct ElectionCell {
    record: Mutex<ElectionRecord>,
    view: RwLock<Arc<ElectionView>>,
    log: RwLock<Vec<LedgerEvent>>,
    /// Committed vote records, readable without the record lock.
    votes: RwLock<HashMap<Address, VoteRecord>>,
}

struct ElectionRecord {
    election: Election,
    tallies: ConfidentialTallyStore,
    reveals: RevealProtocol,
    /// Events of the running transaction, published on commit.
    pending: Vec<LedgerEvent>,
}

impl ElectionRecord {
    fn emit(&mut self, event: LedgerEvent) {
        self.pending.push(event);
    }

    fn view(&self, oracle: &dyn ComputeOracle) -> ElectionView {
        let election = &self.election;
        let reveals = self
            .reveals
            .requests()
            .iter()
            .map(|request| RevealStatus {
                state: request.state(),
                expected_handle: request.expected_handle(),
                count: request.count(),
            })
            .collect();
        let current_handles = (0..self.tallies.len())
            .filter_map(|position| self.tallies.snapshot(oracle, position))
            .collect();
        ElectionView {
            id: election.id,
            title: election.title.clone(),
            choices: election.choices.labels().to_vec(),
            state: election.state(),
            hidden: election.hidden,
            created_at: election.created_at,
            voter_count: self.tallies.voter_count(),
            revealed_choice_count: self.reveals.revealed_choice_count(),
            reveals,
            current_handles,
        }
    }
}

/// A consistent, point-in-time copy of one election's public state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElectionView {
    pub id: ElectionId,
    pub title: String,
    pub choices: Vec<String>,
    pub state: ElectionState,
    pub hidden: bool,
    pub created_at: DateTime<Utc>,
    pub voter_count: usize,
    pub revealed_choice_count: usize,
    pub reveals: Vec<RevealStatus>,
    /// Handles of the current per-choice accumulators.
    pub current_handles: Vec<HandleId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevealStatus {
    pub state: RevealState,
    pub expected_handle: Option<HandleId>,
    pub count: Option<VoteCount>,
}

impl ElectionView {
    pub fn is_fully_revealed(&self) -> bool {
        self.state == ElectionState::Revealed
    }

    /// Per-choice counts, `None` where the choice is not yet revealed.
    pub fn revealed_results(&self) -> Vec<Option<VoteCount>> {
        self.reveals.iter().map(|reveal| reveal.count).collect()
    }

    pub fn winner(&self) -> Result<Winner> {
        if !self.is_fully_revealed() {
            return Err(Error::invalid_state(self.id, self.state, "pick a winner of"));
        }
        let counts: Vec<VoteCount> = self.reveals.iter().filter_map(|r| r.count).collect();
        reveal::winner(&counts)
            .ok_or_else(|| Error::InvalidState(format!("election {} has no choices", self.id)))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Ledger {
    pub fn new(owner: Address, oracle: Arc<dyn ComputeOracle>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                owner,
                oracle,
                elections: RwLock::default(),
                events,
            }),
        }
    }

    pub fn owner(&self) -> Address {
        self.inner.owner
    }

    /// Live stream of every event committed from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.inner.events.subscribe()
    }

    fn oracle(&self) -> &dyn ComputeOracle {
        self.inner.oracle.as_ref()
    }

    fn ensure_owner(&self, caller: &Address) -> Result<()> {
        if *caller == self.inner.owner {
            Ok(())
        } else {
            Err(Error::OnlyOwner)
        }
    }

    fn cell(&self, id: ElectionId) -> Result<Arc<ElectionCell>> {
        let elections = self
            .inner
            .elections
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        usize::try_from(id)
            .ok()
            .and_then(|id| id.checked_sub(1))
            .and_then(|index| elections.get(index))
            .cloned()
            .ok_or_else(|| Error::not_found(format!("election {id}")))
    }

    /// Publish the pending events of a committed transaction and refresh the
    /// read snapshot. Runs while the record is still locked.
    fn commit(&self, cell: &ElectionCell, record: &mut ElectionRecord) {
        let events: Vec<LedgerEvent> = record.pending.drain(..).collect();
        *cell.view.write().unwrap_or_else(PoisonError::into_inner) =
            Arc::new(record.view(self.oracle()));
        let mut log = cell.log.write().unwrap_or_else(PoisonError::into_inner);
        for event in events {
            if let LedgerEvent::VoteCast { voter, .. } = &event {
                if let Some(vote) = record.tallies.vote_record(voter) {
                    cell.votes
                        .write()
                        .unwrap_or_else(PoisonError::into_inner)
                        .insert(*voter, vote.clone());
                }
            }
            trace!("Committed {event}");
            log.push(event.clone());
            // No subscribers is not an error.
            let _ = self.inner.events.send(event);
        }
    }

    /// Run `operation` as a transaction on election `id`.
    fn transact<T>(
        &self,
        id: ElectionId,
        operation: impl FnOnce(&mut ElectionRecord, &dyn ComputeOracle) -> Result<T>,
    ) -> Result<T> {
        let cell = self.cell(id)?;
        let mut record = lock(&cell.record);
        match operation(&mut record, self.oracle()) {
            Ok(value) => {
                self.commit(&cell, &mut record);
                Ok(value)
            }
            Err(e) => {
                record.pending.clear();
                Err(e)
            }
        }
    }

    /// Create a new election. `zeros` must hold one encrypted zero per choice;
    /// they become the initial tallies.
    pub fn create(
        &self,
        caller: &Address,
        title: String,
        labels: Vec<String>,
        zeros: &[EncryptedInput],
    ) -> Result<ElectionId> {
        self.ensure_owner(caller)?;
        if title.trim().is_empty() {
            return Err(Error::BadRequest("election title must not be empty".to_string()));
        }
        let choices = Choices::new(labels)?;
        if zeros.len() != choices.len() {
            return Err(Error::InputCountMismatch {
                expected: choices.len(),
                found: zeros.len(),
            });
        }
        let oracle = self.oracle();
        let accumulators = zeros
            .iter()
            .map(|zero| {
                let accumulator = oracle.ingest_zero(zero)?;
                oracle.allow(&accumulator, &self.inner.owner)?;
                Ok(accumulator)
            })
            .collect::<std::result::Result<Vec<Accumulator>, OracleError>>()?;

        let mut elections = self
            .inner
            .elections
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let id = ElectionId::try_from(elections.len() + 1)
            .map_err(|_| Error::InvalidState("election id space exhausted".to_string()))?;

        let mut record = ElectionRecord {
            reveals: RevealProtocol::new(choices.len()),
            election: Election::new(id, title.clone(), choices.clone()),
            tallies: ConfidentialTallyStore::seeded(accumulators),
            pending: Vec::new(),
        };
        record.emit(LedgerEvent::ElectionCreated {
            id,
            title,
            choices: choices.labels().to_vec(),
        });
        let cell = Arc::new(ElectionCell {
            view: RwLock::new(Arc::new(record.view(oracle))),
            log: RwLock::default(),
            votes: RwLock::default(),
            record: Mutex::new(record),
        });
        self.commit(&cell, &mut lock(&cell.record));
        elections.push(cell);
        Ok(id)
    }

    pub fn open(&self, caller: &Address, id: ElectionId) -> Result<()> {
        self.ensure_owner(caller)?;
        self.transact(id, |record, _| {
            record.election.open()?;
            record.emit(LedgerEvent::ElectionOpened { id });
            Ok(())
        })
    }

    pub fn close(&self, caller: &Address, id: ElectionId) -> Result<()> {
        self.ensure_owner(caller)?;
        self.transact(id, |record, _| {
            record.election.close()?;
            record.emit(LedgerEvent::ElectionClosed { id });
            Ok(())
        })
    }

    /// Cast `caller`'s single vote. Returns the handle of the voter's own
    /// encrypted choice, which only the voter may decrypt.
    pub fn cast_vote(
        &self,
        caller: &Address,
        id: ElectionId,
        choice: ChoiceIndex,
        input: &EncryptedInput,
    ) -> Result<HandleId> {
        let owner = self.inner.owner;
        self.transact(id, |record, oracle| {
            if record.election.state() != ElectionState::Open {
                return Err(Error::ElectionNotOpen(id));
            }
            let position = record.election.choices.position(choice)?;
            if record.tallies.has_voted(caller) {
                return Err(Error::AlreadyVoted(id));
            }

            let vote = oracle.ingest(input)?;
            oracle.allow(&vote, caller)?;
            record.tallies.add(oracle, position, &vote, &owner)?;
            let handle = oracle.to_handle_id(&vote);
            record.tallies.record_vote(*caller, handle);
            record.emit(LedgerEvent::VoteCast {
                id,
                voter: *caller,
                choice_index: choice,
            });
            Ok(handle)
        })
    }

    /// Mark the tally of one choice publicly decryptable and bind the reveal
    /// to its current handle.
    pub fn request_reveal(
        &self,
        caller: &Address,
        id: ElectionId,
        choice: ChoiceIndex,
    ) -> Result<HandleId> {
        self.ensure_owner(caller)?;
        self.transact(id, |record, oracle| {
            if record.election.state() != ElectionState::Closed {
                return Err(Error::MustBeClosed(id));
            }
            let position = record.election.choices.position(choice)?;
            record.reveals.ensure_requestable(position, id, choice)?;

            let handle = record.tallies.disclose(oracle, position)?;
            record.reveals.mark_requested(position, handle);
            record.emit(LedgerEvent::ChoiceRevealRequested {
                id,
                choice_index: choice,
                handle,
            });
            Ok(handle)
        })
    }

    /// Accept a decrypted count for a requested choice, provided `proof`
    /// certifies it for the handle bound at request time. Open to anyone.
    pub fn resolve_reveal(
        &self,
        id: ElectionId,
        choice: ChoiceIndex,
        cleartext: &[u8],
        proof: &[u8],
    ) -> Result<VoteCount> {
        self.transact(id, |record, oracle| {
            let position = record.election.choices.position(choice)?;
            let expected = record.reveals.pending_handle(position, id, choice)?;
            oracle
                .verify_decryption(&[expected], cleartext, proof)
                .map_err(|e| {
                    if e.is_rejection() {
                        Error::ProofRejected(e)
                    } else {
                        Error::Oracle(e)
                    }
                })?;
            let count = decode_count(cleartext).ok_or(Error::MalformedCleartext(cleartext.len()))?;

            record.reveals.mark_resolved(position, count);
            record.emit(LedgerEvent::ChoiceRevealed {
                id,
                choice_index: choice,
                vote_count: count,
            });
            if record.reveals.is_complete() && record.election.advance_if_fully_revealed() {
                record.emit(LedgerEvent::ElectionFullyRevealed { id });
            }
            Ok(count)
        })
    }

    /// Flip the `hidden` flag. Returns the new value.
    pub fn toggle_hidden(&self, caller: &Address, id: ElectionId) -> Result<bool> {
        self.ensure_owner(caller)?;
        self.transact(id, |record, _| {
            record.election.hidden = !record.election.hidden;
            Ok(record.election.hidden)
        })
    }

    pub fn election(&self, id: ElectionId) -> Result<Arc<ElectionView>> {
        let cell = self.cell(id)?;
        let view = cell.view.read().unwrap_or_else(PoisonError::into_inner);
        Ok(view.clone())
    }

    pub fn elections(&self) -> Vec<Arc<ElectionView>> {
        let elections = self
            .inner
            .elections
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        elections
            .iter()
            .map(|cell| {
                cell.view
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone()
            })
            .collect()
    }

    pub fn revealed_results(&self, id: ElectionId) -> Result<Vec<Option<VoteCount>>> {
        Ok(self.election(id)?.revealed_results())
    }

    pub fn winner(&self, id: ElectionId) -> Result<Winner> {
        self.election(id)?.winner()
    }

    /// The caller's own vote record, if they voted.
    pub fn own_vote(&self, caller: &Address, id: ElectionId) -> Result<Option<VoteRecord>> {
        let cell = self.cell(id)?;
        let votes = cell.votes.read().unwrap_or_else(PoisonError::into_inner);
        Ok(votes.get(caller).cloned())
    }

    /// Every event committed for election `id`, oldest first.
    pub fn events(&self, id: ElectionId) -> Result<Vec<LedgerEvent>> {
        let cell = self.cell(id)?;
        let log = cell.log.read().unwrap_or_else(PoisonError::into_inner);
        Ok(log.clone())
    }
}
