//! Self-relay of reveals: watch for a reveal request, fetch the public
//! decryption from the oracle and submit it back to the ledger.
//!
//! The relay is a convenience. It holds no state the ledger depends on, and a
//! cancelled or failed relay only leaves the choice waiting in `Requested`
//! for someone else to resolve.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use rocket::tokio::{
    self,
    sync::broadcast::{error::RecvError, Receiver},
    task::JoinHandle,
};

use crate::error::{Error, Result};
use crate::model::{
    common::{
        election::{ChoiceIndex, ElectionId, VoteCount},
        Address,
    },
    ledger::{Ledger, LedgerEvent, RevealState},
    oracle::{DecryptionOracle, HandleId},
};

#[derive(Clone)]
pub struct RelayCoordinator {
    ledger: Ledger,
    oracle: Arc<dyn DecryptionOracle>,
}

impl RelayCoordinator {
    pub fn new(ledger: Ledger, oracle: Arc<dyn DecryptionOracle>) -> Self {
        Self { ledger, oracle }
    }

    /// Start listening for the reveal request of one choice. Arm before
    /// requesting, or the request event may be missed.
    ///
    /// The task handles exactly one matching request and then ends.
    pub fn arm(&self, id: ElectionId, choice: ChoiceIndex) -> RelayTask {
        let events = self.ledger.subscribe();
        let handle = tokio::spawn(relay(
            self.ledger.clone(),
            self.oracle.clone(),
            events,
            id,
            choice,
        ));
        RelayTask { handle }
    }

    /// Request the reveal of one choice and relay it to completion.
    /// Returns the revealed count.
    pub async fn reveal(
        &self,
        caller: &Address,
        id: ElectionId,
        choice: ChoiceIndex,
    ) -> Result<VoteCount> {
        let task = self.arm(id, choice);
        self.ledger.request_reveal(caller, id, choice)?;
        task.await
    }
}

/// A running relay. Dropping it stops the relay.
pub struct RelayTask {
    handle: JoinHandle<Result<VoteCount>>,
}

impl Future for RelayTask {
    type Output = Result<VoteCount>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.handle)
            .poll(cx)
            .map(|joined| joined.unwrap_or_else(|e| Err(Error::RelayStopped(e.to_string()))))
    }
}

impl Drop for RelayTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn relay(
    ledger: Ledger,
    oracle: Arc<dyn DecryptionOracle>,
    events: Receiver<LedgerEvent>,
    id: ElectionId,
    choice: ChoiceIndex,
) -> Result<VoteCount> {
    let handle = next_request(&ledger, events, id, choice).await?;

    let decryption = oracle.public_decrypt(&handle).await.map_err(|e| {
        error!("Relay for election {id} choice {choice}: public decryption failed: {e}");
        Error::from(e)
    })?;
    let count = ledger
        .resolve_reveal(id, choice, &decryption.cleartext, &decryption.proof)
        .map_err(|e| {
            error!("Relay for election {id} choice {choice}: resolve failed: {e}");
            e
        })?;
    info!("Relayed reveal of election {id} choice {choice}: {count} votes");
    Ok(count)
}

/// Wait for the request event of `(id, choice)` and return its handle.
async fn next_request(
    ledger: &Ledger,
    mut events: Receiver<LedgerEvent>,
    id: ElectionId,
    choice: ChoiceIndex,
) -> Result<HandleId> {
    loop {
        match events.recv().await {
            Ok(LedgerEvent::ChoiceRevealRequested {
                id: event_id,
                choice_index,
                handle,
            }) if event_id == id => {
                if choice_index == choice {
                    return Ok(handle);
                }
                trace!("Relay for election {id} choice {choice} ignoring choice {choice_index}");
            }
            Ok(_) => {}
            Err(RecvError::Lagged(missed)) => {
                warn!("Relay for election {id} choice {choice} missed {missed} events");
                // The request may have been among them.
                if let Some(handle) = pending_request(ledger, id, choice) {
                    return Ok(handle);
                }
            }
            Err(RecvError::Closed) => {
                error!("Relay for election {id} choice {choice}: event stream closed");
                return Err(Error::RelayStopped("ledger event stream closed".to_string()));
            }
        }
    }
}

fn pending_request(ledger: &Ledger, id: ElectionId, choice: ChoiceIndex) -> Option<HandleId> {
    let view = ledger.election(id).ok()?;
    let reveal = view.reveals.get(usize::try_from(choice).ok()?)?;
    match reveal.state {
        RevealState::Requested => reveal.expected_handle,
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::model::oracle::{Decryption, LocalOracle, OracleError};

    const OWNER: Address = Address::from_bytes([0xaa; 20]);

    struct Unreachable;

    #[rocket::async_trait]
    impl DecryptionOracle for Unreachable {
        async fn public_decrypt(&self, _: &HandleId) -> std::result::Result<Decryption, OracleError> {
            Err(OracleError::Protocol("oracle offline".to_string()))
        }
    }

    /// A closed election with `votes[i]` votes for choice `i`.
    fn closed_election(votes: &[u8]) -> (Ledger, LocalOracle, ElectionId) {
        let oracle = LocalOracle::new("relay test secret");
        let ledger = Ledger::new(OWNER, Arc::new(oracle.clone()));
        let labels = (0..votes.len()).map(|i| format!("Choice {i}")).collect();
        let zeros: Vec<_> = votes.iter().map(|_| oracle.encrypt(0)).collect();
        let id = ledger
            .create(&OWNER, "Relay".to_string(), labels, &zeros)
            .unwrap();
        ledger.open(&OWNER, id).unwrap();
        let mut voter = 0u8;
        for (choice, count) in votes.iter().enumerate() {
            for _ in 0..*count {
                voter += 1;
                ledger
                    .cast_vote(
                        &Address::from_bytes([voter; 20]),
                        id,
                        choice as ChoiceIndex,
                        &oracle.encrypt(1),
                    )
                    .unwrap();
            }
        }
        ledger.close(&OWNER, id).unwrap();
        (ledger, oracle, id)
    }

    #[rocket::async_test]
    async fn reveals_every_choice() {
        let (ledger, oracle, id) = closed_election(&[1, 3]);
        let relay = RelayCoordinator::new(ledger.clone(), Arc::new(oracle));

        assert_eq!(relay.reveal(&OWNER, id, 0).await.unwrap(), 1);
        assert_eq!(relay.reveal(&OWNER, id, 1).await.unwrap(), 3);
        assert_eq!(ledger.winner(id).unwrap().choice_index, 1);
    }

    #[rocket::async_test]
    async fn ignores_other_choices() {
        let (ledger, oracle, id) = closed_election(&[2, 1]);
        let relay = RelayCoordinator::new(ledger.clone(), Arc::new(oracle));

        let task = relay.arm(id, 1);
        ledger.request_reveal(&OWNER, id, 0).unwrap();
        ledger.request_reveal(&OWNER, id, 1).unwrap();
        assert_eq!(task.await.unwrap(), 1);

        let view = ledger.election(id).unwrap();
        assert_eq!(view.reveals[0].state, RevealState::Requested);
        assert_eq!(view.reveals[1].state, RevealState::Resolved);
    }

    #[rocket::async_test]
    async fn oracle_failures_surface() {
        let (ledger, _, id) = closed_election(&[1, 1]);
        let relay = RelayCoordinator::new(ledger.clone(), Arc::new(Unreachable));

        assert!(matches!(
            relay.reveal(&OWNER, id, 0).await,
            Err(Error::Oracle(OracleError::Protocol(_)))
        ));
        // Stuck in `Requested`, and a naive retry is refused.
        assert_eq!(
            ledger.election(id).unwrap().reveals[0].state,
            RevealState::Requested
        );
        assert!(matches!(
            relay.reveal(&OWNER, id, 0).await,
            Err(Error::InvalidState(_))
        ));
    }

    #[rocket::async_test]
    async fn rejected_requests_do_not_leave_relays_behind() {
        let (ledger, oracle, id) = closed_election(&[1, 1]);
        let relay = RelayCoordinator::new(ledger.clone(), Arc::new(oracle));

        let stranger = Address::from_bytes([0x77; 20]);
        assert!(matches!(
            relay.reveal(&stranger, id, 0).await,
            Err(Error::OnlyOwner)
        ));
        assert!(matches!(
            relay.reveal(&OWNER, id, 9).await,
            Err(Error::InvalidChoiceIndex(9))
        ));
    }

    #[rocket::async_test]
    async fn dropping_the_task_cancels_it() {
        let (ledger, oracle, id) = closed_election(&[1, 1]);
        let relay = RelayCoordinator::new(ledger.clone(), Arc::new(oracle));

        drop(relay.arm(id, 0));
        ledger.request_reveal(&OWNER, id, 0).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(
            ledger.election(id).unwrap().reveals[0].state,
            RevealState::Requested
        );
    }
}
