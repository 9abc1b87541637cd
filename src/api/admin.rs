use rocket::{serde::json::Json, tokio, Route, State};

use crate::{
    error::Result,
    model::{
        api::{
            auth::{AuthToken, Owner},
            election::{ElectionDescription, NewElection},
            reveal::RevealReceipt,
        },
        common::election::{ChoiceIndex, ElectionId},
        ledger::Ledger,
    },
    relay::RelayCoordinator,
    Config,
};

pub fn routes() -> Vec<Route> {
    routes![
        create_election,
        open_election,
        close_election,
        request_reveal,
    ]
}

#[post("/elections", data = "<spec>", format = "json")]
fn create_election(
    token: AuthToken<Owner>,
    spec: Json<NewElection>,
    ledger: &State<Ledger>,
) -> Result<Json<ElectionDescription>> {
    let spec = spec.into_inner();
    let id = ledger.create(
        &token.address,
        spec.title,
        spec.choices,
        &spec.zero_ciphertexts,
    )?;
    let view = ledger.election(id)?;
    Ok(Json(view.as_ref().into()))
}

#[post("/elections/<election_id>/open")]
fn open_election(
    token: AuthToken<Owner>,
    election_id: ElectionId,
    ledger: &State<Ledger>,
) -> Result<Json<ElectionDescription>> {
    ledger.open(&token.address, election_id)?;
    let view = ledger.election(election_id)?;
    Ok(Json(view.as_ref().into()))
}

#[post("/elections/<election_id>/close")]
fn close_election(
    token: AuthToken<Owner>,
    election_id: ElectionId,
    ledger: &State<Ledger>,
) -> Result<Json<ElectionDescription>> {
    ledger.close(&token.address, election_id)?;
    let view = ledger.election(election_id)?;
    Ok(Json(view.as_ref().into()))
}

/// Request the reveal of one choice. With self-relay on, this server also
/// fetches the decryption and resolves the reveal in the background.
#[post("/elections/<election_id>/choices/<choice>/reveal")]
fn request_reveal(
    token: AuthToken<Owner>,
    election_id: ElectionId,
    choice: ChoiceIndex,
    ledger: &State<Ledger>,
    relay: &State<RelayCoordinator>,
    config: &State<Config>,
) -> Result<Json<RevealReceipt>> {
    // Arm before requesting so the request event cannot be missed.
    let task = config
        .self_relay()
        .then(|| relay.arm(election_id, choice));
    let handle = ledger.request_reveal(&token.address, election_id, choice)?;

    let relayed = task.is_some();
    if let Some(task) = task {
        tokio::spawn(async move {
            if let Err(e) = task.await {
                warn!("Reveal of election {election_id} choice {choice} must be resolved manually: {e}");
            }
        });
    }

    Ok(Json(RevealReceipt {
        election_id,
        choice_index: choice,
        handle,
        relayed,
    }))
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::Client,
        serde::json::serde_json::{self, json},
    };

    use std::time::Duration;

    use crate::model::{
        common::election::ElectionState,
        ledger::{LedgerEvent, RevealState},
        oracle::{EncryptedInput, LocalOracle},
    };
    use crate::test_support::create_election;

    use super::*;

    fn new_election(oracle: &LocalOracle, choices: &[&str]) -> NewElection {
        NewElection {
            title: "Favourite colour".to_string(),
            choices: choices.iter().map(|c| c.to_string()).collect(),
            zero_ciphertexts: choices.iter().map(|_| oracle.encrypt(0)).collect(),
        }
    }

    #[backend_test(owner)]
    async fn create_election_as_owner(client: Client, ledger: Ledger, oracle: LocalOracle) {
        let response = client
            .post(uri!(create_election))
            .header(ContentType::JSON)
            .body(json!(new_election(&oracle, &["Red", "Green", "Blue"])).to_string())
            .dispatch()
            .await;

        assert_eq!(Status::Ok, response.status());
        let created: ElectionDescription =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(created.id, 1);
        assert_eq!(created.title, "Favourite colour");
        assert_eq!(created.choices, ["Red", "Green", "Blue"]);
        assert_eq!(created.state, ElectionState::Created);
        assert_eq!(created.reveals.len(), 3);
        assert_eq!(ledger.elections().len(), 1);
    }

    #[backend_test(owner)]
    async fn create_election_invalid(client: Client, ledger: Ledger, oracle: LocalOracle) {
        // Too few choices.
        let response = client
            .post(uri!(create_election))
            .header(ContentType::JSON)
            .body(json!(new_election(&oracle, &["Red"])).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());

        // One zero short.
        let mut spec = new_election(&oracle, &["Red", "Blue"]);
        spec.zero_ciphertexts.pop();
        let response = client
            .post(uri!(create_election))
            .header(ContentType::JSON)
            .body(json!(spec).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());

        // Forged input proof.
        let mut spec = new_election(&oracle, &["Red", "Blue"]);
        spec.zero_ciphertexts[1] = EncryptedInput {
            input_proof: vec![0; 32].into(),
            ..spec.zero_ciphertexts[1].clone()
        };
        let response = client
            .post(uri!(create_election))
            .header(ContentType::JSON)
            .body(json!(spec).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());

        // A seed that is not zero.
        let mut spec = new_election(&oracle, &["Red", "Blue"]);
        spec.zero_ciphertexts[0] = oracle.encrypt(500);
        let response = client
            .post(uri!(create_election))
            .header(ContentType::JSON)
            .body(json!(spec).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());

        assert!(ledger.elections().is_empty());
    }

    #[backend_test(voter)]
    async fn create_election_as_voter(client: Client, ledger: Ledger, oracle: LocalOracle) {
        let response = client
            .post(uri!(create_election))
            .header(ContentType::JSON)
            .body(json!(new_election(&oracle, &["Red", "Blue"])).to_string())
            .dispatch()
            .await;

        assert_eq!(Status::NotFound, response.status());
        assert!(ledger.elections().is_empty());
    }

    #[backend_test(owner)]
    async fn lifecycle_as_owner(client: Client, ledger: Ledger, oracle: LocalOracle) {
        let id = create_election(&ledger, &oracle, &["Red", "Blue"]);

        // Cannot close before opening.
        let response = client.post(uri!(close_election(id))).dispatch().await;
        assert_eq!(Status::Conflict, response.status());

        let response = client.post(uri!(open_election(id))).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let opened: ElectionDescription =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(opened.state, ElectionState::Open);

        // Opening twice is a state error.
        let response = client.post(uri!(open_election(id))).dispatch().await;
        assert_eq!(Status::Conflict, response.status());

        let response = client.post(uri!(close_election(id))).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        assert_eq!(ledger.election(id).unwrap().state, ElectionState::Closed);

        let response = client.post(uri!(open_election(99))).dispatch().await;
        assert_eq!(Status::NotFound, response.status());
    }

    #[backend_test(owner)]
    async fn request_reveal_as_owner(client: Client, ledger: Ledger, oracle: LocalOracle) {
        let id = create_election(&ledger, &oracle, &["Red", "Blue"]);

        // Not closed yet.
        let response = client.post(uri!(request_reveal(id, 0))).dispatch().await;
        assert_eq!(Status::Conflict, response.status());

        let owner = crate::test_support::owner().address();
        ledger.open(&owner, id).unwrap();
        ledger.close(&owner, id).unwrap();

        let response = client.post(uri!(request_reveal(id, 0))).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let receipt: RevealReceipt =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        // Test servers do not self-relay.
        assert!(!receipt.relayed);
        let view = ledger.election(id).unwrap();
        assert_eq!(view.reveals[0].state, RevealState::Requested);
        assert_eq!(view.reveals[0].expected_handle, Some(receipt.handle));

        // A second request for the same choice is refused.
        let response = client.post(uri!(request_reveal(id, 0))).dispatch().await;
        assert_eq!(Status::Conflict, response.status());

        let response = client.post(uri!(request_reveal(id, 2))).dispatch().await;
        assert_eq!(Status::BadRequest, response.status());
    }

    #[rocket::async_test]
    async fn request_reveal_self_relays() {
        let figment = crate::test_figment().merge(("self_relay", true));
        let client = Client::tracked(crate::rocket_with_figment(figment))
            .await
            .unwrap();
        crate::test_support::sign_in(&client, &crate::test_support::owner()).await;
        let ledger = client.rocket().state::<Ledger>().unwrap().clone();
        let oracle = client.rocket().state::<LocalOracle>().unwrap().clone();

        let id = create_election(&ledger, &oracle, &["Red", "Blue"]);
        let owner = crate::test_support::owner().address();
        let voter = crate::test_support::voter().address();
        ledger.open(&owner, id).unwrap();
        ledger.cast_vote(&voter, id, 1, &oracle.encrypt(1)).unwrap();
        ledger.close(&owner, id).unwrap();
        let mut events = ledger.subscribe();

        let response = client.post(uri!(request_reveal(id, 1))).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let receipt: RevealReceipt =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert!(receipt.relayed);

        let revealed = rocket::tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Ok(LedgerEvent::ChoiceRevealed {
                    id: revealed_id,
                    choice_index: 1,
                    vote_count,
                }) = events.recv().await
                {
                    if revealed_id == id {
                        return vote_count;
                    }
                }
            }
        })
        .await
        .expect("relay did not resolve the reveal");
        assert_eq!(revealed, 1);

        let view = ledger.election(id).unwrap();
        assert_eq!(view.reveals[1].state, RevealState::Resolved);
        assert_eq!(view.reveals[1].count, Some(1));
        assert_eq!(view.reveals[0].state, RevealState::NotRequested);
    }
}
