use rocket::{serde::json::Json, Route, State};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            auth::{AuthToken, Owner},
            election::{ElectionDescription, ElectionResults, ElectionSummary},
            reveal::{RevealSubmission, RevealedChoice},
        },
        common::election::{ChoiceIndex, ElectionId},
        ledger::{Ledger, LedgerEvent, Winner},
    },
};

pub fn routes() -> Vec<Route> {
    routes![
        elections_owner,
        elections_public,
        election_owner,
        election_public,
        election_results,
        election_winner,
        election_events,
        resolve_reveal,
    ]
}

#[get("/elections", rank = 1)]
fn elections_owner(_token: AuthToken<Owner>, ledger: &State<Ledger>) -> Json<Vec<ElectionSummary>> {
    summaries(ledger, true)
}

#[get("/elections", rank = 2)]
fn elections_public(ledger: &State<Ledger>) -> Json<Vec<ElectionSummary>> {
    summaries(ledger, false)
}

fn summaries(ledger: &Ledger, include_hidden: bool) -> Json<Vec<ElectionSummary>> {
    let elections = ledger
        .elections()
        .iter()
        .filter(|view| include_hidden || !view.hidden)
        .map(|view| view.as_ref().into())
        .collect();
    Json(elections)
}

#[get("/elections/<election_id>", rank = 1)]
fn election_owner(
    _token: AuthToken<Owner>,
    election_id: ElectionId,
    ledger: &State<Ledger>,
) -> Result<Json<ElectionDescription>> {
    let view = ledger.election(election_id)?;
    Ok(Json(view.as_ref().into()))
}

#[get("/elections/<election_id>", rank = 2)]
fn election_public(
    election_id: ElectionId,
    ledger: &State<Ledger>,
) -> Result<Json<ElectionDescription>> {
    let view = ledger.election(election_id)?;
    if view.hidden {
        return Err(Error::not_found(format!("Election with ID '{election_id}'")));
    }
    Ok(Json(view.as_ref().into()))
}

/// Counts revealed so far. Unrevealed choices are `null`.
#[get("/elections/<election_id>/results")]
fn election_results(
    election_id: ElectionId,
    ledger: &State<Ledger>,
) -> Result<Json<ElectionResults>> {
    let view = ledger.election(election_id)?;
    Ok(Json(view.as_ref().into()))
}

#[get("/elections/<election_id>/winner")]
fn election_winner(election_id: ElectionId, ledger: &State<Ledger>) -> Result<Json<Winner>> {
    Ok(Json(ledger.winner(election_id)?))
}

#[get("/elections/<election_id>/events")]
fn election_events(
    election_id: ElectionId,
    ledger: &State<Ledger>,
) -> Result<Json<Vec<LedgerEvent>>> {
    Ok(Json(ledger.events(election_id)?))
}

/// Submit the public decryption of a requested choice. Anyone may do this;
/// the proof alone decides whether the count is accepted.
#[post(
    "/elections/<election_id>/choices/<choice>/resolve",
    data = "<submission>",
    format = "json"
)]
fn resolve_reveal(
    election_id: ElectionId,
    choice: ChoiceIndex,
    submission: Json<RevealSubmission>,
    ledger: &State<Ledger>,
) -> Result<Json<RevealedChoice>> {
    let submission = submission.into_inner();
    let vote_count = ledger.resolve_reveal(
        election_id,
        choice,
        &submission.cleartext,
        &submission.decryption_proof,
    )?;
    info!("Election {election_id} choice {choice} revealed: {vote_count} votes");
    Ok(Json(RevealedChoice {
        election_id,
        choice_index: choice,
        vote_count,
    }))
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::Client,
        serde::json::serde_json::{self, json},
    };

    use crate::{
        model::{
            common::{
                election::ElectionState,
                Address,
            },
            oracle::{encode_count, DecryptionOracle, HandleId, LocalOracle},
        },
        test_support::{create_election, other_voter, owner, voter},
    };

    use super::*;

    /// Run an election with one vote per `(voter, choice)`, then close it.
    fn closed_election(
        ledger: &Ledger,
        oracle: &LocalOracle,
        labels: &[&str],
        votes: &[(Address, ChoiceIndex)],
    ) -> ElectionId {
        let id = create_election(ledger, oracle, labels);
        ledger.open(&owner().address(), id).unwrap();
        for (voter, choice) in votes {
            ledger
                .cast_vote(voter, id, *choice, &oracle.encrypt(1))
                .unwrap();
        }
        ledger.close(&owner().address(), id).unwrap();
        id
    }

    async fn resolve(
        client: &Client,
        id: ElectionId,
        choice: ChoiceIndex,
        submission: &RevealSubmission,
    ) -> (Status, String) {
        let response = client
            .post(uri!(resolve_reveal(id, choice)))
            .header(ContentType::JSON)
            .body(json!(submission).to_string())
            .dispatch()
            .await;
        (response.status(), response.into_string().await.unwrap_or_default())
    }

    async fn decrypt(oracle: &LocalOracle, handle: &HandleId) -> RevealSubmission {
        let decryption = oracle.public_decrypt(handle).await.unwrap();
        RevealSubmission {
            cleartext: decryption.cleartext,
            decryption_proof: decryption.proof,
        }
    }

    #[backend_test]
    async fn full_reveal_over_http(client: Client, ledger: Ledger, oracle: LocalOracle) {
        let votes = [
            (voter().address(), 1),
            (other_voter().address(), 1),
            (owner().address(), 0),
        ];
        let id = closed_election(&ledger, &oracle, &["Red", "Green", "Blue"], &votes);

        let mut expected = Vec::new();
        for (choice, count) in [(0, 1), (1, 2), (2, 0)] {
            let handle = ledger.request_reveal(&owner().address(), id, choice).unwrap();
            let (status, body) = resolve(&client, id, choice, &decrypt(&oracle, &handle).await).await;
            assert_eq!(Status::Ok, status);
            let revealed: RevealedChoice = serde_json::from_str(&body).unwrap();
            assert_eq!(
                revealed,
                RevealedChoice {
                    election_id: id,
                    choice_index: choice,
                    vote_count: count,
                }
            );
            expected.push(Some(count));

            // Winner only exists once everything is revealed.
            let response = client.get(uri!(election_winner(id))).dispatch().await;
            let status = if choice == 2 { Status::Ok } else { Status::Conflict };
            assert_eq!(status, response.status());
        }

        let response = client.get(uri!(election_results(id))).dispatch().await;
        let results: ElectionResults =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(results.counts, expected);
        assert!(results.fully_revealed);
        assert_eq!(
            results.winner,
            Some(Winner {
                choice_index: 1,
                vote_count: 2
            })
        );

        let response = client.get(uri!(election_winner(id))).dispatch().await;
        let winner: Winner = serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(winner.choice_index, 1);

        let response = client.get(uri!(election_public(id))).dispatch().await;
        let description: ElectionDescription =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(description.state, ElectionState::Revealed);
        assert_eq!(description.voter_count, 3);
        assert_eq!(description.revealed_choice_count, 3);

        let response = client.get(uri!(election_events(id))).dispatch().await;
        let events: Vec<LedgerEvent> =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(events.len(), 1 + 1 + 3 + 1 + 3 + 3 + 1);
        assert!(matches!(events[0], LedgerEvent::ElectionCreated { .. }));
        assert_eq!(events.last(), Some(&LedgerEvent::ElectionFullyRevealed { id }));
    }

    #[backend_test]
    async fn partial_results(client: Client, ledger: Ledger, oracle: LocalOracle) {
        let id = closed_election(&ledger, &oracle, &["Red", "Blue"], &[(voter().address(), 1)]);
        let handle = ledger.request_reveal(&owner().address(), id, 1).unwrap();
        let (status, _) = resolve(&client, id, 1, &decrypt(&oracle, &handle).await).await;
        assert_eq!(Status::Ok, status);

        let response = client.get(uri!(election_results(id))).dispatch().await;
        let results: ElectionResults =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(results.counts, vec![None, Some(1)]);
        assert!(!results.fully_revealed);
        assert_eq!(results.winner, None);
    }

    #[backend_test]
    async fn resolve_rejects_bad_submissions(client: Client, ledger: Ledger, oracle: LocalOracle) {
        let id = closed_election(&ledger, &oracle, &["Red", "Blue"], &[(voter().address(), 0)]);

        // Not requested yet, even with a valid certificate for the tally.
        let handle = ledger.election(id).unwrap().current_handles[0];
        let early = RevealSubmission {
            cleartext: encode_count(1).into(),
            decryption_proof: oracle.certify(&[handle], &encode_count(1)),
        };
        let (status, _) = resolve(&client, id, 0, &early).await;
        assert_eq!(Status::Conflict, status);

        let handle = ledger.request_reveal(&owner().address(), id, 0).unwrap();
        let genuine = decrypt(&oracle, &handle).await;

        // A different count under the genuine proof.
        let forged = RevealSubmission {
            cleartext: encode_count(7).into(),
            decryption_proof: genuine.decryption_proof.clone(),
        };
        let (status, _) = resolve(&client, id, 0, &forged).await;
        assert_eq!(Status::UnprocessableEntity, status);

        // The genuine proof, submitted for the wrong choice.
        let (status, _) = resolve(&client, id, 1, &genuine).await;
        assert_eq!(Status::Conflict, status);

        let (status, _) = resolve(&client, id, 0, &genuine).await;
        assert_eq!(Status::Ok, status);
        assert_eq!(ledger.revealed_results(id).unwrap(), vec![Some(1), None]);

        // Once only.
        let (status, _) = resolve(&client, id, 0, &genuine).await;
        assert_eq!(Status::Conflict, status);

        let (status, _) = resolve(&client, id + 1, 0, &genuine).await;
        assert_eq!(Status::NotFound, status);
    }

    #[backend_test]
    async fn hidden_elections_not_listed(client: Client, ledger: Ledger, oracle: LocalOracle) {
        let shown = create_election(&ledger, &oracle, &["Red", "Blue"]);
        let hidden = create_election(&ledger, &oracle, &["Cats", "Dogs"]);
        ledger.toggle_hidden(&owner().address(), hidden).unwrap();

        let response = client.get(uri!(elections_public)).dispatch().await;
        let listed: Vec<ElectionSummary> =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, shown);

        let response = client.get(uri!(election_public(hidden))).dispatch().await;
        assert_eq!(Status::NotFound, response.status());

        // Hiding is presentation only: results stay public.
        let response = client.get(uri!(election_results(hidden))).dispatch().await;
        assert_eq!(Status::Ok, response.status());
    }

    #[backend_test(owner)]
    async fn hidden_elections_visible_to_owner(client: Client, ledger: Ledger, oracle: LocalOracle) {
        let id = create_election(&ledger, &oracle, &["Red", "Blue"]);
        ledger.toggle_hidden(&owner().address(), id).unwrap();

        let response = client.get(uri!(elections_owner)).dispatch().await;
        let listed: Vec<ElectionSummary> =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].hidden);

        let response = client.get(uri!(election_owner(id))).dispatch().await;
        assert_eq!(Status::Ok, response.status());
    }

    #[backend_test(voter)]
    async fn hidden_elections_not_visible_to_voter(client: Client, ledger: Ledger, oracle: LocalOracle) {
        let id = create_election(&ledger, &oracle, &["Red", "Blue"]);
        ledger.toggle_hidden(&owner().address(), id).unwrap();

        let response = client.get(uri!(elections_public)).dispatch().await;
        let listed: Vec<ElectionSummary> =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert!(listed.is_empty());

        let response = client.get(uri!(election_public(id))).dispatch().await;
        assert_eq!(Status::NotFound, response.status());
    }
}
