use rocket::{serde::json::Json, Route, State};

use crate::{
    error::Result,
    model::{
        api::{
            auth::{AuthToken, Voter},
            ballot::{BallotSpec, OwnVote, VoteReceipt},
        },
        common::election::ElectionId,
        ledger::Ledger,
    },
};

pub fn routes() -> Vec<Route> {
    routes![cast_vote, own_vote]
}

/// Cast the caller's single vote in an open election.
#[post("/elections/<election_id>/votes", data = "<ballot>", format = "json")]
fn cast_vote(
    token: AuthToken<Voter>,
    election_id: ElectionId,
    ballot: Json<BallotSpec>,
    ledger: &State<Ledger>,
) -> Result<Json<VoteReceipt>> {
    let ballot = ballot.into_inner();
    let handle = ledger.cast_vote(&token.address, election_id, ballot.choice_index, &ballot.input)?;
    debug!("{} voted in election {election_id}", token.address);
    Ok(Json(VoteReceipt {
        election_id,
        handle,
    }))
}

#[get("/elections/<election_id>/votes/mine")]
fn own_vote(
    token: AuthToken<Voter>,
    election_id: ElectionId,
    ledger: &State<Ledger>,
) -> Result<Json<OwnVote>> {
    let record = ledger.own_vote(&token.address, election_id)?;
    Ok(Json(record.into()))
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::Client,
        serde::json::serde_json::{self, json},
    };

    use crate::{
        model::oracle::LocalOracle,
        test_support::{create_election, owner, voter},
    };

    use super::*;

    async fn vote(client: &Client, election_id: ElectionId, ballot: &BallotSpec) -> Status {
        client
            .post(uri!(cast_vote(election_id)))
            .header(ContentType::JSON)
            .body(json!(ballot).to_string())
            .dispatch()
            .await
            .status()
    }

    fn open_election(ledger: &Ledger, oracle: &LocalOracle) -> ElectionId {
        let id = create_election(ledger, oracle, &["Red", "Green", "Blue"]);
        ledger.open(&owner().address(), id).unwrap();
        id
    }

    #[backend_test(voter)]
    async fn cast_vote_once(client: Client, ledger: Ledger, oracle: LocalOracle) {
        let id = open_election(&ledger, &oracle);
        let ballot = BallotSpec {
            choice_index: 1,
            input: oracle.encrypt(1),
        };

        let response = client
            .post(uri!(cast_vote(id)))
            .header(ContentType::JSON)
            .body(json!(ballot).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let receipt: VoteReceipt =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(receipt.election_id, id);
        assert!(oracle.is_allowed(&receipt.handle, &voter().address()));
        assert_eq!(ledger.election(id).unwrap().voter_count, 1);

        // One vote per address, whatever the choice.
        let again = BallotSpec {
            choice_index: 0,
            input: oracle.encrypt(1),
        };
        assert_eq!(Status::Conflict, vote(&client, id, &again).await);
        assert_eq!(ledger.election(id).unwrap().voter_count, 1);
    }

    #[backend_test(voter)]
    async fn cast_vote_invalid(client: Client, ledger: Ledger, oracle: LocalOracle) {
        let id = open_election(&ledger, &oracle);

        let out_of_range = BallotSpec {
            choice_index: 3,
            input: oracle.encrypt(1),
        };
        assert_eq!(Status::BadRequest, vote(&client, id, &out_of_range).await);

        let mut forged = BallotSpec {
            choice_index: 0,
            input: oracle.encrypt(1),
        };
        forged.input.input_proof = vec![1; 32].into();
        assert_eq!(Status::BadRequest, vote(&client, id, &forged).await);

        let valid = BallotSpec {
            choice_index: 0,
            input: oracle.encrypt(1),
        };
        assert_eq!(Status::NotFound, vote(&client, id + 1, &valid).await);

        // None of the failures counted as a vote.
        assert_eq!(ledger.election(id).unwrap().voter_count, 0);
        assert_eq!(Status::Ok, vote(&client, id, &valid).await);
    }

    #[backend_test(voter)]
    async fn cast_vote_closed(client: Client, ledger: Ledger, oracle: LocalOracle) {
        let id = create_election(&ledger, &oracle, &["Red", "Blue"]);
        let ballot = BallotSpec {
            choice_index: 0,
            input: oracle.encrypt(1),
        };
        assert_eq!(Status::Conflict, vote(&client, id, &ballot).await);

        ledger.open(&owner().address(), id).unwrap();
        ledger.close(&owner().address(), id).unwrap();
        assert_eq!(Status::Conflict, vote(&client, id, &ballot).await);
    }

    #[backend_test]
    async fn cast_vote_unauthenticated(client: Client, ledger: Ledger, oracle: LocalOracle) {
        let id = open_election(&ledger, &oracle);
        let ballot = BallotSpec {
            choice_index: 0,
            input: oracle.encrypt(1),
        };
        assert_eq!(Status::NotFound, vote(&client, id, &ballot).await);
        assert_eq!(ledger.election(id).unwrap().voter_count, 0);
    }

    #[backend_test(voter)]
    async fn own_vote_after_voting(client: Client, ledger: Ledger, oracle: LocalOracle) {
        let id = open_election(&ledger, &oracle);

        let response = client.get(uri!(own_vote(id))).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let before: OwnVote = serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(
            before,
            OwnVote {
                has_voted: false,
                ciphertext_handle: None
            }
        );

        let ballot = BallotSpec {
            choice_index: 2,
            input: oracle.encrypt(1),
        };
        assert_eq!(Status::Ok, vote(&client, id, &ballot).await);

        let response = client.get(uri!(own_vote(id))).dispatch().await;
        let after: OwnVote = serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert!(after.has_voted);
        let handle = after.ciphertext_handle.unwrap();
        assert!(oracle.is_allowed(&handle, &voter().address()));
    }
}
