use rocket::{serde::json::Json, Route, State};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            auth::SignedMessage,
            nonce::{NonceRequest, ToggleHiddenResponse},
        },
        ledger::Ledger,
        nonce::{IssuedNonce, NonceAuthority, ToggleHidden},
    },
};

pub fn routes() -> Vec<Route> {
    routes![issue_nonce, toggle_hidden]
}

#[get("/nonce?<request..>")]
fn issue_nonce(request: NonceRequest, nonces: &State<NonceAuthority>) -> Result<Json<IssuedNonce>> {
    if request.resource_id.trim().is_empty() {
        return Err(Error::BadRequest("resourceId must not be empty".to_string()));
    }
    Ok(Json(nonces.issue(request.resource_id)))
}

/// Flip an election's `hidden` flag. Always requires a fresh signature from
/// the owner's wallet; sessions are not accepted here.
#[post("/toggle-hidden", data = "<request>", format = "json")]
fn toggle_hidden(
    request: Json<SignedMessage>,
    nonces: &State<NonceAuthority>,
    ledger: &State<Ledger>,
) -> Result<Json<ToggleHiddenResponse>> {
    let request = request.into_inner();

    // The election is named by the signed message itself.
    let (signer, intent) = nonces.consume_and_verify_named::<ToggleHidden>(
        &request.nonce,
        &request.message,
        &request.signature,
    )?;

    let hidden = ledger.toggle_hidden(&signer, intent.election)?;
    info!("Election {} is now {}", intent.election, if hidden { "hidden" } else { "visible" });
    Ok(Json(ToggleHiddenResponse {
        success: true,
        hidden,
    }))
}
