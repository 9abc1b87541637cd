use rocket::{
    http::{Cookie, CookieJar, Status},
    serde::json::Json,
    Route, State,
};

use crate::{
    error::Result,
    model::{
        api::auth::{AuthToken, Rights, Session, SignedMessage, AUTH_TOKEN_COOKIE},
        nonce::{NonceAuthority, SignIn},
    },
    Config,
};

pub fn routes() -> Vec<Route> {
    routes![sign_in, logout]
}

/// Start a session for the wallet that signed a `session` nonce.
#[post("/auth/wallet", data = "<request>", format = "json")]
fn sign_in(
    request: Json<SignedMessage>,
    cookies: &CookieJar<'_>,
    nonces: &State<NonceAuthority>,
    config: &State<Config>,
) -> Result<Json<Session>> {
    let request = request.into_inner();
    let (address, _) = nonces.consume_and_verify::<SignIn>(
        &request.nonce,
        SignIn::RESOURCE,
        &request.message,
        &request.signature,
    )?;

    let (cookie, rights) = if address == config.owner_address() {
        (AuthToken::owner(config).into_cookie(config)?, Rights::Owner)
    } else {
        (AuthToken::voter(address).into_cookie(config)?, Rights::Voter)
    };
    cookies.add(cookie);
    debug!("Signed in {address} as {rights}");

    Ok(Json(Session { address, rights }))
}

#[delete("/auth")]
fn logout(cookies: &CookieJar) -> Status {
    cookies.remove(Cookie::named(AUTH_TOKEN_COOKIE));
    Status::Ok
}
