#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{figment::Figment, Build, Rocket};

use config::{ConfigFairing, LedgerFairing, NonceFairing, OracleFairing, RelayFairing};
use logging::{EventAuditFairing, LoggerFairing};

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod relay;
pub mod scheduled_task;

pub use config::Config;

/// Build the server from `Rocket.toml` and `ROCKET_*` environment variables.
pub fn build() -> Rocket<Build> {
    rocket_with_figment(rocket::Config::figment())
}

/// Attach order matters: each subsystem fairing reads the managed state of
/// the ones before it.
fn rocket_with_figment(figment: Figment) -> Rocket<Build> {
    rocket::custom(figment)
        .mount("/", api::routes())
        .attach(ConfigFairing)
        .attach(OracleFairing)
        .attach(LedgerFairing)
        .attach(NonceFairing)
        .attach(RelayFairing)
        .attach(LoggerFairing)
        .attach(EventAuditFairing)
}

/// An isolated server with fixed test configuration.
#[cfg(test)]
pub(crate) fn rocket_for_test() -> Rocket<Build> {
    rocket_with_figment(test_figment())
}

/// The test configuration, for tests that need to override part of it.
#[cfg(test)]
pub(crate) fn test_figment() -> Figment {
    log4rs_test_utils::test_logging::init_logging_once_for(["private_poll_backend"], None, None);

    rocket::Config::figment()
        .merge(("log_level", "off"))
        .merge(("owner_address", test_support::owner().address().to_string()))
        .merge(("jwt_secret", "test jwt secret"))
        .merge(("oracle_secret", "test oracle secret"))
        .merge(("auth_ttl", 3600))
        .merge(("nonce_ttl", 300))
        .merge(("nonce_sweep_interval", 60))
        .merge(("self_relay", false))
}


#[cfg(test)]
pub(crate) mod test_support {
    use rocket::{http::ContentType, local::asynchronous::Client, serde::json::serde_json::json};

    use crate::model::{
        api::auth::SignedMessage,
        common::{election::ElectionId, HexBytes},
        ledger::Ledger,
        nonce::{wallet::Wallet, IssuedNonce, SignIn},
        oracle::LocalOracle,
    };

    /// The configured election owner.
    pub fn owner() -> Wallet {
        Wallet::from_hex("0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318")
    }

    pub fn voter() -> Wallet {
        Wallet::from_hex("0x8da4ef21b864d2cc526dbdb2a120bd2874c36c9d0a1fb7f8c63d7f7a8b41de8f")
    }

    pub fn other_voter() -> Wallet {
        Wallet::from_hex("0x1111111111111111111111111111111111111111111111111111111111111111")
    }

    pub async fn fetch_nonce(client: &Client, resource_id: &str) -> IssuedNonce {
        let response = client
            .get(format!("/nonce?resourceId={resource_id}"))
            .dispatch()
            .await;
        let body = response.into_string().await.unwrap();
        let value: rocket::serde::json::Value =
            rocket::serde::json::serde_json::from_str(&body).unwrap();
        IssuedNonce {
            nonce: value["nonce"].as_str().unwrap().to_string(),
            resource_id: resource_id.to_string(),
            expires_at: value["expiresAt"].as_str().unwrap().parse().unwrap(),
        }
    }

    /// Sign `message` with `wallet` into a request body.
    pub fn signed(wallet: &Wallet, message: String, nonce: String) -> SignedMessage {
        let signature = HexBytes::from(wallet.sign(&message));
        SignedMessage {
            message,
            signature,
            nonce,
        }
    }

    /// Start a session for `wallet` on `client`.
    pub async fn sign_in(client: &Client, wallet: &Wallet) {
        let issued = fetch_nonce(client, SignIn::RESOURCE).await;
        let body = signed(wallet, SignIn::message(&issued.nonce), issued.nonce);
        let response = client
            .post("/auth/wallet")
            .header(ContentType::JSON)
            .body(json!(body).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), rocket::http::Status::Ok);
    }

    /// Create an election directly on the ledger, as the owner.
    pub fn create_election(ledger: &Ledger, oracle: &LocalOracle, labels: &[&str]) -> ElectionId {
        let zeros: Vec<_> = labels.iter().map(|_| oracle.encrypt(0)).collect();
        ledger
            .create(
                &owner().address(),
                "Favourite colour".to_string(),
                labels.iter().map(|label| label.to_string()).collect(),
                &zeros,
            )
            .unwrap()
    }
}
