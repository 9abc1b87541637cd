use std::sync::Arc;

use chrono::Duration;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::model::{
    common::Address,
    ledger::Ledger,
    nonce::{NonceAuthority, NonceSweeper, PersonalSign},
    oracle::{ComputeOracle, DecryptionOracle, LocalOracle},
};
use crate::relay::RelayCoordinator;

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    owner_address: Address,
    auth_ttl: u32,
    nonce_ttl: u32,
    nonce_sweep_interval: u32,
    self_relay: bool,
    oracle_url: Option<String>,
    // secrets
    jwt_secret: String,
    oracle_secret: String,
}

impl Config {
    /// The single election authority.
    pub fn owner_address(&self) -> Address {
        self.owner_address
    }

    /// Valid lifetime of auth token cookies in seconds.
    pub fn auth_ttl(&self) -> Duration {
        Duration::seconds(self.auth_ttl.into())
    }

    /// Valid lifetime of a nonce in seconds.
    pub fn nonce_ttl(&self) -> Duration {
        Duration::seconds(self.nonce_ttl.into())
    }

    /// Seconds between sweeps of expired nonces.
    pub fn nonce_sweep_interval(&self) -> Duration {
        Duration::seconds(self.nonce_sweep_interval.into())
    }

    /// Should an owner's reveal request also relay the decryption?
    pub fn self_relay(&self) -> bool {
        self.self_relay
    }

    /// Base URL of a remote decryption service. Must be unset while the
    /// bundled oracle computes the tallies.
    pub fn oracle_url(&self) -> Option<&str> {
        self.oracle_url.as_deref()
    }

    /// Secret key used to encrypt JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }

    /// Key material of the bundled oracle.
    pub fn oracle_secret(&self) -> &[u8] {
        self.oracle_secret.as_bytes()
    }
}

/// A fairing that loads the application config and puts it in managed state.
/// This could easily be achieved using `AdHoc::config`, but is written out
/// explicitly for symmetry with the other fairings and control over error
/// messages.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        info!("Election owner is {}", config.owner_address());

        // Manage the state.
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Both views of the oracle, as used by the ledger and the relay.
#[derive(Clone)]
pub struct Oracles {
    pub compute: Arc<dyn ComputeOracle>,
    pub decryption: Arc<dyn DecryptionOracle>,
}

/// A fairing that sets up the oracle and places `Oracles` and the bundled
/// `LocalOracle` into managed state.
/// This fairing depends on `Config`, and so must be attached after
/// `ConfigFairing`.
pub struct OracleFairing;

#[rocket::async_trait]
impl Fairing for OracleFairing {
    fn info(&self) -> Info {
        Info {
            name: "Oracle",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let Some(config) = rocket.state::<Config>() else {
            error!("Oracle requires the application config");
            return Err(rocket);
        };
        // Tally handles only exist inside the oracle that computed them, so a
        // remote service cannot decrypt what the bundled oracle holds.
        if let Some(url) = config.oracle_url() {
            error!(
                "oracle_url is set to {url}, but tallies are computed by the bundled oracle, \
                 which is the only one able to decrypt them. Unset oracle_url."
            );
            return Err(rocket);
        }

        let local = LocalOracle::new(config.oracle_secret());
        warn!("Using the bundled development oracle; tallies are NOT confidential");
        let oracles = Oracles {
            compute: Arc::new(local.clone()),
            decryption: Arc::new(local.clone()),
        };

        // Manage the state.
        rocket = rocket.manage(oracles).manage(local);
        Ok(rocket)
    }
}

/// A fairing that creates the election ledger and places it into managed
/// state. Depends on `Config` and `Oracles`.
pub struct LedgerFairing;

#[rocket::async_trait]
impl Fairing for LedgerFairing {
    fn info(&self) -> Info {
        Info {
            name: "Ledger",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let (Some(config), Some(oracles)) = (rocket.state::<Config>(), rocket.state::<Oracles>())
        else {
            error!("Ledger requires the application config and the oracle");
            return Err(rocket);
        };
        let ledger = Ledger::new(config.owner_address(), oracles.compute.clone());

        rocket = rocket.manage(ledger);
        Ok(rocket)
    }
}

/// A fairing that creates the nonce authority, schedules its sweeper, and
/// places both into managed state. Depends on `Config`.
pub struct NonceFairing;

#[rocket::async_trait]
impl Fairing for NonceFairing {
    fn info(&self) -> Info {
        Info {
            name: "Nonces",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let Some(config) = rocket.state::<Config>() else {
            error!("Nonces require the application config");
            return Err(rocket);
        };
        let authority = NonceAuthority::new(config.nonce_ttl(), Arc::new(PersonalSign));
        let sweeper = NonceSweeper::start(authority.clone(), config.nonce_sweep_interval()).await;
        debug!(
            "Sweeping expired nonces every {} seconds",
            config.nonce_sweep_interval().num_seconds()
        );

        rocket = rocket.manage(authority).manage(sweeper);
        Ok(rocket)
    }
}

/// A fairing that places a `RelayCoordinator` into managed state.
/// Depends on `Oracles` and `Ledger`.
pub struct RelayFairing;

#[rocket::async_trait]
impl Fairing for RelayFairing {
    fn info(&self) -> Info {
        Info {
            name: "Relay",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let (Some(ledger), Some(oracles)) = (rocket.state::<Ledger>(), rocket.state::<Oracles>())
        else {
            error!("Relay requires the ledger and the oracle");
            return Err(rocket);
        };
        let relay = RelayCoordinator::new(ledger.clone(), oracles.decryption.clone());

        rocket = rocket.manage(relay);
        Ok(rocket)
    }
}
