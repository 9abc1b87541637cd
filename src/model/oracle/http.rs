use std::time::Duration;

use rocket::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::common::HexBytes;

use super::{Decryption, DecryptionOracle, HandleId, OracleError};

/// Client for a remote public-decryption service.
///
/// Each call is a single attempt. The only timeout is the HTTP-level one
/// configured here, so an outage surfaces to the caller immediately.
pub struct HttpOracle {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct PublicDecryptRequest<'a> {
    handles: [&'a HandleId; 1],
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublicDecryptResponse {
    cleartexts: HexBytes,
    decryption_proof: HexBytes,
}

impl HttpOracle {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, OracleError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl DecryptionOracle for HttpOracle {
    async fn public_decrypt(&self, handle: &HandleId) -> Result<Decryption, OracleError> {
        let url = format!("{}/v1/public-decrypt", self.base_url);
        debug!("Requesting public decryption of {handle} from {url}");
        let response: PublicDecryptResponse = self
            .client
            .post(url)
            .json(&PublicDecryptRequest { handles: [handle] })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        if response.decryption_proof.is_empty() {
            return Err(OracleError::Protocol("empty decryption proof".to_string()));
        }
        Ok(Decryption {
            cleartext: response.cleartexts,
            proof: response.decryption_proof,
        })
    }
}
