use serde::{Deserialize, Serialize};

/// Query of `GET /nonce`.
#[derive(Debug, Clone, FromForm)]
pub struct NonceRequest {
    #[field(name = "resourceId")]
    pub resource_id: String,
}

/// Reply of `POST /toggle-hidden`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleHiddenResponse {
    pub success: bool,
    pub hidden: bool,
}
