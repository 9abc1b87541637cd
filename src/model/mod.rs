pub mod api;
pub mod common;
pub mod ledger;
pub mod nonce;
pub mod oracle;
