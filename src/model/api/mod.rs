//! API-compatible types.
//!
//! The types in this module are serialised in an API-friendly way, e.g.:
//!
//! - Field names are camelCase.
//! - Handles, addresses and byte strings are `0x`-prefixed hex.

pub mod auth;
pub mod ballot;
pub mod election;
pub mod nonce;
pub mod reveal;
