//! Types shared between the ledger, the API and the oracle adapters.

mod address;
mod bytes;
pub mod election;

pub use address::{Address, AddressParseError};
pub use bytes::HexBytes;
