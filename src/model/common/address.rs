use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;

use data_encoding::{DecodeError, HEXLOWER, HEXLOWER_PERMISSIVE};
use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// A 20-byte account address, as recovered from a wallet signature.
///
/// Addresses are parsed case-insensitively (so checksummed input is accepted)
/// and always displayed in lowercase with a `0x` prefix.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; Address::LEN]);

impl Address {
    pub const LEN: usize = 20;

    pub const fn from_bytes(bytes: [u8; Self::LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; Self::LEN] {
        &self.0
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressParseError {
    #[error("address must start with `0x`")]
    MissingPrefix,
    #[error("address is not valid hex: {0}")]
    InvalidHex(#[from] DecodeError),
    #[error("address must be {} bytes, found {0}", Address::LEN)]
    WrongLength(usize),
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or(AddressParseError::MissingPrefix)?;
        let bytes = HEXLOWER_PERMISSIVE.decode(hex.as_bytes())?;
        let bytes: [u8; Self::LEN] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| AddressParseError::WrongLength(b.len()))?;
        Ok(Self(bytes))
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", HEXLOWER.encode(&self.0))
    }
}

impl Debug for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Address({self})")
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        let checksummed: Address = "0x2c7536E3605D9C16a7a3D7b1898e529396a65c23"
            .parse()
            .unwrap();
        let lower: Address = "0x2c7536e3605d9c16a7a3d7b1898e529396a65c23"
            .parse()
            .unwrap();
        assert_eq!(checksummed, lower);
        assert_eq!(
            checksummed.to_string(),
            "0x2c7536e3605d9c16a7a3d7b1898e529396a65c23"
        );
    }

    #[test]
    fn parse_rejects_malformed() {
        assert_eq!(
            "2c7536e3605d9c16a7a3d7b1898e529396a65c23".parse::<Address>(),
            Err(AddressParseError::MissingPrefix)
        );
        assert_eq!(
            "0x2c7536e3".parse::<Address>(),
            Err(AddressParseError::WrongLength(4))
        );
        assert!(matches!(
            "0xzz7536e3605d9c16a7a3d7b1898e529396a65c23".parse::<Address>(),
            Err(AddressParseError::InvalidHex(_))
        ));
    }
}
