use std::fmt::Display;

use serde_repr::{Deserialize_repr, Serialize_repr};

/// A kind of signed-in user, having defined rights.
pub trait User {
    /// The rights of this user type.
    const RIGHTS: Rights;
}

/// The election owner.
pub struct Owner;

/// Anyone else who signed in with a wallet.
pub struct Voter;

/// Different privilege levels.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum Rights {
    Voter = 0,
    Owner = 1,
}

impl Rights {
    /// Do these rights include `target`? The owner may also act as a voter.
    pub fn includes(self, target: Rights) -> bool {
        self == target || self == Rights::Owner
    }
}

impl Display for Rights {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "{}",
            match self {
                Self::Voter => "voter",
                Self::Owner => "owner",
            }
        )
    }
}

impl User for Voter {
    const RIGHTS: Rights = Rights::Voter;
}

impl User for Owner {
    const RIGHTS: Rights = Rights::Owner;
}
