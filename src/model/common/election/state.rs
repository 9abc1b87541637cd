use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// States in the Election lifecycle.
///
/// Transitions only ever move forward:
/// `Created -> Open -> Closed -> Revealed`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ElectionState {
    /// Created by the owner, not yet accepting votes.
    Created,
    /// Accepting votes.
    Open,
    /// Tallies are frozen; choices may be revealed one at a time.
    Closed,
    /// Every choice has a verified cleartext count.
    Revealed,
}

impl ElectionState {
    /// The state this one advances to, if any.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Created => Some(Self::Open),
            Self::Open => Some(Self::Closed),
            Self::Closed => Some(Self::Revealed),
            Self::Revealed => None,
        }
    }
}

impl Display for ElectionState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Revealed => "revealed",
        };
        write!(f, "{name}")
    }
}
