mod state;

pub use state::ElectionState;

/// Our election IDs are sequential integers, starting at 1.
pub type ElectionId = u32;
/// Index of a choice within an election's ordered choice list.
pub type ChoiceIndex = u32;
/// A decrypted per-choice vote count. Tallies are 32-bit accumulators.
pub type VoteCount = u32;

/// Minimum number of choices an election may offer.
pub const MIN_CHOICES: usize = 2;
/// Maximum number of choices an election may offer.
pub const MAX_CHOICES: usize = 10;
