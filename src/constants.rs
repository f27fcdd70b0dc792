//! Configuration constants for the game session
//!
//! This module contains the tunable limits and constraints used
//! throughout the session engine: round timing, movement conversion,
//! question generation ranges, and join validation bounds.

/// Round timing and movement conversion constants
pub mod round {
    /// Length of a round countdown in seconds
    pub const DURATION_SECONDS: u64 = 30;
    /// Maximum number of board spaces a piece may advance per round
    pub const MAX_MOVES_PER_ROUND: u32 = 5;
    /// Score points required per board space in the per-player formula
    pub const SCORE_PER_SPACE: u32 = 6;
    /// Rosters smaller than this use the per-player movement formula
    pub const SMALL_ROSTER_LIMIT: usize = 3;
}

/// Question generation constants
pub mod question {
    /// Smallest operand used in a generated arithmetic challenge
    pub const MIN_OPERAND: i64 = 1;
    /// Largest operand used in a generated arithmetic challenge
    pub const MAX_OPERAND: i64 = 10;
    /// Number of candidate answers presented per question
    pub const OPTION_COUNT: usize = 4;
    /// Score awarded for an instant correct answer, decaying by one per second
    pub const MAX_SCORE: u32 = 10;
}

/// Join request validation constants
pub mod roster {
    /// Maximum length of a display name in characters
    pub const MAX_NAME_LENGTH: usize = 30;
    /// Smallest valid board piece identifier
    pub const MIN_PIECE: u8 = 1;
    /// Largest valid board piece identifier
    pub const MAX_PIECE: u8 = 16;
}
