//! Discrete action repertoire shared by every decision policy.

use thiserror::Error;

/// Number of distinct actions an agent can take.
pub const NUM_ACTIONS: usize = 22;

/// Errors raised while decoding an action identifier.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ActionError {
    #[error("unknown action identifier {0}")]
    UnknownAction(u8),
}

/// One atomic command an agent can issue in a tick.
///
/// Identifiers are stable so externally produced decisions (serialized
/// policies, operator input) decode to the same behavior across versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Action {
    Forward = 0,
    Backward = 1,
    Left = 2,
    Right = 3,
    TongueOut = 4,
    TongueIn = 5,
    TongueLeft = 6,
    TongueRight = 7,
    Eat = 8,
    MateHead = 9,
    MateTail = 10,
    Grow = 11,
    PheromoneIncColor = 12,
    PheromoneDecColor = 13,
    PheromoneRelease = 14,
    HeadIncColor = 15,
    HeadDecColor = 16,
    TailIncColor = 17,
    TailDecColor = 18,
    SoundIncFreq = 19,
    SoundDecFreq = 20,
    Chirp = 21,
}

impl Action {
    /// Every action, in identifier order.
    pub const ALL: [Action; NUM_ACTIONS] = [
        Action::Forward,
        Action::Backward,
        Action::Left,
        Action::Right,
        Action::TongueOut,
        Action::TongueIn,
        Action::TongueLeft,
        Action::TongueRight,
        Action::Eat,
        Action::MateHead,
        Action::MateTail,
        Action::Grow,
        Action::PheromoneIncColor,
        Action::PheromoneDecColor,
        Action::PheromoneRelease,
        Action::HeadIncColor,
        Action::HeadDecColor,
        Action::TailIncColor,
        Action::TailDecColor,
        Action::SoundIncFreq,
        Action::SoundDecFreq,
        Action::Chirp,
    ];
}

impl TryFrom<u8> for Action {
    type Error = ActionError;

    fn try_from(id: u8) -> Result<Self, ActionError> {
        Action::ALL
            .get(id as usize)
            .copied()
            .ok_or(ActionError::UnknownAction(id))
    }
}
