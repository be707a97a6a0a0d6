pub mod clock;
pub mod finalize;
pub mod participant;
pub mod pick;
pub mod roster;
pub mod session;
pub mod state;

use thiserror::Error;

use state::DraftStatus;

/// Draft setup and transition errors. A rejected event leaves the state
/// exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DraftError {
    #[error("expected {expected} teams, got {actual}")]
    WrongTeamCount { expected: usize, actual: usize },

    #[error("team {0} selected more than once")]
    DuplicateTeam(String),

    #[error("no participants are available to draft")]
    EmptyPool,

    #[error("draft has already started")]
    AlreadyStarted,

    #[error("draft is not in progress (status: {0:?})")]
    NotInProgress(DraftStatus),

    #[error("participant {0} is not in the available pool")]
    UnknownParticipant(String),

    #[error("draft is not completed yet")]
    NotCompleted,
}
