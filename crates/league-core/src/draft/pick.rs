// Individual pick representation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a pick came from the user or from the expired pick clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PickSource {
    Manual,
    Auto,
}

impl fmt::Display for PickSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PickSource::Manual => write!(f, "manual"),
            PickSource::Auto => write!(f, "auto"),
        }
    }
}

/// A pick as recorded during live play.
///
/// `round` and `provisional_pick` are assigned at selection time; the final
/// overall number is only given out by the finalizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftPick {
    pub participant_id: String,
    pub participant_name: String,
    pub team_id: String,
    pub team_name: String,
    pub round: u32,
    pub provisional_pick: u32,
    pub source: PickSource,
}

/// A pick in its persisted form. `(game_id, overall_pick)` is the natural key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalPick {
    pub game_id: String,
    pub participant_id: String,
    pub team_id: String,
    pub round: u32,
    pub overall_pick: u32,
}
