// Messages exchanged between a draft session and whatever drives it
// (CLI, UI, tests).

use serde::Serialize;

use crate::draft::finalize::FinalizeReport;
use crate::draft::pick::DraftPick;
use crate::draft::state::{DraftState, DraftStatus};

/// Commands accepted by the draft session queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftCommand {
    Start,
    /// Manual pick for the team on the clock.
    Pick { participant_id: String },
    /// Pick clock tick. `generation` identifies the clock run that sent it;
    /// ticks from a superseded run are dropped.
    Tick { generation: u64 },
    /// Re-submit the finalize batches of a completed draft.
    Finalize,
    Cancel,
}

/// Updates emitted by the draft session.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DraftUpdate {
    Started { snapshot: DraftSnapshot },
    Picked { pick: DraftPick, snapshot: DraftSnapshot },
    Tick { seconds_remaining: u32 },
    Rejected { reason: String },
    Completed { snapshot: DraftSnapshot },
    Finalized { report: FinalizeReport },
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvailableParticipant {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeamSnapshot {
    pub id: String,
    pub name: String,
    pub color: String,
    pub manager: Option<String>,
    pub picks: Vec<DraftPick>,
}

/// Read-only view of a draft for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DraftSnapshot {
    pub game_id: String,
    pub status: DraftStatus,
    pub round: u32,
    pub pick_number: u32,
    /// Id of the team on the clock, while the draft runs.
    pub on_the_clock: Option<String>,
    pub seconds_remaining: u32,
    pub available: Vec<AvailableParticipant>,
    pub teams: Vec<TeamSnapshot>,
}

impl DraftSnapshot {
    pub fn from_state(state: &DraftState) -> Self {
        DraftSnapshot {
            game_id: state.game_id.clone(),
            status: state.status,
            round: state.round,
            pick_number: state.pick_number,
            on_the_clock: state.current_team().map(|t| t.id.clone()),
            seconds_remaining: state.seconds_remaining,
            available: state
                .available
                .iter()
                .map(|p| AvailableParticipant {
                    id: p.id.clone(),
                    name: p.name(),
                })
                .collect(),
            teams: state
                .teams
                .iter()
                .map(|t| TeamSnapshot {
                    id: t.id.clone(),
                    name: t.name.clone(),
                    color: t.color.clone(),
                    manager: t.manager.as_ref().map(|m| m.name()),
                    picks: t.picks.clone(),
                })
                .collect(),
        }
    }
}
