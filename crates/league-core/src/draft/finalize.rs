// Turning a completed draft into persisted records.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::pick::FinalPick;
use super::state::{DraftState, DraftStatus};
use super::DraftError;
use crate::store::LeagueStore;

/// Participant moved onto a team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamAssignment {
    pub participant_id: String,
    pub team_id: String,
}

/// A team taking part in a game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamGame {
    pub game_id: String,
    pub team_id: String,
}

/// A participant taking part in a game. Stored under the `player_id` column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participation {
    pub game_id: String,
    #[serde(rename = "player_id")]
    pub participant_id: String,
    pub team_id: String,
}

/// The four independent write batches produced by a completed draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizePlan {
    pub game_id: String,
    pub assignments: Vec<TeamAssignment>,
    pub team_games: Vec<TeamGame>,
    pub participations: Vec<Participation>,
    pub picks: Vec<FinalPick>,
}

/// Build the write batches for a completed draft.
///
/// Overall pick numbers are the 1-based position of each pick after sorting
/// by provisional pick number; rounds are carried over unchanged.
pub fn plan(state: &DraftState) -> Result<FinalizePlan, DraftError> {
    if state.status != DraftStatus::Completed {
        return Err(DraftError::NotCompleted);
    }
    let game_id = state.game_id.clone();

    let ordered = state.picks_in_order();

    let assignments = ordered
        .iter()
        .map(|p| TeamAssignment {
            participant_id: p.participant_id.clone(),
            team_id: p.team_id.clone(),
        })
        .collect();

    let team_games = state
        .teams
        .iter()
        .map(|t| TeamGame {
            game_id: game_id.clone(),
            team_id: t.id.clone(),
        })
        .collect();

    let mut participations = Vec::new();
    for team in &state.teams {
        if state.include_managers {
            if let Some(manager) = &team.manager {
                participations.push(Participation {
                    game_id: game_id.clone(),
                    participant_id: manager.id.clone(),
                    team_id: team.id.clone(),
                });
            }
        }
        participations.extend(team.picks.iter().map(|p| Participation {
            game_id: game_id.clone(),
            participant_id: p.participant_id.clone(),
            team_id: team.id.clone(),
        }));
    }

    let picks = ordered
        .iter()
        .zip(1u32..)
        .map(|(p, overall)| FinalPick {
            game_id: game_id.clone(),
            participant_id: p.participant_id.clone(),
            team_id: p.team_id.clone(),
            round: p.round,
            overall_pick: overall,
        })
        .collect();

    Ok(FinalizePlan {
        game_id,
        assignments,
        team_games,
        participations,
        picks,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchKind {
    Assignments,
    TeamGames,
    Participations,
    Picks,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub kind: BatchKind,
    pub records: usize,
    /// Error message when the batch failed.
    pub error: Option<String>,
}

impl BatchOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalizeStatus {
    AllSucceeded,
    Partial,
    AllFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizeReport {
    pub game_id: String,
    pub batches: Vec<BatchOutcome>,
}

impl FinalizeReport {
    pub fn status(&self) -> FinalizeStatus {
        let ok = self.batches.iter().filter(|b| b.succeeded()).count();
        if ok == self.batches.len() {
            FinalizeStatus::AllSucceeded
        } else if ok == 0 {
            FinalizeStatus::AllFailed
        } else {
            FinalizeStatus::Partial
        }
    }

    pub fn failed(&self) -> impl Iterator<Item = &BatchOutcome> {
        self.batches.iter().filter(|b| !b.succeeded())
    }
}

/// Submit all four batches concurrently. A failing batch neither blocks nor
/// undoes the others; nothing is retried. Every batch is an upsert, so
/// calling this again after a partial failure is safe.
pub async fn submit<S: LeagueStore + ?Sized>(store: &S, plan: &FinalizePlan) -> FinalizeReport {
    let (assignments, team_games, participations, picks) = tokio::join!(
        run_batch(BatchKind::Assignments, plan.assignments.len(), async {
            store.assign_teams(&plan.assignments).await
        }),
        run_batch(BatchKind::TeamGames, plan.team_games.len(), async {
            store.upsert_team_games(&plan.team_games).await
        }),
        run_batch(BatchKind::Participations, plan.participations.len(), async {
            store.upsert_participations(&plan.participations).await
        }),
        run_batch(BatchKind::Picks, plan.picks.len(), async {
            store.upsert_picks(&plan.picks).await
        }),
    );

    let report = FinalizeReport {
        game_id: plan.game_id.clone(),
        batches: vec![assignments, team_games, participations, picks],
    };
    info!(
        "Finalized draft {}: {:?}",
        report.game_id,
        report.status()
    );
    report
}

async fn run_batch<F>(kind: BatchKind, records: usize, write: F) -> BatchOutcome
where
    F: std::future::Future<Output = anyhow::Result<()>>,
{
    if records == 0 {
        return BatchOutcome {
            kind,
            records,
            error: None,
        };
    }
    let error = match write.await {
        Ok(()) => None,
        Err(e) => {
            warn!("Finalize batch {:?} ({} records) failed: {:#}", kind, records, e);
            Some(format!("{e:#}"))
        }
    };
    BatchOutcome {
        kind,
        records,
        error,
    }
}
