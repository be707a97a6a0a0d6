// Persistence contract shared by the local SQLite database and the hosted
// REST backend.

pub mod rest;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::draft::finalize::{Participation, TeamAssignment, TeamGame};
use crate::draft::participant::Participant;
use crate::draft::pick::FinalPick;
use crate::draft::roster::Team;
use crate::stats::StatRecord;

/// A game (season/contest) that teams are drafted into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub id: String,
    pub name: String,
    /// Number of teams a draft for this game must have.
    pub team_count: usize,
    /// Whether matches are scheduled head-to-head.
    #[serde(default)]
    pub h2h: bool,
}

/// A tracked statistic and the points each unit of it is worth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Kpi {
    pub id: String,
    pub game_id: String,
    pub name: String,
    pub points: i64,
}

/// Everything the draft and stat flows read from or write to the league
/// store. There is no coordination across calls. The SQLite store writes each
/// batch in one transaction; the REST store sends team assignments as one
/// request per participant, so a failed `assign_teams` there may have applied
/// some of them.
#[async_trait]
pub trait LeagueStore: Send + Sync {
    async fn load_game(&self, game_id: &str) -> Result<Option<Game>>;

    /// Every participant with their current team.
    async fn load_participants(&self) -> Result<Vec<Participant>>;

    async fn load_teams(&self) -> Result<Vec<Team>>;

    /// Teams registered for a game through its team/game associations.
    async fn load_game_teams(&self, game_id: &str) -> Result<Vec<Team>>;

    async fn load_kpis(&self, game_id: &str) -> Result<Vec<Kpi>>;

    async fn load_stats(&self, game_id: &str) -> Result<Vec<StatRecord>>;

    /// Move each participant onto its team. Not atomic on the REST store.
    async fn assign_teams(&self, assignments: &[TeamAssignment]) -> Result<()>;

    /// Upsert keyed on `(game_id, team_id)`.
    async fn upsert_team_games(&self, rows: &[TeamGame]) -> Result<()>;

    /// Upsert keyed on `(game_id, player_id)`.
    async fn upsert_participations(&self, rows: &[Participation]) -> Result<()>;

    /// Upsert keyed on `(game_id, overall_pick)`, then delete the game's
    /// picks numbered past the highest pick in the batch, so the stored
    /// picks are exactly the batch.
    async fn upsert_picks(&self, picks: &[FinalPick]) -> Result<()>;

    async fn insert_stat(&self, stat: &StatRecord) -> Result<()>;
}
