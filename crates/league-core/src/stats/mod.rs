pub mod import;
pub mod leaderboard;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One KPI value for one participant on one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatRecord {
    pub game_id: String,
    #[serde(rename = "player_id")]
    pub participant_id: String,
    pub team_id: String,
    pub kpi_id: String,
    pub value: i64,
    pub date: NaiveDate,
}
