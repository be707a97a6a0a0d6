// Standings for a game: KPI values weighted by each KPI's points.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::{debug, warn};

use super::StatRecord;
use crate::draft::participant::Participant;
use crate::draft::roster::Team;
use crate::store::Kpi;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Standing {
    /// Competition rank: tied entries share a rank and the next rank skips.
    pub rank: usize,
    pub id: String,
    pub name: String,
    pub points: i64,
    /// Raw KPI totals keyed by KPI name.
    pub kpi_totals: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Leaderboard {
    pub participants: Vec<Standing>,
    pub teams: Vec<Standing>,
}

#[derive(Default)]
struct Tally {
    points: i64,
    kpi_totals: BTreeMap<String, i64>,
}

impl Tally {
    /// Sums saturate at the `i64` bounds.
    fn add(&mut self, kpi: &Kpi, value: i64) {
        let weighted = value
            .checked_mul(kpi.points)
            .and_then(|w| self.points.checked_add(w));
        self.points = match weighted {
            Some(points) => points,
            None => {
                warn!("Points overflow on KPI {} (value {}), clamping", kpi.name, value);
                self.points.saturating_add(value.saturating_mul(kpi.points))
            }
        };
        let total = self.kpi_totals.entry(kpi.name.clone()).or_default();
        *total = total.saturating_add(value);
    }
}

fn compare_points(a: &Standing, b: &Standing) -> Ordering {
    b.points.cmp(&a.points)
}

fn compare_name(a: &Standing, b: &Standing) -> Ordering {
    a.name.to_lowercase().cmp(&b.name.to_lowercase())
}

fn rank(tallies: HashMap<&str, Tally>, names: &HashMap<&str, String>) -> Vec<Standing> {
    let mut standings: Vec<Standing> = tallies
        .into_iter()
        .map(|(id, tally)| Standing {
            rank: 0,
            id: id.to_string(),
            name: names.get(id).cloned().unwrap_or_else(|| id.to_string()),
            points: tally.points,
            kpi_totals: tally.kpi_totals,
        })
        .collect();

    standings.sort_by(|a, b| {
        compare_points(a, b)
            .then_with(|| compare_name(a, b))
            .then_with(|| a.id.cmp(&b.id))
    });

    for i in 0..standings.len() {
        standings[i].rank = if i > 0 && standings[i].points == standings[i - 1].points {
            standings[i - 1].rank
        } else {
            i + 1
        };
    }
    standings
}

/// Build participant and team standings. Stats for KPIs outside `kpis` are
/// ignored.
pub fn compute(
    stats: &[StatRecord],
    kpis: &[Kpi],
    participants: &[Participant],
    teams: &[Team],
) -> Leaderboard {
    let kpis: HashMap<&str, &Kpi> = kpis.iter().map(|k| (k.id.as_str(), k)).collect();
    let mut by_participant: HashMap<&str, Tally> = HashMap::new();
    let mut by_team: HashMap<&str, Tally> = HashMap::new();

    for stat in stats {
        let Some(kpi) = kpis.get(stat.kpi_id.as_str()) else {
            debug!("Ignoring stat for unknown KPI {}", stat.kpi_id);
            continue;
        };
        by_participant
            .entry(stat.participant_id.as_str())
            .or_default()
            .add(kpi, stat.value);
        by_team
            .entry(stat.team_id.as_str())
            .or_default()
            .add(kpi, stat.value);
    }

    let participant_names = participants
        .iter()
        .map(|p| (p.id.as_str(), p.name()))
        .collect();
    let team_names = teams
        .iter()
        .map(|t| (t.id.as_str(), t.name.clone()))
        .collect();

    Leaderboard {
        participants: rank(by_participant, &participant_names),
        teams: rank(by_team, &team_names),
    }
}
