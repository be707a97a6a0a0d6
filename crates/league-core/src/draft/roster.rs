// Roster resolution: draft pool and per-team starting rosters.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::participant::{Participant, RosterEntry};
use super::pick::DraftPick;
use super::DraftError;

/// Team colors, handed out by selection index and wrapping around.
pub const TEAM_PALETTE: [&str; 10] = [
    "#2563eb", "#dc2626", "#16a34a", "#d97706", "#7c3aed", "#db2777", "#0d9488", "#ea580c",
    "#4f46e5", "#65a30d",
];

/// A team as stored in the league.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub manager_id: Option<String>,
}

/// A team while the draft is running.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftTeam {
    pub id: String,
    pub name: String,
    pub color: String,
    /// Pre-assigned manager, if one of the roster is this team's manager.
    pub manager: Option<Participant>,
    /// Picks in the order they were made.
    pub picks: Vec<DraftPick>,
}

impl DraftTeam {
    fn new(team: &Team, index: usize) -> Self {
        DraftTeam {
            id: team.id.clone(),
            name: team.name.clone(),
            color: TEAM_PALETTE[index % TEAM_PALETTE.len()].to_string(),
            manager: None,
            picks: Vec::new(),
        }
    }
}

/// The starting point of a draft: who can be picked and who already sits
/// on a team.
#[derive(Debug, Clone)]
pub struct ResolvedRoster {
    pub teams: Vec<DraftTeam>,
    /// Draftable participants ordered by display name.
    pub pool: Vec<Participant>,
}

/// Classify every roster member as draftable or as a pre-assigned manager of
/// one of `selected`.
///
/// Duplicate participant ids are collapsed (first row wins). A person who
/// manages more than one selected team is pre-assigned to the first of them.
pub fn classify(participants: Vec<Participant>, selected: &[Team]) -> Vec<RosterEntry> {
    let mut seen = HashSet::new();
    participants
        .into_iter()
        .filter(|p| seen.insert(p.id.clone()))
        .map(|participant| {
            let managed = selected
                .iter()
                .find(|t| t.manager_id.as_deref() == Some(participant.id.as_str()));
            match managed {
                Some(team) => RosterEntry::PreassignedManager {
                    team_id: team.id.clone(),
                    participant,
                },
                None => RosterEntry::Drafted(participant),
            }
        })
        .collect()
}

/// Build the initial pool and team rosters for a draft.
///
/// Fails without producing anything when the number of selected teams is not
/// exactly `expected_teams`, or when a team is selected twice.
pub fn resolve(
    participants: Vec<Participant>,
    selected: &[Team],
    expected_teams: usize,
) -> Result<ResolvedRoster, DraftError> {
    if selected.len() != expected_teams {
        return Err(DraftError::WrongTeamCount {
            expected: expected_teams,
            actual: selected.len(),
        });
    }

    let mut team_ids = HashSet::new();
    for team in selected {
        if !team_ids.insert(team.id.as_str()) {
            return Err(DraftError::DuplicateTeam(team.id.clone()));
        }
    }

    let mut teams: Vec<DraftTeam> = selected
        .iter()
        .enumerate()
        .map(|(i, t)| DraftTeam::new(t, i))
        .collect();

    let mut pool = Vec::new();
    for entry in classify(participants, selected) {
        match entry {
            RosterEntry::Drafted(p) => pool.push(p),
            RosterEntry::PreassignedManager {
                participant,
                team_id,
            } => {
                debug!("Pre-assigning manager {} to team {}", participant.id, team_id);
                if let Some(team) = teams.iter_mut().find(|t| t.id == team_id) {
                    team.manager = Some(participant);
                }
            }
        }
    }

    pool.sort_by_cached_key(|p| p.name().to_lowercase());

    info!(
        "Roster resolved: {} teams, {} draftable, {} managers pre-assigned",
        teams.len(),
        pool.len(),
        teams.iter().filter(|t| t.manager.is_some()).count()
    );

    Ok(ResolvedRoster { teams, pool })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn team(id: &str, manager: Option<&str>) -> Team {
        Team {
            id: id.into(),
            name: format!("Team {id}"),
            manager_id: manager.map(Into::into),
        }
    }

    fn people(n: usize) -> Vec<Participant> {
        (1..=n)
            .map(|i| Participant::named(format!("p{i}"), format!("Player {i:02}")))
            .collect()
    }

    #[test]
    fn rejects_wrong_team_count() {
        let err = resolve(people(4), &[team("a", None), team("b", None)], 3).unwrap_err();
        assert_eq!(
            err,
            DraftError::WrongTeamCount {
                expected: 3,
                actual: 2
            }
        );
    }

    #[test]
    fn rejects_duplicate_team() {
        let err = resolve(people(4), &[team("a", None), team("a", None)], 2).unwrap_err();
        assert_eq!(err, DraftError::DuplicateTeam("a".into()));
    }

    #[test]
    fn managers_are_preassigned_and_excluded_from_pool() {
        let teams = [team("a", Some("p2")), team("b", None)];
        let roster = resolve(people(4), &teams, 2).unwrap();

        assert_eq!(roster.pool.len(), 3);
        assert!(roster.pool.iter().all(|p| p.id != "p2"));
        assert_eq!(roster.teams[0].manager.as_ref().map(|m| m.id.as_str()), Some("p2"));
        assert!(roster.teams[1].manager.is_none());
        assert!(roster.teams[0].picks.is_empty());
    }

    #[test]
    fn duplicate_roster_rows_collapse() {
        // The roster query can return a manager twice through its team join.
        let mut rows = people(3);
        rows.push(Participant::named("p1", "Player 01"));
        let teams = [team("a", Some("p1")), team("b", None)];
        let roster = resolve(rows, &teams, 2).unwrap();

        assert_eq!(roster.pool.len(), 2);
        assert!(roster.pool.iter().all(|p| p.id != "p1"));
    }

    #[test]
    fn manager_of_two_teams_sits_on_first() {
        let teams = [team("a", Some("p1")), team("b", Some("p1"))];
        let roster = resolve(people(3), &teams, 2).unwrap();
        assert!(roster.teams[0].manager.is_some());
        assert!(roster.teams[1].manager.is_none());
        assert_eq!(roster.pool.len(), 2);
    }

    #[test]
    fn manager_of_unselected_team_stays_draftable() {
        let selected = [team("a", None), team("b", None)];
        let entries = classify(people(2), &selected);
        assert!(entries.iter().all(|e| !e.is_manager()));
    }

    #[test]
    fn colors_follow_palette_order() {
        let teams: Vec<Team> = (0..12).map(|i| team(&format!("t{i}"), None)).collect();
        let roster = resolve(people(1), &teams, 12).unwrap();
        assert_eq!(roster.teams[0].color, TEAM_PALETTE[0]);
        assert_eq!(roster.teams[3].color, TEAM_PALETTE[3]);
        assert_eq!(roster.teams[10].color, TEAM_PALETTE[0]);
    }

    #[test]
    fn pool_is_sorted_by_name() {
        let rows = vec![
            Participant::named("z", "zed"),
            Participant::named("a", "Amy"),
            Participant::named("m", "mo"),
        ];
        let roster = resolve(rows, &[team("a", None)], 1).unwrap();
        let names: Vec<String> = roster.pool.iter().map(Participant::name).collect();
        assert_eq!(names, vec!["Amy", "mo", "zed"]);
    }
}
