// Draft state: turn order, available pool, pick clock countdown.

use rand::seq::IndexedRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::participant::Participant;
use super::pick::{DraftPick, PickSource};
use super::roster::{DraftTeam, ResolvedRoster};
use super::DraftError;
use crate::config::DraftConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftStatus {
    NotStarted,
    InProgress,
    Completed,
}

/// Direction the turn moves through the team list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Forward,
    Backward,
}

/// Inputs to the draft state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftEvent {
    Start,
    Pick {
        participant_id: String,
        source: PickSource,
    },
    /// One unit of the pick clock elapsed.
    Tick,
}

/// What an accepted event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Started,
    Picked { pick: DraftPick, completed: bool },
    Ticked { seconds_remaining: u32 },
    /// The clock expired with nobody left to pick.
    Completed,
    /// A tick arrived while the draft was not running.
    Idle,
}

/// The complete state of one draft session.
#[derive(Debug, Clone)]
pub struct DraftState {
    pub game_id: String,
    pub status: DraftStatus,
    /// Teams in turn order.
    pub teams: Vec<DraftTeam>,
    /// Participants still available, in display order.
    pub available: Vec<Participant>,
    /// Current round, starting at 1.
    pub round: u32,
    /// Provisional number the next pick will get, starting at 1.
    pub pick_number: u32,
    /// Index into `teams` of the team on the clock.
    pub current_team_idx: usize,
    pub direction: Direction,
    pub seconds_remaining: u32,
    pub pick_seconds: u32,
    /// Whether managers get participation records at finalize time.
    pub include_managers: bool,
}

impl DraftState {
    /// Create a not-yet-started draft from a resolved roster.
    pub fn new(game_id: impl Into<String>, roster: ResolvedRoster, settings: &DraftConfig) -> Self {
        DraftState {
            game_id: game_id.into(),
            status: DraftStatus::NotStarted,
            teams: roster.teams,
            available: roster.pool,
            round: 1,
            pick_number: 1,
            current_team_idx: 0,
            direction: Direction::Forward,
            seconds_remaining: settings.pick_seconds,
            pick_seconds: settings.pick_seconds,
            include_managers: settings.include_managers,
        }
    }

    /// Apply one event. Randomness is only consumed when the clock expires.
    pub fn apply<R: Rng + ?Sized>(
        &mut self,
        event: DraftEvent,
        rng: &mut R,
    ) -> Result<Transition, DraftError> {
        match event {
            DraftEvent::Start => self.start(),
            DraftEvent::Pick {
                participant_id,
                source,
            } => self.pick(&participant_id, source),
            DraftEvent::Tick => self.tick(rng),
        }
    }

    pub fn start(&mut self) -> Result<Transition, DraftError> {
        if self.status != DraftStatus::NotStarted {
            return Err(DraftError::AlreadyStarted);
        }
        if self.teams.is_empty() {
            return Err(DraftError::WrongTeamCount {
                expected: 1,
                actual: 0,
            });
        }
        if self.available.is_empty() {
            return Err(DraftError::EmptyPool);
        }

        self.status = DraftStatus::InProgress;
        self.seconds_remaining = self.pick_seconds;
        info!(
            "Draft {} started: {} teams, {} participants",
            self.game_id,
            self.teams.len(),
            self.available.len()
        );
        Ok(Transition::Started)
    }

    /// Give `participant_id` to the team on the clock and move the turn.
    pub fn pick(
        &mut self,
        participant_id: &str,
        source: PickSource,
    ) -> Result<Transition, DraftError> {
        if self.status != DraftStatus::InProgress {
            return Err(DraftError::NotInProgress(self.status));
        }
        let idx = self
            .available
            .iter()
            .position(|p| p.id == participant_id)
            .ok_or_else(|| DraftError::UnknownParticipant(participant_id.to_string()))?;

        let participant = self.available.remove(idx);
        let team = &mut self.teams[self.current_team_idx];
        let pick = DraftPick {
            participant_id: participant.id.clone(),
            participant_name: participant.name(),
            team_id: team.id.clone(),
            team_name: team.name.clone(),
            round: self.round,
            provisional_pick: self.pick_number,
            source,
        };
        team.picks.push(pick.clone());
        info!(
            "Pick #{} (round {}, {}): {} -> {}",
            pick.provisional_pick, pick.round, source, pick.participant_name, pick.team_name
        );

        self.pick_number += 1;
        self.seconds_remaining = self.pick_seconds;

        let completed = self.available.is_empty();
        if completed {
            self.complete();
        } else {
            self.advance();
        }

        Ok(Transition::Picked { pick, completed })
    }

    /// Count the clock down by one unit; on expiry pick at random for the
    /// team on the clock.
    pub fn tick<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<Transition, DraftError> {
        if self.status != DraftStatus::InProgress {
            return Ok(Transition::Idle);
        }

        self.seconds_remaining = self.seconds_remaining.saturating_sub(1);
        if self.seconds_remaining > 0 {
            return Ok(Transition::Ticked {
                seconds_remaining: self.seconds_remaining,
            });
        }

        let chosen = self.available.choose(rng).map(|p| p.id.clone());
        match chosen {
            Some(participant_id) => {
                debug!("Pick clock expired, auto-picking {}", participant_id);
                self.pick(&participant_id, PickSource::Auto)
            }
            None => {
                self.complete();
                Ok(Transition::Completed)
            }
        }
    }

    /// Serpentine step: reverse at either end of the team list, bumping the
    /// round, and stay on the same team for its second pick.
    fn advance(&mut self) {
        let last = self.teams.len().saturating_sub(1);
        match self.direction {
            Direction::Forward if self.current_team_idx >= last => {
                self.current_team_idx = last;
                self.direction = Direction::Backward;
                self.round += 1;
                debug!("Round {} begins, reversing turn order", self.round);
            }
            Direction::Backward if self.current_team_idx == 0 => {
                self.direction = Direction::Forward;
                self.round += 1;
                debug!("Round {} begins, reversing turn order", self.round);
            }
            Direction::Forward => self.current_team_idx += 1,
            Direction::Backward => self.current_team_idx -= 1,
        }
    }

    fn complete(&mut self) {
        self.status = DraftStatus::Completed;
        self.seconds_remaining = 0;
        info!(
            "Draft {} completed after {} picks",
            self.game_id,
            self.pick_number - 1
        );
    }

    /// The team on the clock, while the draft is running.
    pub fn current_team(&self) -> Option<&DraftTeam> {
        match self.status {
            DraftStatus::InProgress => self.teams.get(self.current_team_idx),
            _ => None,
        }
    }

    pub fn is_available(&self, participant_id: &str) -> bool {
        self.available.iter().any(|p| p.id == participant_id)
    }

    /// Every pick across all teams, ordered by provisional pick number.
    pub fn picks_in_order(&self) -> Vec<&DraftPick> {
        let mut picks: Vec<&DraftPick> = self.teams.iter().flat_map(|t| t.picks.iter()).collect();
        picks.sort_by_key(|p| p.provisional_pick);
        picks
    }
}
