// Participant records and their draft-time classification.

use serde::{Deserialize, Serialize};

/// A person who can take part in a game, as read from the roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// The team this person currently plays for, if any.
    #[serde(default)]
    pub team_id: Option<String>,
}

impl Participant {
    /// Convenience constructor for a participant known only by display name.
    pub fn named(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Participant {
            id: id.into(),
            display_name: Some(display_name.into()),
            first_name: None,
            last_name: None,
            email: None,
            team_id: None,
        }
    }

    /// Name shown in the draft board.
    ///
    /// Fallback chain: display name, "first last", first, last, email, id.
    /// Blank strings count as missing.
    pub fn name(&self) -> String {
        if let Some(display) = non_blank(&self.display_name) {
            return display.to_string();
        }
        match (non_blank(&self.first_name), non_blank(&self.last_name)) {
            (Some(first), Some(last)) => return format!("{first} {last}"),
            (Some(first), None) => return first.to_string(),
            (None, Some(last)) => return last.to_string(),
            (None, None) => {}
        }
        if let Some(email) = non_blank(&self.email) {
            return email.to_string();
        }
        self.id.clone()
    }
}

pub(crate) fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// How a roster member enters the draft.
///
/// Resolved once when the roster is loaded: a manager of a selected team is
/// never draftable, so there is no later "remove from pool" step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterEntry {
    /// Goes into the available pool.
    Drafted(Participant),
    /// Sits on `team_id` from the start and never enters the pool.
    PreassignedManager {
        participant: Participant,
        team_id: String,
    },
}

impl RosterEntry {
    pub fn is_manager(&self) -> bool {
        matches!(self, RosterEntry::PreassignedManager { .. })
    }
}
