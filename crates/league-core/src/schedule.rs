// Head-to-head schedule generation.

use serde::Serialize;

/// One head-to-head meeting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Matchup {
    /// 1-based week number.
    pub week: u32,
    pub home: String,
    pub away: String,
}

/// A week's matchups plus the side sitting out, if the field is odd.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Week {
    pub number: u32,
    pub matchups: Vec<Matchup>,
    pub bye: Option<String>,
}

/// Single round robin by the circle method: every pair meets exactly once.
///
/// The first side stays fixed while the others rotate one slot per week. An
/// odd field gets a bye slot, so N sides play N weeks instead of N-1. The
/// fixed side alternates home and away week by week; the other pairings take
/// the home slot from their position in the circle.
pub fn round_robin(sides: &[String]) -> Vec<Week> {
    if sides.len() < 2 {
        return Vec::new();
    }

    let mut slots: Vec<Option<&String>> = sides.iter().map(Some).collect();
    if slots.len() % 2 == 1 {
        slots.push(None);
    }
    let n = slots.len();

    let mut weeks = Vec::with_capacity(n - 1);
    for round in 0..n - 1 {
        let number = round as u32 + 1;
        let mut matchups = Vec::with_capacity(n / 2);
        let mut bye = None;

        for i in 0..n / 2 {
            match (slots[i], slots[n - 1 - i]) {
                (Some(a), Some(b)) => {
                    let a_home = if i == 0 { round % 2 == 0 } else { i % 2 == 1 };
                    let (home, away) = if a_home { (a, b) } else { (b, a) };
                    matchups.push(Matchup {
                        week: number,
                        home: home.clone(),
                        away: away.clone(),
                    });
                }
                (Some(side), None) | (None, Some(side)) => bye = Some(side.clone()),
                (None, None) => {}
            }
        }

        weeks.push(Week {
            number,
            matchups,
            bye,
        });
        slots[1..].rotate_right(1);
    }
    weeks
}
