// SQLite persistence layer for the league: roster, games, draft results and
// stats.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Deserialize;
use tracing::debug;

use crate::draft::finalize::{Participation, TeamAssignment, TeamGame};
use crate::draft::participant::Participant;
use crate::draft::pick::FinalPick;
use crate::draft::roster::Team;
use crate::stats::StatRecord;
use crate::store::{Game, Kpi, LeagueStore};

/// SQLite-backed league store.
pub struct Database {
    conn: Mutex<Connection>,
}

/// Seed data for an empty league, as read from a TOML file by the CLI.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub games: Vec<Game>,
    #[serde(default)]
    pub teams: Vec<Team>,
    #[serde(default)]
    pub participants: Vec<Participant>,
    #[serde(default)]
    pub kpis: Vec<Kpi>,
}

impl Database {
    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral in-memory database.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS games (
                id         TEXT PRIMARY KEY,
                name       TEXT NOT NULL,
                team_count INTEGER NOT NULL,
                h2h        INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS teams (
                id         TEXT PRIMARY KEY,
                name       TEXT NOT NULL,
                manager_id TEXT
            );

            CREATE TABLE IF NOT EXISTS participants (
                id           TEXT PRIMARY KEY,
                display_name TEXT,
                first_name   TEXT,
                last_name    TEXT,
                email        TEXT,
                team_id      TEXT REFERENCES teams(id)
            );

            CREATE TABLE IF NOT EXISTS team_games (
                game_id TEXT NOT NULL REFERENCES games(id),
                team_id TEXT NOT NULL REFERENCES teams(id),
                PRIMARY KEY (game_id, team_id)
            );

            CREATE TABLE IF NOT EXISTS game_participants (
                game_id   TEXT NOT NULL REFERENCES games(id),
                player_id TEXT NOT NULL REFERENCES participants(id),
                team_id   TEXT NOT NULL REFERENCES teams(id),
                PRIMARY KEY (game_id, player_id)
            );

            CREATE TABLE IF NOT EXISTS draft_picks (
                game_id      TEXT NOT NULL REFERENCES games(id),
                overall_pick INTEGER NOT NULL,
                round        INTEGER NOT NULL,
                player_id    TEXT NOT NULL REFERENCES participants(id),
                team_id      TEXT NOT NULL REFERENCES teams(id),
                timestamp    TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                PRIMARY KEY (game_id, overall_pick)
            );

            CREATE TABLE IF NOT EXISTS kpis (
                id      TEXT PRIMARY KEY,
                game_id TEXT NOT NULL REFERENCES games(id),
                name    TEXT NOT NULL,
                points  INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS stats (
                id        INTEGER PRIMARY KEY AUTOINCREMENT,
                game_id   TEXT NOT NULL REFERENCES games(id),
                player_id TEXT NOT NULL REFERENCES participants(id),
                team_id   TEXT NOT NULL REFERENCES teams(id),
                kpi_id    TEXT NOT NULL REFERENCES kpis(id),
                value     INTEGER NOT NULL,
                date      TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_stats_game_id ON stats(game_id);
            ",
        )
        .context("failed to create database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the database connection.
    ///
    /// Panics if the mutex is poisoned (another thread panicked while
    /// holding the lock).
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    // ------------------------------------------------------------------
    // Seeding
    // ------------------------------------------------------------------

    /// Load a whole seed file in one transaction. Existing rows with the same
    /// id are overwritten.
    pub fn import_seed(&self, seed: &SeedData) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin seed transaction")?;

        for game in &seed.games {
            upsert_game(&tx, game)?;
        }
        for team in &seed.teams {
            upsert_team(&tx, team)?;
        }
        for participant in &seed.participants {
            upsert_participant(&tx, participant)?;
        }
        for kpi in &seed.kpis {
            upsert_kpi(&tx, kpi)?;
        }

        tx.commit().context("failed to commit seed import")?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Draft results
    // ------------------------------------------------------------------

    /// Persisted picks for a game, in overall pick order.
    pub fn load_picks(&self, game_id: &str) -> Result<Vec<FinalPick>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT game_id, player_id, team_id, round, overall_pick
                 FROM draft_picks WHERE game_id = ?1 ORDER BY overall_pick",
            )
            .context("failed to prepare load_picks query")?;

        let picks = stmt
            .query_map(params![game_id], |row| {
                Ok(FinalPick {
                    game_id: row.get(0)?,
                    participant_id: row.get(1)?,
                    team_id: row.get(2)?,
                    round: row.get(3)?,
                    overall_pick: row.get(4)?,
                })
            })
            .context("failed to query draft picks")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map draft pick rows")?;
        Ok(picks)
    }

    pub fn load_participations(&self, game_id: &str) -> Result<Vec<Participation>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT game_id, player_id, team_id FROM game_participants
                 WHERE game_id = ?1 ORDER BY player_id",
            )
            .context("failed to prepare load_participations query")?;

        let rows = stmt
            .query_map(params![game_id], |row| {
                Ok(Participation {
                    game_id: row.get(0)?,
                    participant_id: row.get(1)?,
                    team_id: row.get(2)?,
                })
            })
            .context("failed to query game participants")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map game participant rows")?;
        Ok(rows)
    }

    pub fn load_team_games(&self, game_id: &str) -> Result<Vec<TeamGame>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT game_id, team_id FROM team_games WHERE game_id = ?1 ORDER BY team_id")
            .context("failed to prepare load_team_games query")?;

        let rows = stmt
            .query_map(params![game_id], |row| {
                Ok(TeamGame {
                    game_id: row.get(0)?,
                    team_id: row.get(1)?,
                })
            })
            .context("failed to query team games")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map team game rows")?;
        Ok(rows)
    }

    /// Delete a game's draft results so the draft can be run again from
    /// scratch. Roster, teams and stats are preserved.
    pub fn clear_draft(&self, game_id: &str) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin transaction")?;
        tx.execute("DELETE FROM draft_picks WHERE game_id = ?1", params![game_id])
            .context("failed to delete draft picks")?;
        tx.execute(
            "DELETE FROM game_participants WHERE game_id = ?1",
            params![game_id],
        )
        .context("failed to delete game participants")?;
        tx.execute("DELETE FROM team_games WHERE game_id = ?1", params![game_id])
            .context("failed to delete team games")?;
        tx.commit().context("failed to commit clear_draft")?;
        Ok(())
    }
}

fn upsert_game(conn: &Connection, game: &Game) -> Result<()> {
    conn.execute(
        "INSERT INTO games (id, name, team_count, h2h) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(id) DO UPDATE SET
            name       = excluded.name,
            team_count = excluded.team_count,
            h2h        = excluded.h2h",
        params![game.id, game.name, game.team_count as i64, game.h2h],
    )
    .with_context(|| format!("failed to insert game {}", game.id))?;
    Ok(())
}

fn upsert_team(conn: &Connection, team: &Team) -> Result<()> {
    conn.execute(
        "INSERT INTO teams (id, name, manager_id) VALUES (?1, ?2, ?3)
         ON CONFLICT(id) DO UPDATE SET
            name       = excluded.name,
            manager_id = excluded.manager_id",
        params![team.id, team.name, team.manager_id],
    )
    .with_context(|| format!("failed to insert team {}", team.id))?;
    Ok(())
}

fn upsert_participant(conn: &Connection, p: &Participant) -> Result<()> {
    conn.execute(
        "INSERT INTO participants (id, display_name, first_name, last_name, email, team_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(id) DO UPDATE SET
            display_name = excluded.display_name,
            first_name   = excluded.first_name,
            last_name    = excluded.last_name,
            email        = excluded.email,
            team_id      = excluded.team_id",
        params![p.id, p.display_name, p.first_name, p.last_name, p.email, p.team_id],
    )
    .with_context(|| format!("failed to insert participant {}", p.id))?;
    Ok(())
}

fn upsert_kpi(conn: &Connection, kpi: &Kpi) -> Result<()> {
    conn.execute(
        "INSERT INTO kpis (id, game_id, name, points) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(id) DO UPDATE SET
            game_id = excluded.game_id,
            name    = excluded.name,
            points  = excluded.points",
        params![kpi.id, kpi.game_id, kpi.name, kpi.points],
    )
    .with_context(|| format!("failed to insert KPI {}", kpi.id))?;
    Ok(())
}

/// Highest overall pick per game in a pick batch.
pub(crate) fn last_picks(picks: &[FinalPick]) -> BTreeMap<&str, u32> {
    let mut last = BTreeMap::new();
    for pick in picks {
        let entry = last.entry(pick.game_id.as_str()).or_insert(0);
        *entry = (*entry).max(pick.overall_pick);
    }
    last
}

fn team_from_row(row: &Row<'_>) -> rusqlite::Result<Team> {
    Ok(Team {
        id: row.get(0)?,
        name: row.get(1)?,
        manager_id: row.get(2)?,
    })
}

#[async_trait]
impl LeagueStore for Database {
    async fn load_game(&self, game_id: &str) -> Result<Option<Game>> {
        let conn = self.conn();
        let game = conn
            .query_row(
                "SELECT id, name, team_count, h2h FROM games WHERE id = ?1",
                params![game_id],
                |row| {
                    let team_count: i64 = row.get(2)?;
                    Ok(Game {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        team_count: team_count as usize,
                        h2h: row.get(3)?,
                    })
                },
            )
            .optional()
            .context("failed to load game")?;
        Ok(game)
    }

    async fn load_participants(&self) -> Result<Vec<Participant>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT id, display_name, first_name, last_name, email, team_id
                 FROM participants ORDER BY rowid",
            )
            .context("failed to prepare load_participants query")?;

        let participants = stmt
            .query_map([], |row| {
                Ok(Participant {
                    id: row.get(0)?,
                    display_name: row.get(1)?,
                    first_name: row.get(2)?,
                    last_name: row.get(3)?,
                    email: row.get(4)?,
                    team_id: row.get(5)?,
                })
            })
            .context("failed to query participants")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map participant rows")?;
        Ok(participants)
    }

    async fn load_teams(&self) -> Result<Vec<Team>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT id, name, manager_id FROM teams ORDER BY rowid")
            .context("failed to prepare load_teams query")?;
        let teams = stmt
            .query_map([], team_from_row)
            .context("failed to query teams")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map team rows")?;
        Ok(teams)
    }

    async fn load_game_teams(&self, game_id: &str) -> Result<Vec<Team>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT t.id, t.name, t.manager_id
                 FROM team_games tg JOIN teams t ON t.id = tg.team_id
                 WHERE tg.game_id = ?1 ORDER BY t.rowid",
            )
            .context("failed to prepare load_game_teams query")?;
        let teams = stmt
            .query_map(params![game_id], team_from_row)
            .context("failed to query game teams")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map game team rows")?;
        Ok(teams)
    }

    async fn load_kpis(&self, game_id: &str) -> Result<Vec<Kpi>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT id, game_id, name, points FROM kpis WHERE game_id = ?1 ORDER BY rowid")
            .context("failed to prepare load_kpis query")?;
        let kpis = stmt
            .query_map(params![game_id], |row| {
                Ok(Kpi {
                    id: row.get(0)?,
                    game_id: row.get(1)?,
                    name: row.get(2)?,
                    points: row.get(3)?,
                })
            })
            .context("failed to query KPIs")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map KPI rows")?;
        Ok(kpis)
    }

    async fn load_stats(&self, game_id: &str) -> Result<Vec<StatRecord>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT game_id, player_id, team_id, kpi_id, value, date
                 FROM stats WHERE game_id = ?1 ORDER BY date, id",
            )
            .context("failed to prepare load_stats query")?;
        let stats = stmt
            .query_map(params![game_id], |row| {
                Ok(StatRecord {
                    game_id: row.get(0)?,
                    participant_id: row.get(1)?,
                    team_id: row.get(2)?,
                    kpi_id: row.get(3)?,
                    value: row.get(4)?,
                    date: row.get(5)?,
                })
            })
            .context("failed to query stats")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map stat rows")?;
        Ok(stats)
    }

    async fn assign_teams(&self, assignments: &[TeamAssignment]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin transaction")?;
        for a in assignments {
            let changed = tx
                .execute(
                    "UPDATE participants SET team_id = ?1 WHERE id = ?2",
                    params![a.team_id, a.participant_id],
                )
                .with_context(|| format!("failed to assign {} to {}", a.participant_id, a.team_id))?;
            if changed == 0 {
                bail!("unknown participant {}", a.participant_id);
            }
        }
        tx.commit().context("failed to commit team assignments")?;
        Ok(())
    }

    async fn upsert_team_games(&self, rows: &[TeamGame]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin transaction")?;
        for row in rows {
            tx.execute(
                "INSERT INTO team_games (game_id, team_id) VALUES (?1, ?2)
                 ON CONFLICT(game_id, team_id) DO NOTHING",
                params![row.game_id, row.team_id],
            )
            .context("failed to upsert team game")?;
        }
        tx.commit().context("failed to commit team games")?;
        Ok(())
    }

    async fn upsert_participations(&self, rows: &[Participation]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin transaction")?;
        for row in rows {
            tx.execute(
                "INSERT INTO game_participants (game_id, player_id, team_id) VALUES (?1, ?2, ?3)
                 ON CONFLICT(game_id, player_id) DO UPDATE SET team_id = excluded.team_id",
                params![row.game_id, row.participant_id, row.team_id],
            )
            .context("failed to upsert game participant")?;
        }
        tx.commit().context("failed to commit game participants")?;
        Ok(())
    }

    async fn upsert_picks(&self, picks: &[FinalPick]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin transaction")?;
        for pick in picks {
            tx.execute(
                "INSERT INTO draft_picks (game_id, overall_pick, round, player_id, team_id)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(game_id, overall_pick) DO UPDATE SET
                    round     = excluded.round,
                    player_id = excluded.player_id,
                    team_id   = excluded.team_id",
                params![
                    pick.game_id,
                    pick.overall_pick,
                    pick.round,
                    pick.participant_id,
                    pick.team_id,
                ],
            )
            .context("failed to upsert draft pick")?;
        }
        for (game_id, last) in last_picks(picks) {
            let removed = tx
                .execute(
                    "DELETE FROM draft_picks WHERE game_id = ?1 AND overall_pick > ?2",
                    params![game_id, last],
                )
                .context("failed to trim stale draft picks")?;
            if removed > 0 {
                debug!("Removed {} stale picks of game {} past #{}", removed, game_id, last);
            }
        }
        tx.commit().context("failed to commit draft picks")?;
        Ok(())
    }

    async fn insert_stat(&self, stat: &StatRecord) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO stats (game_id, player_id, team_id, kpi_id, value, date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                stat.game_id,
                stat.participant_id,
                stat.team_id,
                stat.kpi_id,
                stat.value,
                stat.date,
            ],
        )
        .context("failed to insert stat")?;
        Ok(())
    }
}
