// Integration tests for the league library.
//
// These tests drive the public API end to end against an in-memory SQLite
// store: roster resolution into a live draft session through finalization,
// and a CSV stat upload through reconciliation, submission and standings.

use std::sync::Arc;
use std::time::Duration;

use league_core::config::DraftConfig;
use league_core::db::{Database, SeedData};
use league_core::draft::finalize::FinalizeStatus;
use league_core::draft::participant::Participant;
use league_core::draft::roster::{resolve, Team};
use league_core::draft::session::{self, DraftHandle};
use league_core::draft::state::{DraftState, DraftStatus};
use league_core::protocol::{DraftCommand, DraftUpdate};
use league_core::schedule;
use league_core::stats::import::{self, ColumnMapping, KpiColumn, Reconciler};
use league_core::stats::leaderboard;
use league_core::store::{Game, Kpi, LeagueStore};

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::mpsc;

// ===========================================================================
// Test helpers
// ===========================================================================

const GAME: &str = "spring";

fn four_teams() -> Vec<Team> {
    ["a", "b", "c", "d"]
        .iter()
        .map(|id| Team {
            id: id.to_string(),
            name: format!("Team {}", id.to_uppercase()),
            manager_id: None,
        })
        .collect()
}

/// 8 draftable people plus a manager for team A.
fn league_db() -> Arc<Database> {
    let mut teams = four_teams();
    teams[0].manager_id = Some("mgr".into());

    let mut participants: Vec<Participant> = (1..=8)
        .map(|i| Participant {
            first_name: Some(format!("First{i}")),
            last_name: Some(format!("Last{i}")),
            ..Participant::named(format!("p{i}"), format!("Player {i}"))
        })
        .collect();
    participants.push(Participant {
        team_id: Some("a".into()),
        ..Participant::named("mgr", "Morgan Manager")
    });

    let db = Database::open(":memory:").expect("in-memory database should open");
    db.import_seed(&SeedData {
        games: vec![Game {
            id: GAME.into(),
            name: "Spring Cup".into(),
            team_count: 4,
            h2h: true,
        }],
        teams,
        participants,
        kpis: vec![
            Kpi {
                id: "k_sales".into(),
                game_id: GAME.into(),
                name: "Sales".into(),
                points: 5,
            },
            Kpi {
                id: "k_calls".into(),
                game_id: GAME.into(),
                name: "Calls".into(),
                points: 1,
            },
        ],
    })
    .expect("seed should import");
    Arc::new(db)
}

async fn draft_state(db: &Database, include_managers: bool) -> DraftState {
    let game = db.load_game(GAME).await.unwrap().unwrap();
    let teams = db.load_teams().await.unwrap();
    let participants = db.load_participants().await.unwrap();
    let roster = resolve(participants, &teams, game.team_count).unwrap();
    let settings = DraftConfig {
        include_managers,
        ..DraftConfig::default()
    };
    DraftState::new(GAME, roster, &settings)
}

fn spawn(db: &Arc<Database>, state: DraftState) -> DraftHandle {
    session::spawn(
        state,
        db.clone(),
        Duration::from_secs(1),
        StdRng::seed_from_u64(2024),
    )
}

/// Next update that is not a clock tick.
async fn next_event(updates: &mut mpsc::Receiver<DraftUpdate>) -> DraftUpdate {
    loop {
        match updates.recv().await.expect("session closed") {
            DraftUpdate::Tick { .. } => continue,
            other => return other,
        }
    }
}

async fn wait_for_finalize(updates: &mut mpsc::Receiver<DraftUpdate>) -> FinalizeStatus {
    loop {
        if let DraftUpdate::Finalized { report } = next_event(updates).await {
            return report.status();
        }
    }
}

// ===========================================================================
// Draft
// ===========================================================================

#[tokio::test(start_paused = true)]
async fn snake_draft_persists_through_sqlite() {
    let db = league_db();
    let state = draft_state(&db, true).await;
    assert_eq!(state.available.len(), 8);
    let mut handle = spawn(&db, state);

    handle.commands.send(DraftCommand::Start).await.unwrap();
    assert!(matches!(
        next_event(&mut handle.updates).await,
        DraftUpdate::Started { .. }
    ));

    let mut teams_in_order = Vec::new();
    for i in 1..=8 {
        handle
            .commands
            .send(DraftCommand::Pick {
                participant_id: format!("p{i}"),
            })
            .await
            .unwrap();
        match next_event(&mut handle.updates).await {
            DraftUpdate::Picked { pick, .. } => teams_in_order.push(pick.team_id),
            other => panic!("expected Picked, got {other:?}"),
        }
    }
    assert_eq!(teams_in_order, ["a", "b", "c", "d", "d", "c", "b", "a"]);

    assert_eq!(
        wait_for_finalize(&mut handle.updates).await,
        FinalizeStatus::AllSucceeded
    );
    drop(handle.commands);
    let state = handle.task.await.unwrap();
    assert_eq!(state.status, DraftStatus::Completed);

    let picks = db.load_picks(GAME).unwrap();
    let numbered: Vec<(u32, u32, &str)> = picks
        .iter()
        .map(|p| (p.overall_pick, p.round, p.participant_id.as_str()))
        .collect();
    assert_eq!(
        numbered,
        vec![
            (1, 1, "p1"),
            (2, 1, "p2"),
            (3, 1, "p3"),
            (4, 1, "p4"),
            (5, 2, "p5"),
            (6, 2, "p6"),
            (7, 2, "p7"),
            (8, 2, "p8"),
        ]
    );

    // The manager takes part but is never drafted.
    let participations = db.load_participations(GAME).unwrap();
    assert_eq!(participations.len(), 9);
    assert!(participations
        .iter()
        .any(|p| p.participant_id == "mgr" && p.team_id == "a"));
    assert!(picks.iter().all(|p| p.participant_id != "mgr"));

    let roster = db.load_participants().await.unwrap();
    let p8 = roster.iter().find(|p| p.id == "p8").unwrap();
    assert_eq!(p8.team_id.as_deref(), Some("a"));

    let game_teams = db.load_game_teams(GAME).await.unwrap();
    assert_eq!(game_teams.len(), 4);
}

#[tokio::test(start_paused = true)]
async fn clock_only_draft_assigns_everyone() {
    let db = league_db();
    let state = draft_state(&db, false).await;
    let mut handle = spawn(&db, state);

    handle.commands.send(DraftCommand::Start).await.unwrap();
    let mut auto_picks = 0;
    loop {
        match handle.updates.recv().await.expect("session closed") {
            DraftUpdate::Picked { pick, .. } => {
                assert_eq!(pick.source.to_string(), "auto");
                auto_picks += 1;
            }
            DraftUpdate::Finalized { report } => {
                assert_eq!(report.status(), FinalizeStatus::AllSucceeded);
                break;
            }
            _ => {}
        }
    }
    assert_eq!(auto_picks, 8);

    drop(handle.commands);
    handle.task.await.unwrap();

    let picks = db.load_picks(GAME).unwrap();
    let mut drafted: Vec<&str> = picks.iter().map(|p| p.participant_id.as_str()).collect();
    drafted.sort();
    assert_eq!(drafted, ["p1", "p2", "p3", "p4", "p5", "p6", "p7", "p8"]);
    assert_eq!(db.load_participations(GAME).unwrap().len(), 8);
}

#[tokio::test]
async fn wrong_team_count_blocks_the_draft() {
    let db = league_db();
    let teams = four_teams();
    let participants = db.load_participants().await.unwrap();
    assert!(resolve(participants, &teams[..3], 4).is_err());
    assert!(db.load_picks(GAME).unwrap().is_empty());
}

// ===========================================================================
// Stats
// ===========================================================================

const UPLOAD: &str = "\
Name,Team,Date,Sales,Calls
Player 1,Team A,2024-05-01,2,10
first3 last3,,2024-05-01,,4
\"Last2, First2\",Team B,2024-05-02,1,
Player 4,Team D,05/02/2024,3,3
Nobody Here,Team C,2024-05-02,1,1
Player 5,Team C,2024-05-03,two,6
";

fn mapping() -> ColumnMapping {
    ColumnMapping {
        name_columns: vec!["Name".into()],
        team_column: Some("Team".into()),
        date_column: "Date".into(),
        kpi_columns: vec![
            KpiColumn {
                column: "Sales".into(),
                kpi_id: "k_sales".into(),
            },
            KpiColumn {
                column: "Calls".into(),
                kpi_id: "k_calls".into(),
            },
        ],
    }
}

#[tokio::test]
async fn csv_upload_to_leaderboard() {
    let db = league_db();
    // Give p3 a team through the roster so the blank team cell resolves.
    db.import_seed(&SeedData {
        participants: vec![Participant {
            first_name: Some("First3".into()),
            last_name: Some("Last3".into()),
            team_id: Some("c".into()),
            ..Participant::named("p3", "Player 3")
        }],
        ..Default::default()
    })
    .unwrap();

    let table = import::read_rows(UPLOAD.as_bytes()).unwrap();
    let kpis = db.load_kpis(GAME).await.unwrap();
    let mapping = mapping();
    mapping.validate(&table.headers, &kpis).unwrap();

    let participants = db.load_participants().await.unwrap();
    let teams = db.load_teams().await.unwrap();
    let output = Reconciler::new(GAME, &mapping, &participants, &teams).reconcile(&table.rows);

    let messages: Vec<String> = output.errors.iter().map(ToString::to_string).collect();
    assert_eq!(output.errors.len(), 3, "{messages:?}");
    assert_eq!(output.errors[0].line, 5);
    assert_eq!(output.errors[0].column.as_deref(), Some("Date"));
    assert_eq!(output.errors[1].line, 6);
    assert_eq!(output.errors[2].line, 7);
    assert_eq!(output.errors[2].column.as_deref(), Some("Sales"));

    // Row 2: two KPIs, row 3: one, row 4: one, row 7: Calls only.
    assert_eq!(output.records.len(), 5);

    let summary = import::submit(db.as_ref(), &output.records).await;
    assert_eq!(summary.succeeded, 5);
    assert_eq!(summary.failed, 0);

    let stats = db.load_stats(GAME).await.unwrap();
    assert_eq!(stats.len(), 5);

    let board = leaderboard::compute(&stats, &kpis, &participants, &teams);
    // p1: 2*5 + 10 = 20; p3: 4; p2: 5; p5: 6.
    let top: Vec<(&str, i64)> = board
        .participants
        .iter()
        .map(|s| (s.id.as_str(), s.points))
        .collect();
    assert_eq!(top, vec![("p1", 20), ("p5", 6), ("p2", 5), ("p3", 4)]);
    assert_eq!(board.teams[0].id, "a");
    assert_eq!(board.teams[0].points, 20);
}

#[tokio::test]
async fn failed_stat_inserts_are_counted() {
    let db = league_db();
    let table = import::read_rows("Name,Team,Date,Sales,Calls\nPlayer 1,Team A,2024-05-01,1,1\n".as_bytes())
        .unwrap();
    let mapping = mapping();
    let participants = db.load_participants().await.unwrap();
    let teams = db.load_teams().await.unwrap();
    let mut output = Reconciler::new(GAME, &mapping, &participants, &teams).reconcile(&table.rows);
    assert_eq!(output.records.len(), 2);

    // Point one record at a KPI the store does not know.
    output.records[1].kpi_id = "k_missing".into();
    let summary = import::submit(db.as_ref(), &output.records).await;
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 1);
}

// ===========================================================================
// Schedule
// ===========================================================================

#[tokio::test(start_paused = true)]
async fn schedule_covers_drafted_teams() {
    let db = league_db();
    let state = draft_state(&db, false).await;
    let mut handle = spawn(&db, state);
    handle.commands.send(DraftCommand::Start).await.unwrap();
    for i in 1..=8 {
        handle
            .commands
            .send(DraftCommand::Pick {
                participant_id: format!("p{i}"),
            })
            .await
            .unwrap();
    }
    wait_for_finalize(&mut handle.updates).await;
    drop(handle.commands);
    handle.task.await.unwrap();

    let ids: Vec<String> = db
        .load_game_teams(GAME)
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.id)
        .collect();
    let weeks = schedule::round_robin(&ids);
    assert_eq!(weeks.len(), 3);
    assert_eq!(weeks.iter().map(|w| w.matchups.len()).sum::<usize>(), 6);
}
