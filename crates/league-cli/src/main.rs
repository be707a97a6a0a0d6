// League command-line front end.
//
// Startup sequence:
// 1. Initialize tracing (log to file, not terminal)
// 2. Load config (copying defaults on first run)
// 3. Open the configured store (SQLite or REST)
// 4. Run the requested subcommand

use std::collections::HashMap;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::mpsc;
use tracing::{info, warn};

use league_core::config::{self, Config, StoreBackend};
use league_core::db::{Database, SeedData};
use league_core::draft::finalize::FinalizeStatus;
use league_core::draft::roster::{self, Team};
use league_core::draft::session;
use league_core::draft::state::DraftState;
use league_core::protocol::{DraftCommand, DraftUpdate};
use league_core::schedule;
use league_core::stats::import::{self, ColumnMapping, KpiColumn, Reconciler};
use league_core::stats::leaderboard;
use league_core::store::rest::RestStore;
use league_core::store::LeagueStore;

#[derive(Parser)]
#[command(name = "league", version, about = "Run drafts and track stats for an office league")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load games, teams, participants and KPIs from a TOML file into SQLite.
    Seed {
        #[arg(long)]
        file: PathBuf,
    },
    /// Run a live snake draft. Type a participant id per line to pick,
    /// `finalize` to retry saving, `cancel` to quit.
    Draft {
        #[arg(long)]
        game: String,
        #[arg(long, value_delimiter = ',', required = true)]
        teams: Vec<String>,
        /// Seed for clock auto-picks.
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Upload a CSV of daily KPI values.
    ImportStats {
        #[arg(long)]
        game: String,
        #[arg(long)]
        file: PathBuf,
        /// Full-name column, or first-name then last-name column.
        #[arg(long = "name-column", required = true)]
        name_columns: Vec<String>,
        #[arg(long)]
        team_column: Option<String>,
        #[arg(long)]
        date_column: String,
        /// `column=kpi_id`, repeatable.
        #[arg(long = "kpi", required = true, value_parser = parse_kpi_column)]
        kpis: Vec<KpiColumn>,
    },
    /// Print participant and team standings.
    Leaderboard {
        #[arg(long)]
        game: String,
    },
    /// Print the head-to-head schedule for a game's teams.
    Schedule {
        #[arg(long)]
        game: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing()?;
    info!("League CLI starting up");

    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: league={}, backend={:?}",
        config.league.name, config.store.backend
    );

    match cli.command {
        Commands::Seed { file } => seed(&config, file),
        Commands::Draft { game, teams, seed } => {
            let store = open_store(&config).await?;
            draft(&config, store, &game, &teams, seed).await
        }
        Commands::ImportStats {
            game,
            file,
            name_columns,
            team_column,
            date_column,
            kpis,
        } => {
            let store = open_store(&config).await?;
            let mapping = ColumnMapping {
                name_columns,
                team_column,
                date_column,
                kpi_columns: kpis,
            };
            import_stats(store.as_ref(), &game, file, &mapping).await
        }
        Commands::Leaderboard { game } => {
            let store = open_store(&config).await?;
            print_leaderboard(store.as_ref(), &game).await
        }
        Commands::Schedule { game } => {
            let store = open_store(&config).await?;
            print_schedule(store.as_ref(), &game).await
        }
    }
}

fn parse_kpi_column(raw: &str) -> Result<KpiColumn, String> {
    match raw.split_once('=') {
        Some((column, kpi_id)) if !column.trim().is_empty() && !kpi_id.trim().is_empty() => {
            Ok(KpiColumn {
                column: column.trim().to_string(),
                kpi_id: kpi_id.trim().to_string(),
            })
        }
        _ => Err(format!("expected column=kpi_id, got `{raw}`")),
    }
}

async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn LeagueStore>> {
    match config.store.backend {
        StoreBackend::Sqlite => {
            let db = Database::open(&config.store.db_path).context("failed to open database")?;
            info!("Database opened at {}", config.store.db_path);
            Ok(Arc::new(db))
        }
        StoreBackend::Rest => {
            let (Some(url), Some(api_key)) = (&config.store.rest_url, &config.credentials.api_key)
            else {
                bail!("REST backend needs store.rest_url and credentials api_key");
            };
            let mut store = RestStore::new(url.as_str(), api_key.as_str());
            if let (Some(email), Some(password)) =
                (&config.credentials.email, &config.credentials.password)
            {
                store.sign_in(email, password).await?;
            }
            if store.is_signed_in() {
                info!("Using REST store at {} (signed in)", url);
            } else {
                warn!("Using REST store at {} with the project key only", url);
            }
            Ok(Arc::new(store))
        }
    }
}

fn seed(config: &Config, file: PathBuf) -> anyhow::Result<()> {
    if config.store.backend != StoreBackend::Sqlite {
        bail!("seeding is only supported for the sqlite backend");
    }
    let text = std::fs::read_to_string(&file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let data: SeedData =
        toml::from_str(&text).with_context(|| format!("failed to parse {}", file.display()))?;

    let db = Database::open(&config.store.db_path).context("failed to open database")?;
    db.import_seed(&data)?;
    info!(
        "Seeded {} games, {} teams, {} participants, {} KPIs",
        data.games.len(),
        data.teams.len(),
        data.participants.len(),
        data.kpis.len()
    );
    println!(
        "seeded {} games, {} teams, {} participants, {} KPIs",
        data.games.len(),
        data.teams.len(),
        data.participants.len(),
        data.kpis.len()
    );
    Ok(())
}

async fn draft(
    config: &Config,
    store: Arc<dyn LeagueStore>,
    game_id: &str,
    team_ids: &[String],
    seed: Option<u64>,
) -> anyhow::Result<()> {
    let game = store
        .load_game(game_id)
        .await?
        .with_context(|| format!("unknown game {game_id}"))?;

    let all_teams: HashMap<String, Team> = store
        .load_teams()
        .await?
        .into_iter()
        .map(|t| (t.id.clone(), t))
        .collect();
    let mut selected = Vec::with_capacity(team_ids.len());
    for id in team_ids {
        match all_teams.get(id) {
            Some(team) => selected.push(team.clone()),
            None => bail!("unknown team {id}"),
        }
    }

    let participants = store.load_participants().await?;
    let resolved = roster::resolve(participants, &selected, game.team_count)?;
    let state = DraftState::new(game.id.clone(), resolved, &config.draft);

    let rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let mut handle = session::spawn(state, store, config.draft.tick_interval(), rng);

    handle.commands.send(DraftCommand::Start).await?;
    spawn_stdin_reader(handle.commands.clone());

    while let Some(update) = handle.updates.recv().await {
        println!("{}", serde_json::to_string(&update)?);
        match update {
            DraftUpdate::Finalized { report } => match report.status() {
                FinalizeStatus::AllSucceeded => break,
                status => {
                    for batch in report.failed() {
                        warn!("Finalize batch {:?} failed: {:?}", batch.kind, batch.error);
                    }
                    eprintln!("finalize ended {status:?}; type `finalize` to retry or `cancel` to quit");
                }
            },
            DraftUpdate::Cancelled => break,
            _ => {}
        }
    }

    drop(handle.commands);
    handle.updates.close();
    Ok(())
}

/// Read commands from stdin on a plain thread; tokio's stdin would block
/// runtime shutdown while waiting for input.
fn spawn_stdin_reader(commands: mpsc::Sender<DraftCommand>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            let cmd = match line.trim() {
                "" => continue,
                "cancel" => DraftCommand::Cancel,
                "finalize" => DraftCommand::Finalize,
                id => DraftCommand::Pick {
                    participant_id: id.to_string(),
                },
            };
            if commands.blocking_send(cmd).is_err() {
                break;
            }
        }
    });
}

async fn import_stats(
    store: &dyn LeagueStore,
    game_id: &str,
    file: PathBuf,
    mapping: &ColumnMapping,
) -> anyhow::Result<()> {
    let reader = std::fs::File::open(&file)
        .with_context(|| format!("failed to open {}", file.display()))?;
    let table = import::read_rows(reader)?;

    let kpis = store.load_kpis(game_id).await?;
    mapping.validate(&table.headers, &kpis)?;

    let participants = store.load_participants().await?;
    let teams = store.load_teams().await?;
    let output = Reconciler::new(game_id, mapping, &participants, &teams).reconcile(&table.rows);

    if !output.errors.is_empty() {
        println!("{} row errors:", output.errors.len());
        for error in &output.errors {
            println!("  {error}");
        }
    }

    let summary = import::submit(store, &output.records).await;
    println!(
        "{} stats saved, {} failed, {} rows with errors",
        summary.succeeded,
        summary.failed,
        output.errors.len()
    );
    Ok(())
}

async fn print_leaderboard(store: &dyn LeagueStore, game_id: &str) -> anyhow::Result<()> {
    let game = store
        .load_game(game_id)
        .await?
        .with_context(|| format!("unknown game {game_id}"))?;
    let kpis = store.load_kpis(game_id).await?;
    let stats = store.load_stats(game_id).await?;
    let participants = store.load_participants().await?;
    let teams = store.load_teams().await?;

    let board = leaderboard::compute(&stats, &kpis, &participants, &teams);

    println!("{}", game.name);
    println!("\nTeams");
    for s in &board.teams {
        println!("{:>3}. {:<30} {:>8}", s.rank, s.name, s.points);
    }
    println!("\nPlayers");
    for s in &board.participants {
        println!("{:>3}. {:<30} {:>8}", s.rank, s.name, s.points);
    }
    Ok(())
}

async fn print_schedule(store: &dyn LeagueStore, game_id: &str) -> anyhow::Result<()> {
    let game = store
        .load_game(game_id)
        .await?
        .with_context(|| format!("unknown game {game_id}"))?;
    if !game.h2h {
        bail!("game {} is not head-to-head", game.id);
    }

    let teams = store.load_game_teams(game_id).await?;
    if teams.len() < 2 {
        bail!("game {} has fewer than two teams; run the draft first", game.id);
    }
    let names: HashMap<&str, &str> = teams
        .iter()
        .map(|t| (t.id.as_str(), t.name.as_str()))
        .collect();
    let ids: Vec<String> = teams.iter().map(|t| t.id.clone()).collect();
    let name = |id: &str| names.get(id).copied().unwrap_or(id).to_string();

    for week in schedule::round_robin(&ids) {
        println!("Week {}", week.number);
        for m in &week.matchups {
            println!("  {} vs {}", name(&m.home), name(&m.away));
        }
        if let Some(bye) = &week.bye {
            println!("  bye: {}", name(bye));
        }
    }
    Ok(())
}

/// Set up tracing to log to a file in the `logs/` directory. Terminal output
/// is reserved for command results.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("league.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("league_core=info,league_cli=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
