// Bulk stat import: CSV rows matched to participants, teams and KPIs.
//
// Row problems never abort the import. Each one becomes a RowError and the
// rest of the file is still reconciled; only the mapping itself can fail the
// whole import.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io::Read;

use chrono::NaiveDate;
use futures_util::future::join_all;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::StatRecord;
use crate::draft::participant::{non_blank, Participant};
use crate::draft::roster::Team;
use crate::store::{Kpi, LeagueStore};

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("failed to read CSV: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("column `{0}` is not in the CSV header")]
    MissingColumn(String),

    #[error("invalid column mapping: {0}")]
    InvalidMapping(String),
}

/// A CSV data row keyed by header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsvRow {
    /// 1-based file line the record starts on.
    pub line: usize,
    pub cells: HashMap<String, String>,
}

impl CsvRow {
    /// Cell under `column`, empty when the column is absent.
    pub fn get(&self, column: &str) -> &str {
        self.cells.get(column).map(String::as_str).unwrap_or("")
    }
}

#[derive(Debug, Clone, Default)]
pub struct CsvTable {
    pub headers: Vec<String>,
    pub rows: Vec<CsvRow>,
}

/// Read a CSV file with a header line. Cells are trimmed; short rows are
/// padded with empty values.
pub fn read_rows<R: Read>(mut rdr: R) -> Result<CsvTable, ImportError> {
    let mut data = Vec::new();
    rdr.read_to_end(&mut data)?;
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(data.as_slice());

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record?;
        let line = record
            .position()
            .map_or(idx + 2, |pos| first_line(&data, pos));
        let cells = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.clone(), record.get(i).unwrap_or("").to_string()))
            .collect();
        rows.push(CsvRow { line, cells });
    }
    debug!("Read {} CSV rows with {} columns", rows.len(), headers.len());
    Ok(CsvTable { headers, rows })
}

/// File line a record starts on. The reader positions a record where it
/// began scanning, which is before any blank lines it skipped.
fn first_line(data: &[u8], pos: &csv::Position) -> usize {
    let start = usize::try_from(pos.byte()).map_or(data.len(), |b| b.min(data.len()));
    let skipped = data[start..]
        .iter()
        .take_while(|&&b| matches!(b, b'\r' | b'\n'))
        .filter(|&&b| b == b'\n')
        .count();
    usize::try_from(pos.line())
        .unwrap_or(usize::MAX)
        .saturating_add(skipped)
}

// ---------------------------------------------------------------------------
// Column mapping
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KpiColumn {
    pub column: String,
    pub kpi_id: String,
}

/// Which CSV columns feed which fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    /// One column holding the full name, or two holding first and last name.
    pub name_columns: Vec<String>,
    pub team_column: Option<String>,
    pub date_column: String,
    pub kpi_columns: Vec<KpiColumn>,
}

impl ColumnMapping {
    /// Check the mapping against the file header and the game's KPIs.
    pub fn validate(&self, headers: &[String], kpis: &[Kpi]) -> Result<(), ImportError> {
        if self.name_columns.is_empty() || self.name_columns.len() > 2 {
            return Err(ImportError::InvalidMapping(
                "map one full-name column or a first-name and last-name column".into(),
            ));
        }
        if self.kpi_columns.is_empty() {
            return Err(ImportError::InvalidMapping(
                "map at least one KPI column".into(),
            ));
        }

        let columns = self
            .name_columns
            .iter()
            .chain(self.team_column.iter())
            .chain(std::iter::once(&self.date_column))
            .chain(self.kpi_columns.iter().map(|k| &k.column));
        for column in columns {
            if !headers.iter().any(|h| h == column) {
                return Err(ImportError::MissingColumn(column.clone()));
            }
        }

        for mapped in &self.kpi_columns {
            if !kpis.iter().any(|k| k.id == mapped.kpi_id) {
                return Err(ImportError::InvalidMapping(format!(
                    "column `{}` is mapped to unknown KPI {}",
                    mapped.column, mapped.kpi_id
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Name lookup
// ---------------------------------------------------------------------------

fn normalize(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Case-insensitive name → participant id lookup.
///
/// Each participant is reachable by resolved name, "first last" and
/// "last, first". First-only and last-only keys are added only when no other
/// participant shares them. On a full-name clash the earlier participant keeps
/// the key.
#[derive(Debug, Clone, Default)]
pub struct NameIndex {
    names: HashMap<String, String>,
}

impl NameIndex {
    pub fn build(participants: &[Participant]) -> Self {
        let mut names: HashMap<String, String> = HashMap::new();

        for p in participants {
            let first = non_blank(&p.first_name);
            let last = non_blank(&p.last_name);
            let mut keys = vec![p.name()];
            if let (Some(first), Some(last)) = (first, last) {
                keys.push(format!("{first} {last}"));
                keys.push(format!("{last}, {first}"));
            }
            for key in keys {
                names.entry(normalize(&key)).or_insert_with(|| p.id.clone());
            }
        }

        let mut single_counts: HashMap<String, usize> = HashMap::new();
        for p in participants {
            let singles: HashSet<String> = [non_blank(&p.first_name), non_blank(&p.last_name)]
                .into_iter()
                .flatten()
                .map(normalize)
                .collect();
            for key in singles {
                *single_counts.entry(key).or_default() += 1;
            }
        }
        for p in participants {
            for single in [non_blank(&p.first_name), non_blank(&p.last_name)]
                .into_iter()
                .flatten()
            {
                let key = normalize(single);
                if single_counts.get(&key) == Some(&1) {
                    names.entry(key).or_insert_with(|| p.id.clone());
                }
            }
        }

        NameIndex { names }
    }

    pub fn resolve(&self, name: &str) -> Option<&str> {
        self.names.get(&normalize(name)).map(String::as_str)
    }
}

/// Case-insensitive team name (or id) → team id lookup.
#[derive(Debug, Clone, Default)]
pub struct TeamIndex {
    teams: HashMap<String, String>,
}

impl TeamIndex {
    pub fn build(teams: &[Team]) -> Self {
        let mut index = HashMap::new();
        for team in teams {
            index
                .entry(normalize(&team.name))
                .or_insert_with(|| team.id.clone());
        }
        for team in teams {
            index
                .entry(normalize(&team.id))
                .or_insert_with(|| team.id.clone());
        }
        TeamIndex { teams: index }
    }

    pub fn resolve(&self, value: &str) -> Option<&str> {
        self.teams.get(&normalize(value)).map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

/// A problem with one row (or one cell) of the import file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowError {
    /// Line in the file, counting the header as line 1.
    pub line: usize,
    pub column: Option<String>,
    pub message: String,
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.column {
            Some(column) => write!(f, "Row {}, column '{}': {}", self.line, column, self.message),
            None => write!(f, "Row {}: {}", self.line, self.message),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReconcileOutput {
    pub records: Vec<StatRecord>,
    pub errors: Vec<RowError>,
}

/// Strict `YYYY-MM-DD` that is also a real calendar date.
pub fn parse_strict_date(raw: &str) -> Option<NaiveDate> {
    let bytes = raw.as_bytes();
    let shape_ok = bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        });
    if !shape_ok {
        return None;
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

/// Matches rows against one game's roster and teams.
pub struct Reconciler<'a> {
    game_id: &'a str,
    mapping: &'a ColumnMapping,
    names: NameIndex,
    teams: TeamIndex,
    roster_teams: HashMap<String, String>,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        game_id: &'a str,
        mapping: &'a ColumnMapping,
        participants: &[Participant],
        teams: &[Team],
    ) -> Self {
        let roster_teams = participants
            .iter()
            .filter_map(|p| p.team_id.clone().map(|t| (p.id.clone(), t)))
            .collect();
        Reconciler {
            game_id,
            mapping,
            names: NameIndex::build(participants),
            teams: TeamIndex::build(teams),
            roster_teams,
        }
    }

    pub fn reconcile(&self, rows: &[CsvRow]) -> ReconcileOutput {
        let mut output = ReconcileOutput::default();
        for row in rows {
            self.reconcile_row(row, &mut output);
        }
        info!(
            "Reconciled {} rows: {} stat records, {} errors",
            rows.len(),
            output.records.len(),
            output.errors.len()
        );
        output
    }

    fn reconcile_row(&self, row: &CsvRow, output: &mut ReconcileOutput) {
        let line = row.line;
        let cell = |column: &str| row.get(column).trim();
        let mut errors = Vec::new();
        let mut error = |column: Option<&str>, message: String| {
            errors.push(RowError {
                line,
                column: column.map(str::to_string),
                message,
            })
        };

        let name = self
            .mapping
            .name_columns
            .iter()
            .map(|c| cell(c.as_str()))
            .filter(|v| !v.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        let name_column = self.mapping.name_columns.first().map(String::as_str);
        let participant_id = if name.is_empty() {
            error(name_column, "player name is empty".into());
            None
        } else {
            let found = self.names.resolve(&name);
            if found.is_none() {
                error(name_column, format!("unknown player '{name}'"));
            }
            found
        };

        let team_value = self
            .mapping
            .team_column
            .as_deref()
            .map(cell)
            .filter(|v| !v.is_empty());
        let named_team = team_value.and_then(|v| self.teams.resolve(v));
        let team_id = named_team
            .or_else(|| participant_id.and_then(|p| self.roster_teams.get(p).map(String::as_str)));
        if let (Some(v), None, Some(fallback)) = (team_value, named_team, team_id) {
            warn!(
                "Row {}: unknown team '{}', crediting '{}' to roster team {}",
                line, v, name, fallback
            );
        }
        if team_id.is_none() && participant_id.is_some() {
            match team_value {
                Some(v) => error(
                    self.mapping.team_column.as_deref(),
                    format!("unknown team '{v}' and player '{name}' has no team"),
                ),
                None => error(None, format!("could not determine a team for '{name}'")),
            }
        }

        let raw_date = cell(self.mapping.date_column.as_str());
        let date = parse_strict_date(raw_date);
        if date.is_none() {
            error(
                Some(self.mapping.date_column.as_str()),
                format!("invalid date '{raw_date}', expected YYYY-MM-DD"),
            );
        }

        let (Some(participant_id), Some(team_id), Some(date)) = (participant_id, team_id, date)
        else {
            debug!("Row {} rejected with {} errors", line, errors.len());
            output.errors.extend(errors);
            return;
        };

        for mapped in &self.mapping.kpi_columns {
            let raw = cell(mapped.column.as_str());
            if raw.is_empty() {
                continue;
            }
            match raw.parse::<i64>() {
                Ok(value) => output.records.push(StatRecord {
                    game_id: self.game_id.to_string(),
                    participant_id: participant_id.to_string(),
                    team_id: team_id.to_string(),
                    kpi_id: mapped.kpi_id.clone(),
                    value,
                    date,
                }),
                Err(_) => output.errors.push(RowError {
                    line,
                    column: Some(mapped.column.clone()),
                    message: format!("'{raw}' is not a whole number"),
                }),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SubmitSummary {
    pub succeeded: usize,
    pub failed: usize,
}

/// Insert every record independently and concurrently. Failures are counted,
/// never retried or rolled back.
pub async fn submit<S: LeagueStore + ?Sized>(store: &S, records: &[StatRecord]) -> SubmitSummary {
    let results = join_all(records.iter().map(|r| store.insert_stat(r))).await;

    let mut summary = SubmitSummary::default();
    for (record, result) in records.iter().zip(results) {
        match result {
            Ok(()) => summary.succeeded += 1,
            Err(e) => {
                warn!(
                    "Failed to save stat {} for {} on {}: {:#}",
                    record.kpi_id, record.participant_id, record.date, e
                );
                summary.failed += 1;
            }
        }
    }
    info!(
        "Stat submission: {} saved, {} failed",
        summary.succeeded, summary.failed
    );
    summary
}
