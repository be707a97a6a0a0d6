// League store backed by a hosted Postgres exposed through a PostgREST-style
// HTTP API.

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::future::try_join_all;
use reqwest::{Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{Game, Kpi, LeagueStore};
use crate::db::last_picks;
use crate::draft::finalize::{Participation, TeamAssignment, TeamGame};
use crate::draft::participant::Participant;
use crate::draft::pick::FinalPick;
use crate::draft::roster::Team;
use crate::stats::StatRecord;

const REST_PATH: &str = "rest/v1";
const TOKEN_PATH: &str = "auth/v1/token";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Serialize)]
struct TeamPatch<'a> {
    team_id: &'a str,
}

/// HTTP league store. Every request carries the project API key; once
/// signed in, the user's access token replaces the key as bearer.
pub struct RestStore {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    access_token: Option<String>,
}

impl RestStore {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http: reqwest::Client::new(),
            base_url,
            api_key: api_key.into(),
            access_token: None,
        }
    }

    /// Exchange email and password for an access token used on later calls.
    pub async fn sign_in(&mut self, email: &str, password: &str) -> Result<()> {
        let url = self.auth_url()?;
        let response = self
            .http
            .post(url)
            .header("apikey", &self.api_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .context("failed to reach auth endpoint")?
            .error_for_status()
            .context("sign-in rejected")?;

        let token: TokenResponse = response
            .json()
            .await
            .context("failed to parse sign-in response")?;
        self.access_token = Some(token.access_token);
        info!("Signed in as {}", email);
        Ok(())
    }

    pub fn is_signed_in(&self) -> bool {
        self.access_token.is_some()
    }

    fn auth_url(&self) -> Result<Url> {
        Url::parse_with_params(
            &format!("{}/{}", self.base_url, TOKEN_PATH),
            &[("grant_type", "password")],
        )
        .context("invalid auth URL")
    }

    fn table_url(&self, table: &str, params: &[(&str, String)]) -> Result<Url> {
        let base = format!("{}/{}/{}", self.base_url, REST_PATH, table);
        let url = if params.is_empty() {
            Url::parse(&base)
        } else {
            Url::parse_with_params(&base, params)
        };
        url.with_context(|| format!("invalid URL for table {table}"))
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let bearer = self.access_token.as_deref().unwrap_or(&self.api_key);
        self.http
            .request(method, url)
            .header("apikey", &self.api_key)
            .bearer_auth(bearer)
    }

    async fn select<T: DeserializeOwned>(&self, table: &str, filters: &[(&str, String)]) -> Result<Vec<T>> {
        let mut params = vec![("select", "*".to_string())];
        params.extend(filters.iter().cloned());
        let url = self.table_url(table, &params)?;
        debug!("GET {}", url);

        self.request(Method::GET, url)
            .send()
            .await
            .with_context(|| format!("failed to read {table}"))?
            .error_for_status()
            .with_context(|| format!("reading {table} failed"))?
            .json()
            .await
            .with_context(|| format!("failed to parse {table} rows"))
    }

    async fn upsert<T: Serialize + Sync>(&self, table: &str, conflict: &str, rows: &[T]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let url = self.table_url(table, &[("on_conflict", conflict.to_string())])?;
        debug!("POST {} ({} rows)", url, rows.len());

        self.request(Method::POST, url)
            .header("Prefer", "resolution=merge-duplicates")
            .json(rows)
            .send()
            .await
            .with_context(|| format!("failed to write {table}"))?
            .error_for_status()
            .with_context(|| format!("writing {table} failed"))?;
        Ok(())
    }

    async fn insert<T: Serialize + Sync>(&self, table: &str, row: &T) -> Result<()> {
        let url = self.table_url(table, &[])?;
        self.request(Method::POST, url)
            .json(row)
            .send()
            .await
            .with_context(|| format!("failed to insert into {table}"))?
            .error_for_status()
            .with_context(|| format!("insert into {table} failed"))?;
        Ok(())
    }

    async fn assign_team(&self, assignment: &TeamAssignment) -> Result<()> {
        let url = self.table_url(
            "participants",
            &[("id", format!("eq.{}", assignment.participant_id))],
        )?;
        self.request(Method::PATCH, url)
            .json(&TeamPatch {
                team_id: &assignment.team_id,
            })
            .send()
            .await
            .with_context(|| format!("failed to assign {}", assignment.participant_id))?
            .error_for_status()
            .with_context(|| format!("assigning {} failed", assignment.participant_id))?;
        Ok(())
    }

    fn trim_picks_url(&self, game_id: &str, last: u32) -> Result<Url> {
        self.table_url(
            "draft_picks",
            &[("game_id", eq(game_id)), ("overall_pick", format!("gt.{last}"))],
        )
    }

    /// Delete a game's picks numbered past `last`.
    async fn trim_picks(&self, game_id: &str, last: u32) -> Result<()> {
        let url = self.trim_picks_url(game_id, last)?;
        debug!("DELETE {}", url);
        self.request(Method::DELETE, url)
            .send()
            .await
            .context("failed to trim draft_picks")?
            .error_for_status()
            .context("trimming draft_picks failed")?;
        Ok(())
    }
}

fn eq(value: &str) -> String {
    format!("eq.{value}")
}

#[async_trait]
impl LeagueStore for RestStore {
    async fn load_game(&self, game_id: &str) -> Result<Option<Game>> {
        let games: Vec<Game> = self.select("games", &[("id", eq(game_id))]).await?;
        Ok(games.into_iter().next())
    }

    async fn load_participants(&self) -> Result<Vec<Participant>> {
        self.select("participants", &[]).await
    }

    async fn load_teams(&self) -> Result<Vec<Team>> {
        self.select("teams", &[]).await
    }

    async fn load_game_teams(&self, game_id: &str) -> Result<Vec<Team>> {
        let links: Vec<TeamGame> = self.select("team_games", &[("game_id", eq(game_id))]).await?;
        if links.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<&str> = links.iter().map(|l| l.team_id.as_str()).collect();
        self.select("teams", &[("id", format!("in.({})", ids.join(",")))])
            .await
    }

    async fn load_kpis(&self, game_id: &str) -> Result<Vec<Kpi>> {
        self.select("kpis", &[("game_id", eq(game_id))]).await
    }

    async fn load_stats(&self, game_id: &str) -> Result<Vec<StatRecord>> {
        self.select("stats", &[("game_id", eq(game_id))]).await
    }

    /// One PATCH per participant, sent concurrently. A failure reports the
    /// first error; PATCHes that already succeeded stay applied.
    async fn assign_teams(&self, assignments: &[TeamAssignment]) -> Result<()> {
        try_join_all(assignments.iter().map(|a| self.assign_team(a))).await?;
        Ok(())
    }

    async fn upsert_team_games(&self, rows: &[TeamGame]) -> Result<()> {
        self.upsert("team_games", "game_id,team_id", rows).await
    }

    async fn upsert_participations(&self, rows: &[Participation]) -> Result<()> {
        self.upsert("game_participants", "game_id,player_id", rows)
            .await
    }

    async fn upsert_picks(&self, picks: &[FinalPick]) -> Result<()> {
        self.upsert("draft_picks", "game_id,overall_pick", picks).await?;
        for (game_id, last) in last_picks(picks) {
            self.trim_picks(game_id, last).await?;
        }
        Ok(())
    }

    async fn insert_stat(&self, stat: &StatRecord) -> Result<()> {
        self.insert("stats", stat).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> RestStore {
        RestStore::new("https://league.example.com/", "anon-key")
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        assert_eq!(store().base_url, "https://league.example.com");
    }

    #[test]
    fn table_url_encodes_filters() {
        let url = store()
            .table_url(
                "stats",
                &[("select", "*".to_string()), ("game_id", eq("g 1"))],
            )
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://league.example.com/rest/v1/stats?select=*&game_id=eq.g+1"
        );
    }

    #[test]
    fn upsert_url_names_conflict_target() {
        let url = store()
            .table_url("draft_picks", &[("on_conflict", "game_id,overall_pick".into())])
            .unwrap();
        assert_eq!(url.path(), "/rest/v1/draft_picks");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![("on_conflict".to_string(), "game_id,overall_pick".to_string())]
        );
    }

    #[test]
    fn auth_url_uses_password_grant() {
        let url = store().auth_url().unwrap();
        assert_eq!(
            url.as_str(),
            "https://league.example.com/auth/v1/token?grant_type=password"
        );
    }

    #[test]
    fn bare_table_url_has_no_query() {
        let url = store().table_url("teams", &[]).unwrap();
        assert_eq!(url.as_str(), "https://league.example.com/rest/v1/teams");
        assert!(!store().is_signed_in());
    }

    #[test]
    fn trim_picks_url_targets_trailing_picks() {
        let url = store().trim_picks_url("g1", 2).unwrap();
        assert_eq!(
            url.as_str(),
            "https://league.example.com/rest/v1/draft_picks?game_id=eq.g1&overall_pick=gt.2"
        );
    }

    #[test]
    fn participation_serializes_player_id_column() {
        let row = Participation {
            game_id: "g1".into(),
            participant_id: "p1".into(),
            team_id: "t1".into(),
        };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["player_id"], "p1");
        assert!(json.get("participant_id").is_none());
    }
}
