// Configuration loading and parsing (league.toml, credentials.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub league: LeagueSection,
    pub draft: DraftConfig,
    pub store: StoreConfig,
    pub credentials: CredentialsConfig,
}

// ---------------------------------------------------------------------------
// league.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire league.toml file.
#[derive(Debug, Clone, Deserialize)]
struct LeagueFile {
    league: LeagueSection,
    #[serde(default)]
    draft: DraftConfig,
    store: StoreConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeagueSection {
    pub name: String,
}

/// Draft session tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct DraftConfig {
    /// Seconds on the pick clock before an auto-pick fires.
    #[serde(default = "default_pick_seconds")]
    pub pick_seconds: u32,
    /// Length of one clock unit in milliseconds.
    #[serde(default = "default_tick_millis")]
    pub tick_millis: u64,
    /// Whether managers get a participation record when the draft is finalized.
    #[serde(default)]
    pub include_managers: bool,
}

impl Default for DraftConfig {
    fn default() -> Self {
        DraftConfig {
            pick_seconds: default_pick_seconds(),
            tick_millis: default_tick_millis(),
            include_managers: false,
        }
    }
}

impl DraftConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_millis)
    }
}

fn default_pick_seconds() -> u32 {
    60
}

fn default_tick_millis() -> u64 {
    1000
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Sqlite,
    Rest,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    #[serde(default = "default_db_path")]
    pub db_path: String,
    #[serde(default)]
    pub rest_url: Option<String>,
}

fn default_db_path() -> String {
    "league.db".to_string()
}

// ---------------------------------------------------------------------------
// credentials.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CredentialsConfig {
    pub api_key: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/league.toml` and
/// (optionally) `config/credentials.toml`, relative to `base_dir`.
///
/// Does not copy defaults; `load_config()` does that first.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    // --- league.toml (required) ---
    let league_path = config_dir.join("league.toml");
    let league_text = read_file(&league_path)?;
    let league_file: LeagueFile =
        toml::from_str(&league_text).map_err(|e| ConfigError::ParseError {
            path: league_path.clone(),
            source: e,
        })?;

    // --- credentials.toml (optional) ---
    let credentials_path = config_dir.join("credentials.toml");
    let credentials = if credentials_path.exists() {
        let cred_text = read_file(&credentials_path)?;
        toml::from_str(&cred_text).map_err(|e| ConfigError::ParseError {
            path: credentials_path.clone(),
            source: e,
        })?
    } else {
        CredentialsConfig::default()
    };

    let config = Config {
        league: league_file.league,
        draft: league_file.draft,
        store: league_file.store,
        credentials,
    };

    validate(&config)?;

    Ok(config)
}

/// Ensure all config files exist by copying missing ones from `defaults/`.
/// Returns the list of files that were copied. Skips `.example` files.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.exists() {
        if !config_dir.exists() {
            return Err(ConfigError::DefaultsCopyError {
                message: format!(
                    "neither defaults/ nor config/ directory found in {}; \
                     run from the project root or ensure defaults/ is present",
                    base_dir.display()
                ),
            });
        }
        return Ok(vec![]);
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create config directory: {e}"),
    })?;

    let entries = std::fs::read_dir(&defaults_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to read defaults directory: {e}"),
    })?;

    let mut copied = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to read defaults entry: {e}"),
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name() else {
            continue;
        };
        if file_name.to_str().is_some_and(|n| n.ends_with(".example")) {
            continue;
        }
        let target = config_dir.join(file_name);

        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
        {
            Ok(mut dest) => {
                let content = std::fs::read(&path).map_err(|e| ConfigError::DefaultsCopyError {
                    message: format!("failed to read {}: {e}", path.display()),
                })?;
                std::io::Write::write_all(&mut dest, &content).map_err(|e| {
                    ConfigError::DefaultsCopyError {
                        message: format!("failed to write {}: {e}", target.display()),
                    }
                })?;
                copied.push(target);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => {
                return Err(ConfigError::DefaultsCopyError {
                    message: format!("failed to create {}: {e}", target.display()),
                });
            }
        }
    }

    Ok(copied)
}

/// Loads config relative to the current working directory, copying
/// defaults first.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    load_config_from(&cwd)
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.league.name.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "league.name".into(),
            message: "must not be empty".into(),
        });
    }

    if config.draft.pick_seconds == 0 {
        return Err(ConfigError::ValidationError {
            field: "draft.pick_seconds".into(),
            message: "must be greater than 0".into(),
        });
    }

    if config.draft.tick_millis == 0 {
        return Err(ConfigError::ValidationError {
            field: "draft.tick_millis".into(),
            message: "must be greater than 0".into(),
        });
    }

    match config.store.backend {
        StoreBackend::Sqlite => {
            if config.store.db_path.trim().is_empty() {
                return Err(ConfigError::ValidationError {
                    field: "store.db_path".into(),
                    message: "must not be empty for the sqlite backend".into(),
                });
            }
        }
        StoreBackend::Rest => {
            if config.store.rest_url.as_deref().map_or(true, |u| u.trim().is_empty()) {
                return Err(ConfigError::ValidationError {
                    field: "store.rest_url".into(),
                    message: "required for the rest backend".into(),
                });
            }
            if config.credentials.api_key.is_none() {
                return Err(ConfigError::ValidationError {
                    field: "credentials.api_key".into(),
                    message: "required for the rest backend".into(),
                });
            }
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const VALID_LEAGUE: &str = r#"
[league]
name = "Office League"

[draft]
pick_seconds = 45
tick_millis = 500
include_managers = true

[store]
backend = "sqlite"
db_path = "test.db"
"#;

    /// Fresh scratch directory with an empty `config/` inside.
    fn scratch(name: &str) -> PathBuf {
        let tmp = std::env::temp_dir().join(format!("league_config_{name}"));
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("config")).unwrap();
        tmp
    }

    fn repo_defaults() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../../defaults")
    }

    #[test]
    fn load_valid_config() {
        let tmp = scratch("valid");
        fs::write(tmp.join("config/league.toml"), VALID_LEAGUE).unwrap();

        let config = load_config_from(&tmp).expect("should load valid config");
        assert_eq!(config.league.name, "Office League");
        assert_eq!(config.draft.pick_seconds, 45);
        assert_eq!(config.draft.tick_interval(), Duration::from_millis(500));
        assert!(config.draft.include_managers);
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
        assert_eq!(config.store.db_path, "test.db");
        assert!(config.credentials.api_key.is_none());

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn shipped_defaults_load() {
        let tmp = scratch("shipped");
        fs::copy(
            repo_defaults().join("league.toml"),
            tmp.join("config/league.toml"),
        )
        .unwrap();

        let config = load_config_from(&tmp).expect("shipped defaults should be valid");
        assert_eq!(config.draft.pick_seconds, 60);
        assert_eq!(config.draft.tick_millis, 1000);
        assert!(!config.draft.include_managers);
        assert_eq!(config.store.backend, StoreBackend::Sqlite);

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn draft_section_is_optional() {
        let tmp = scratch("no_draft");
        fs::write(
            tmp.join("config/league.toml"),
            "[league]\nname = \"L\"\n\n[store]\nbackend = \"sqlite\"\n",
        )
        .unwrap();

        let config = load_config_from(&tmp).unwrap();
        assert_eq!(config.draft.pick_seconds, 60);
        assert_eq!(config.store.db_path, "league.db");

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_zero_pick_seconds() {
        let tmp = scratch("zero_pick");
        let text = VALID_LEAGUE.replace("pick_seconds = 45", "pick_seconds = 0");
        fs::write(tmp.join("config/league.toml"), text).unwrap();

        let err = load_config_from(&tmp).unwrap_err();
        match &err {
            ConfigError::ValidationError { field, .. } => {
                assert_eq!(field, "draft.pick_seconds");
            }
            other => panic!("expected ValidationError, got: {other}"),
        }

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rest_backend_requires_url() {
        let tmp = scratch("rest_no_url");
        let text = VALID_LEAGUE.replace("backend = \"sqlite\"", "backend = \"rest\"");
        fs::write(tmp.join("config/league.toml"), text).unwrap();

        let err = load_config_from(&tmp).unwrap_err();
        match &err {
            ConfigError::ValidationError { field, .. } => {
                assert_eq!(field, "store.rest_url");
            }
            other => panic!("expected ValidationError, got: {other}"),
        }

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rest_backend_requires_api_key() {
        let tmp = scratch("rest_no_key");
        let text = VALID_LEAGUE.replace(
            "backend = \"sqlite\"",
            "backend = \"rest\"\nrest_url = \"https://league.example.com\"",
        );
        fs::write(tmp.join("config/league.toml"), text).unwrap();

        let err = load_config_from(&tmp).unwrap_err();
        match &err {
            ConfigError::ValidationError { field, .. } => {
                assert_eq!(field, "credentials.api_key");
            }
            other => panic!("expected ValidationError, got: {other}"),
        }

        fs::write(tmp.join("config/credentials.toml"), "api_key = \"anon-key\"\n").unwrap();
        let config = load_config_from(&tmp).expect("api key present");
        assert_eq!(config.credentials.api_key.as_deref(), Some("anon-key"));

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn file_not_found_for_missing_league_toml() {
        let tmp = scratch("missing");

        let err = load_config_from(&tmp).unwrap_err();
        match &err {
            ConfigError::FileNotFound { path } => {
                assert!(path.ends_with("league.toml"));
            }
            other => panic!("expected FileNotFound, got: {other}"),
        }

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn parse_error_for_invalid_toml() {
        let tmp = scratch("invalid");
        fs::write(tmp.join("config/league.toml"), "this is not valid [[[ toml").unwrap();

        let err = load_config_from(&tmp).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_config_files_copies_missing_and_skips_examples() {
        let tmp = std::env::temp_dir().join("league_config_ensure");
        let _ = fs::remove_dir_all(&tmp);
        let defaults_dir = tmp.join("defaults");
        fs::create_dir_all(&defaults_dir).unwrap();
        fs::write(defaults_dir.join("league.toml"), VALID_LEAGUE).unwrap();
        fs::write(defaults_dir.join("credentials.toml.example"), "api_key = \"...\"\n").unwrap();

        let copied = ensure_config_files(&tmp).expect("should succeed");
        assert_eq!(copied.len(), 1);
        assert!(tmp.join("config/league.toml").exists());
        assert!(!tmp.join("config/credentials.toml.example").exists());

        // Second run leaves the existing file alone.
        fs::write(tmp.join("config/league.toml"), "# custom\n").unwrap();
        let copied = ensure_config_files(&tmp).unwrap();
        assert!(copied.is_empty());
        let content = fs::read_to_string(tmp.join("config/league.toml")).unwrap();
        assert_eq!(content, "# custom\n");

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_config_files_errors_when_both_dirs_missing() {
        let tmp = std::env::temp_dir().join("league_config_both_missing");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(&tmp).unwrap();

        let err = ensure_config_files(&tmp).unwrap_err();
        match &err {
            ConfigError::DefaultsCopyError { message } => {
                assert!(message.contains("neither defaults/ nor config/"));
            }
            other => panic!("expected DefaultsCopyError, got: {other}"),
        }

        let _ = fs::remove_dir_all(&tmp);
    }
}
