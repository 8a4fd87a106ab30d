//! Application-level configuration loading: session rules and the catalog seed.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::dao::models::{CardId, DeckId, Difficulty, UserId};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "OLDLY_FUN_BACK_CONFIG_PATH";

const DEFAULT_TTL_SECS: u64 = 3600;
const DEFAULT_MAX_PARTICIPANTS: usize = 8;
const DEFAULT_MAX_PARTICIPANT_NAME_LEN: usize = 80;

#[derive(Debug, Clone, Default)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Rules applied by the session manager.
    pub session: SessionSettings,
    /// Decks, cards and grants loaded into the in-memory catalog backend.
    pub catalog: CatalogSeed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Limits and timeouts for game sessions.
pub struct SessionSettings {
    /// Age after which a started game is considered abandoned.
    pub ttl: Duration,
    pub max_participants: usize,
    /// Maximum participant name length in characters, after trimming.
    pub max_participant_name_len: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(DEFAULT_TTL_SECS),
            max_participants: DEFAULT_MAX_PARTICIPANTS,
            max_participant_name_len: DEFAULT_MAX_PARTICIPANT_NAME_LEN,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
/// Catalog content used to seed the in-memory backend.
pub struct CatalogSeed {
    #[serde(default)]
    pub decks: Vec<DeckSeed>,
    #[serde(default)]
    pub grants: Vec<GrantSeed>,
}

#[derive(Debug, Clone, Deserialize)]
/// A deck and its cards.
pub struct DeckSeed {
    pub id: DeckId,
    pub title: String,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub cards: Vec<CardSeed>,
}

#[derive(Debug, Clone, Deserialize)]
/// A card inside a [`DeckSeed`].
pub struct CardSeed {
    pub id: CardId,
    pub song_name: String,
    pub artist_name: String,
    #[serde(default)]
    pub album_title: Option<String>,
    pub difficulty: Difficulty,
}

#[derive(Debug, Clone, Copy, Deserialize)]
/// Access grant of a user to a deck.
pub struct GrantSeed {
    pub user_id: UserId,
    pub deck_id: DeckId,
}

fn default_active() -> bool {
    true
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(app_config) => {
                    info!(
                        path = %path.display(),
                        decks = app_config.catalog.decks.len(),
                        ttl_secs = app_config.session.ttl.as_secs(),
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Parse a JSON configuration document. Missing sections take their defaults.
    pub fn from_json(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<RawConfig>(contents).map(Into::into)
    }
}

#[derive(Debug, Default, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    session: RawSession,
    #[serde(default)]
    catalog: CatalogSeed,
}

#[derive(Debug, Default, Deserialize)]
struct RawSession {
    ttl_secs: Option<u64>,
    max_participants: Option<usize>,
    max_participant_name_len: Option<usize>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = SessionSettings::default();
        let session = SessionSettings {
            ttl: value
                .session
                .ttl_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.ttl),
            max_participants: value
                .session
                .max_participants
                .unwrap_or(defaults.max_participants),
            max_participant_name_len: value
                .session
                .max_participant_name_len
                .unwrap_or(defaults.max_participant_name_len),
        };

        Self {
            session,
            catalog: value.catalog,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = AppConfig::from_json("{}").unwrap();
        assert_eq!(config.session, SessionSettings::default());
        assert_eq!(config.session.ttl, Duration::from_secs(3600));
        assert!(config.catalog.decks.is_empty());
    }

    #[test]
    fn partial_session_section_keeps_other_defaults() {
        let config = AppConfig::from_json(r#"{"session": {"ttl_secs": 60}}"#).unwrap();
        assert_eq!(config.session.ttl, Duration::from_secs(60));
        assert_eq!(config.session.max_participants, 8);
        assert_eq!(config.session.max_participant_name_len, 80);
    }

    #[test]
    fn parses_catalog_seed() {
        let config = AppConfig::from_json(
            r#"{
                "catalog": {
                    "decks": [{
                        "id": 1,
                        "title": "Rock en español",
                        "cards": [{
                            "id": 10,
                            "song_name": "De música ligera",
                            "artist_name": "Soda Stereo",
                            "difficulty": "medium"
                        }]
                    }],
                    "grants": [{"user_id": 42, "deck_id": 1}]
                }
            }"#,
        )
        .unwrap();

        let deck = &config.catalog.decks[0];
        assert!(deck.active);
        assert_eq!(deck.cards[0].album_title, None);
        assert_eq!(deck.cards[0].difficulty, Difficulty::Medium);
        assert_eq!(config.catalog.grants[0].user_id, 42);
    }

    #[test]
    fn rejects_unknown_difficulty() {
        let err = AppConfig::from_json(
            r#"{"catalog": {"decks": [{"id": 1, "title": "x", "cards": [
                {"id": 1, "song_name": "a", "artist_name": "b", "difficulty": "brutal"}
            ]}]}}"#,
        );
        assert!(err.is_err());
    }
}
