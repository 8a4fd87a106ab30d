use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{MongoDaoError, MongoResult};
use crate::dao::models::{
    CardEntity, Correctness, Difficulty, GameEntity, ParticipantEntity, ParticipantRoundEntity,
    RankingEntity, RoundEntity, SessionMode, SessionStatus,
};

pub const GAME_COLLECTION: &str = "games";
pub const PARTICIPANT_COLLECTION: &str = "participants";
pub const ROUND_COLLECTION: &str = "rounds";
pub const PARTICIPANT_ROUND_COLLECTION: &str = "participant_rounds";
pub const RANKING_COLLECTION: &str = "rankings";
pub const DECK_COLLECTION: &str = "decks";
pub const CARD_COLLECTION: &str = "cards";
pub const GRANT_COLLECTION: &str = "user_decks";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: i64,
    pub deck_id: i64,
    pub mode: SessionMode,
    pub status: SessionStatus,
    pub total_points: i64,
    pub total_rounds: i64,
    pub started_at: DateTime,
    pub ended_at: Option<DateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub game_id: String,
    pub name: String,
    pub total_points: i64,
    pub total_rounds: i64,
    pub turn_order: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub game_id: String,
    pub card_id: i64,
    pub correctness: Correctness,
    pub points: i64,
    pub played_at: DateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantRoundDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub game_id: String,
    pub participant_id: String,
    pub card_id: i64,
    pub correctness: Correctness,
    pub points: i64,
    pub played_at: DateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: i64,
    pub deck_id: i64,
    pub points_total: i64,
    pub games_played: i64,
    pub last_played_at: DateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeckDocument {
    #[serde(rename = "_id")]
    pub id: i64,
    pub title: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardDocument {
    #[serde(rename = "_id")]
    pub id: i64,
    pub deck_id: i64,
    pub song_name: String,
    pub artist_name: String,
    #[serde(default)]
    pub album_title: Option<String>,
    pub difficulty: Difficulty,
}

fn default_active() -> bool {
    true
}

fn parse_id(collection: &'static str, value: &str) -> MongoResult<Uuid> {
    Uuid::parse_str(value).map_err(|source| MongoDaoError::InvalidId {
        collection,
        value: value.to_owned(),
        source,
    })
}

fn to_u32(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

impl From<&GameEntity> for GameDocument {
    fn from(value: &GameEntity) -> Self {
        Self {
            id: value.id.to_string(),
            user_id: value.user_id,
            deck_id: value.deck_id,
            mode: value.mode,
            status: value.status,
            total_points: i64::from(value.total_points),
            total_rounds: i64::from(value.total_rounds),
            started_at: DateTime::from_system_time(value.started_at),
            ended_at: value.ended_at.map(DateTime::from_system_time),
        }
    }
}

impl TryFrom<GameDocument> for GameEntity {
    type Error = MongoDaoError;

    fn try_from(value: GameDocument) -> MongoResult<Self> {
        Ok(Self {
            id: parse_id(GAME_COLLECTION, &value.id)?,
            user_id: value.user_id,
            deck_id: value.deck_id,
            mode: value.mode,
            status: value.status,
            total_points: to_u32(value.total_points),
            total_rounds: to_u32(value.total_rounds),
            started_at: value.started_at.to_system_time(),
            ended_at: value.ended_at.map(DateTime::to_system_time),
        })
    }
}

impl From<&ParticipantEntity> for ParticipantDocument {
    fn from(value: &ParticipantEntity) -> Self {
        Self {
            id: value.id.to_string(),
            game_id: value.game_id.to_string(),
            name: value.name.clone(),
            total_points: i64::from(value.total_points),
            total_rounds: i64::from(value.total_rounds),
            turn_order: i64::from(value.turn_order),
        }
    }
}

impl TryFrom<ParticipantDocument> for ParticipantEntity {
    type Error = MongoDaoError;

    fn try_from(value: ParticipantDocument) -> MongoResult<Self> {
        Ok(Self {
            id: parse_id(PARTICIPANT_COLLECTION, &value.id)?,
            game_id: parse_id(PARTICIPANT_COLLECTION, &value.game_id)?,
            name: value.name,
            total_points: to_u32(value.total_points),
            total_rounds: to_u32(value.total_rounds),
            turn_order: to_u32(value.turn_order),
        })
    }
}

impl From<&RoundEntity> for RoundDocument {
    fn from(value: &RoundEntity) -> Self {
        Self {
            id: value.id.to_string(),
            game_id: value.game_id.to_string(),
            card_id: value.card_id,
            correctness: value.correctness,
            points: i64::from(value.points),
            played_at: DateTime::from_system_time(value.played_at),
        }
    }
}

impl TryFrom<RoundDocument> for RoundEntity {
    type Error = MongoDaoError;

    fn try_from(value: RoundDocument) -> MongoResult<Self> {
        Ok(Self {
            id: parse_id(ROUND_COLLECTION, &value.id)?,
            game_id: parse_id(ROUND_COLLECTION, &value.game_id)?,
            card_id: value.card_id,
            correctness: value.correctness,
            points: to_u32(value.points),
            played_at: value.played_at.to_system_time(),
        })
    }
}

impl From<&ParticipantRoundEntity> for ParticipantRoundDocument {
    fn from(value: &ParticipantRoundEntity) -> Self {
        Self {
            id: value.id.to_string(),
            game_id: value.game_id.to_string(),
            participant_id: value.participant_id.to_string(),
            card_id: value.card_id,
            correctness: value.correctness,
            points: i64::from(value.points),
            played_at: DateTime::from_system_time(value.played_at),
        }
    }
}

impl TryFrom<ParticipantRoundDocument> for ParticipantRoundEntity {
    type Error = MongoDaoError;

    fn try_from(value: ParticipantRoundDocument) -> MongoResult<Self> {
        Ok(Self {
            id: parse_id(PARTICIPANT_ROUND_COLLECTION, &value.id)?,
            game_id: parse_id(PARTICIPANT_ROUND_COLLECTION, &value.game_id)?,
            participant_id: parse_id(PARTICIPANT_ROUND_COLLECTION, &value.participant_id)?,
            card_id: value.card_id,
            correctness: value.correctness,
            points: to_u32(value.points),
            played_at: value.played_at.to_system_time(),
        })
    }
}

impl TryFrom<RankingDocument> for RankingEntity {
    type Error = MongoDaoError;

    fn try_from(value: RankingDocument) -> MongoResult<Self> {
        Ok(Self {
            id: parse_id(RANKING_COLLECTION, &value.id)?,
            user_id: value.user_id,
            deck_id: value.deck_id,
            points_total: u64::try_from(value.points_total.max(0)).unwrap_or_default(),
            games_played: to_u32(value.games_played),
            last_played_at: value.last_played_at.to_system_time(),
        })
    }
}

impl From<CardDocument> for CardEntity {
    fn from(value: CardDocument) -> Self {
        Self {
            id: value.id,
            deck_id: value.deck_id,
            song_name: value.song_name,
            artist_name: value.artist_name,
            album_title: value.album_title,
            difficulty: value.difficulty,
        }
    }
}
