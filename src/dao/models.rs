use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use utoipa::ToSchema;
use uuid::Uuid;

/// Identifier of a registered user (owned by the authentication layer).
pub type UserId = i64;
/// Identifier of a deck in the card catalog.
pub type DeckId = i64;
/// Identifier of a card in the card catalog.
pub type CardId = i64;

/// Game mode selected when a session is started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// Single player guessing free-text answers.
    Simple,
    /// Local participants guessing free-text answers for the same card.
    Score,
    /// Local participants self-reporting what they knew, all at once.
    Competitive,
    /// Local participants self-reporting one at a time in a fixed order.
    CompetitiveTurns,
}

impl SessionMode {
    /// Whether the mode plays with named participants.
    pub fn has_participants(self) -> bool {
        !matches!(self, SessionMode::Simple)
    }

    /// Stable name used in storage documents and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            SessionMode::Simple => "simple",
            SessionMode::Score => "score",
            SessionMode::Competitive => "competitive",
            SessionMode::CompetitiveTurns => "competitive_turns",
        }
    }
}

/// Lifecycle status of a game. `Finished` and `Expired` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Started,
    Finished,
    Expired,
}

impl SessionStatus {
    /// Stable name used in storage documents and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Started => "started",
            SessionStatus::Finished => "finished",
            SessionStatus::Expired => "expired",
        }
    }
}

/// Difficulty tier of a card, driving the points multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// Deck metadata exposed by the card catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeckEntity {
    pub id: DeckId,
    pub title: String,
    pub active: bool,
    /// Number of cards currently attached to the deck.
    pub card_count: u64,
}

/// Card answer data exposed by the card catalog. Read-only for the session core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardEntity {
    pub id: CardId,
    pub deck_id: DeckId,
    pub song_name: String,
    pub artist_name: String,
    pub album_title: Option<String>,
    pub difficulty: Difficulty,
}

/// Persisted game session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameEntity {
    pub id: Uuid,
    pub user_id: UserId,
    pub deck_id: DeckId,
    pub mode: SessionMode,
    pub status: SessionStatus,
    /// Running sum of points over every recorded round.
    pub total_points: u32,
    /// Running count of round submissions; drives turn order in turn mode.
    pub total_rounds: u32,
    pub started_at: SystemTime,
    pub ended_at: Option<SystemTime>,
}

/// Named local player inside a game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantEntity {
    pub id: Uuid,
    pub game_id: Uuid,
    pub name: String,
    pub total_points: u32,
    pub total_rounds: u32,
    /// Zero-based position in turn mode, 0 otherwise.
    pub turn_order: u32,
}

/// Per-field correctness of a scored round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correctness {
    pub song: bool,
    pub artist: bool,
    pub album: bool,
}

/// Simple-mode round: one card played by the game owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundEntity {
    pub id: Uuid,
    pub game_id: Uuid,
    pub card_id: CardId,
    pub correctness: Correctness,
    pub points: u32,
    pub played_at: SystemTime,
}

/// Round played by a single participant in the multi-participant modes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantRoundEntity {
    pub id: Uuid,
    pub game_id: Uuid,
    pub participant_id: Uuid,
    pub card_id: CardId,
    pub correctness: Correctness,
    pub points: u32,
    pub played_at: SystemTime,
}

/// All-time aggregate for a (user, deck) pair across finished games.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankingEntity {
    pub id: Uuid,
    pub user_id: UserId,
    pub deck_id: DeckId,
    pub points_total: u64,
    pub games_played: u32,
    pub last_played_at: SystemTime,
}
