use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{
        CardEntity, CardId, Correctness, DeckId, Difficulty, ParticipantRoundEntity, RoundEntity,
        SessionMode, SessionStatus,
    },
    dto::{format_system_time, ranking::RankingSummary, validation::validate_guess},
    services::{
        scoring::{self, Score, SelfReport},
        session_manager::{
            FinishOutcome, GuessText, ParticipantAnswer, ParticipantResult,
            ParticipantRoundsOutcome, RoundOutcome, SessionSnapshot, TurnOutcome,
        },
    },
    state::session::{GameSession, Participant},
};

fn default_mode() -> SessionMode {
    SessionMode::Simple
}

/// Payload used to open a new game on a deck.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct StartGameRequest {
    #[validate(range(min = 1))]
    pub deck_id: DeckId,
    /// Defaults to `simple`.
    #[serde(default = "default_mode")]
    pub mode: SessionMode,
    /// Local players in turn order; required by every mode but `simple`.
    #[serde(default)]
    pub participants: Vec<ParticipantInput>,
}

/// Named local player supplied at game start.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ParticipantInput {
    pub name: String,
}

/// Free-text answers of the game owner in a simple game.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SimpleRoundRequest {
    #[validate(range(min = 1))]
    pub card_id: CardId,
    #[serde(default)]
    #[validate(custom(function = "validate_guess"))]
    pub song_guess: Option<String>,
    #[serde(default)]
    #[validate(custom(function = "validate_guess"))]
    pub artist_guess: Option<String>,
    #[serde(default)]
    #[validate(custom(function = "validate_guess"))]
    pub album_guess: Option<String>,
}

impl SimpleRoundRequest {
    pub(crate) fn guess(&self) -> GuessText {
        GuessText {
            song: self.song_guess.clone(),
            artist: self.artist_guess.clone(),
            album: self.album_guess.clone(),
        }
    }
}

/// One participant's free-text answers in a score round.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct ParticipantGuessInput {
    pub participant_id: Uuid,
    #[serde(default)]
    #[validate(custom(function = "validate_guess"))]
    pub song_guess: Option<String>,
    #[serde(default)]
    #[validate(custom(function = "validate_guess"))]
    pub artist_guess: Option<String>,
    #[serde(default)]
    #[validate(custom(function = "validate_guess"))]
    pub album_guess: Option<String>,
}

/// Answers of several participants for the same card in a score game.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct ScoreRoundRequest {
    #[validate(range(min = 1))]
    pub card_id: CardId,
    #[validate(nested)]
    pub participant_answers: Vec<ParticipantGuessInput>,
}

impl ScoreRoundRequest {
    pub(crate) fn answers(&self) -> Vec<ParticipantAnswer<GuessText>> {
        self.participant_answers
            .iter()
            .map(|input| ParticipantAnswer {
                participant_id: input.participant_id,
                answer: GuessText {
                    song: input.song_guess.clone(),
                    artist: input.artist_guess.clone(),
                    album: input.album_guess.clone(),
                },
            })
            .collect()
    }
}

/// What a participant claims to have known about the card.
#[derive(Debug, Clone, Copy, Default, Deserialize, ToSchema)]
pub struct SelfReportInput {
    #[serde(default)]
    pub song_knew: bool,
    #[serde(default)]
    pub artist_knew: bool,
    #[serde(default)]
    pub album_knew: bool,
}

impl From<SelfReportInput> for SelfReport {
    fn from(value: SelfReportInput) -> Self {
        Self {
            song_knew: value.song_knew,
            artist_knew: value.artist_knew,
            album_knew: value.album_knew,
        }
    }
}

/// One participant's self-report in a competitive round.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ParticipantSelfReportInput {
    pub participant_id: Uuid,
    pub knew: SelfReportInput,
}

/// Self-reports of several participants for the same card in a competitive game.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CompetitiveRoundRequest {
    #[validate(range(min = 1))]
    pub card_id: CardId,
    pub participant_answers: Vec<ParticipantSelfReportInput>,
}

impl CompetitiveRoundRequest {
    pub(crate) fn answers(&self) -> Vec<ParticipantAnswer<SelfReport>> {
        self.participant_answers
            .iter()
            .map(|input| ParticipantAnswer {
                participant_id: input.participant_id,
                answer: input.knew.into(),
            })
            .collect()
    }
}

/// Self-report of the participant whose turn it is.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct TurnRoundRequest {
    #[validate(range(min = 1))]
    pub card_id: CardId,
    pub participant_id: Uuid,
    pub knew: SelfReportInput,
}

/// Local player as exposed to clients.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ParticipantSummary {
    pub id: Uuid,
    pub name: String,
    pub total_points: u32,
    pub total_rounds: u32,
    pub turn_order: u32,
}

impl From<&Participant> for ParticipantSummary {
    fn from(value: &Participant) -> Self {
        Self {
            id: value.id,
            name: value.name.clone(),
            total_points: value.total_points,
            total_rounds: value.total_rounds,
            turn_order: value.turn_order,
        }
    }
}

/// Game header with its participants.
#[derive(Debug, Serialize, ToSchema)]
pub struct GameSummary {
    pub id: Uuid,
    pub deck_id: DeckId,
    pub mode: SessionMode,
    pub status: SessionStatus,
    pub total_points: u32,
    pub total_rounds: u32,
    /// RFC 3339 timestamp.
    pub started_at: String,
    pub ended_at: Option<String>,
    pub participants: Vec<ParticipantSummary>,
}

impl From<&GameSession> for GameSummary {
    fn from(value: &GameSession) -> Self {
        Self {
            id: value.id,
            deck_id: value.deck_id,
            mode: value.mode,
            status: value.status,
            total_points: value.total_points,
            total_rounds: value.total_rounds,
            started_at: format_system_time(value.started_at),
            ended_at: value.ended_at.map(format_system_time),
            participants: value
                .participants
                .values()
                .map(ParticipantSummary::from)
                .collect(),
        }
    }
}

/// Per-field correctness of a round.
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct FieldCorrectness {
    pub song: bool,
    pub artist: bool,
    pub album: bool,
}

impl From<Correctness> for FieldCorrectness {
    fn from(value: Correctness) -> Self {
        Self {
            song: value.song,
            artist: value.artist,
            album: value.album,
        }
    }
}

/// Breakdown of the points earned in a round.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PointsBreakdown {
    /// One point per correct field.
    pub base: u32,
    /// Extra points from the difficulty multiplier.
    pub bonus: u32,
    pub points: u32,
    pub multiplier: f64,
}

impl PointsBreakdown {
    fn new(score: &Score, difficulty: Difficulty) -> Self {
        Self {
            base: score.base,
            bonus: score.bonus,
            points: score.points,
            multiplier: if score.base == 0 {
                1.0
            } else {
                scoring::multiplier(difficulty)
            },
        }
    }
}

/// Canonical answers of a card, revealed once the card is scored.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CardAnswer {
    pub card_id: CardId,
    pub song_name: String,
    pub artist_name: String,
    pub album_title: Option<String>,
    pub difficulty: Difficulty,
}

impl From<&CardEntity> for CardAnswer {
    fn from(value: &CardEntity) -> Self {
        Self {
            card_id: value.id,
            song_name: value.song_name.clone(),
            artist_name: value.artist_name.clone(),
            album_title: value.album_title.clone(),
            difficulty: value.difficulty,
        }
    }
}

/// A recorded round in the game history.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoundRecord {
    pub id: Uuid,
    pub card_id: CardId,
    /// Set for rounds played by a participant.
    pub participant_id: Option<Uuid>,
    pub correct: FieldCorrectness,
    pub points: u32,
    pub played_at: String,
}

impl From<&RoundEntity> for RoundRecord {
    fn from(value: &RoundEntity) -> Self {
        Self {
            id: value.id,
            card_id: value.card_id,
            participant_id: None,
            correct: value.correctness.into(),
            points: value.points,
            played_at: format_system_time(value.played_at),
        }
    }
}

impl From<&ParticipantRoundEntity> for RoundRecord {
    fn from(value: &ParticipantRoundEntity) -> Self {
        Self {
            id: value.id,
            card_id: value.card_id,
            participant_id: Some(value.participant_id),
            correct: value.correctness.into(),
            points: value.points,
            played_at: format_system_time(value.played_at),
        }
    }
}

fn round_records(snapshot: &SessionSnapshot) -> Vec<RoundRecord> {
    snapshot
        .rounds
        .iter()
        .map(RoundRecord::from)
        .chain(snapshot.participant_rounds.iter().map(RoundRecord::from))
        .collect()
}

/// Full state of a game: header, round history and current turn.
#[derive(Debug, Serialize, ToSchema)]
pub struct GameStateResponse {
    pub game: GameSummary,
    pub rounds: Vec<RoundRecord>,
    /// Participant expected to play next in `competitive_turns` games.
    pub current_turn: Option<ParticipantSummary>,
}

impl From<&SessionSnapshot> for GameStateResponse {
    fn from(value: &SessionSnapshot) -> Self {
        Self {
            game: GameSummary::from(&value.session),
            rounds: round_records(value),
            current_turn: value.current_turn.as_ref().map(ParticipantSummary::from),
        }
    }
}

/// Result of a simple round.
#[derive(Debug, Serialize, ToSchema)]
pub struct SimpleRoundResponse {
    pub answer: CardAnswer,
    pub correct: FieldCorrectness,
    pub score: PointsBreakdown,
    pub total_points: u32,
    pub total_rounds: u32,
}

impl From<RoundOutcome> for SimpleRoundResponse {
    fn from(value: RoundOutcome) -> Self {
        Self {
            answer: CardAnswer::from(&value.card),
            correct: value.score.correctness.into(),
            score: PointsBreakdown::new(&value.score, value.card.difficulty),
            total_points: value.game.total_points,
            total_rounds: value.game.total_rounds,
        }
    }
}

/// Score of one participant in a round.
#[derive(Debug, Serialize, ToSchema)]
pub struct ParticipantRoundResult {
    pub participant: ParticipantSummary,
    pub correct: FieldCorrectness,
    pub score: PointsBreakdown,
}

impl ParticipantRoundResult {
    fn new(result: &ParticipantResult, difficulty: Difficulty) -> Self {
        Self {
            participant: ParticipantSummary::from(&result.participant),
            correct: result.score.correctness.into(),
            score: PointsBreakdown::new(&result.score, difficulty),
        }
    }
}

/// Result of a score or competitive round.
#[derive(Debug, Serialize, ToSchema)]
pub struct ParticipantRoundResponse {
    pub answer: CardAnswer,
    pub results: Vec<ParticipantRoundResult>,
    pub total_points: u32,
    pub total_rounds: u32,
}

impl From<ParticipantRoundsOutcome> for ParticipantRoundResponse {
    fn from(value: ParticipantRoundsOutcome) -> Self {
        let difficulty = value.card.difficulty;
        Self {
            answer: CardAnswer::from(&value.card),
            results: value
                .results
                .iter()
                .map(|result| ParticipantRoundResult::new(result, difficulty))
                .collect(),
            total_points: value.game.total_points,
            total_rounds: value.game.total_rounds,
        }
    }
}

/// Result of a turn round, with the participant who plays next.
#[derive(Debug, Serialize, ToSchema)]
pub struct TurnRoundResponse {
    pub answer: CardAnswer,
    pub result: ParticipantRoundResult,
    pub total_points: u32,
    pub total_rounds: u32,
    pub next_turn: Option<ParticipantSummary>,
}

impl From<TurnOutcome> for TurnRoundResponse {
    fn from(value: TurnOutcome) -> Self {
        Self {
            answer: CardAnswer::from(&value.card),
            result: ParticipantRoundResult::new(&value.result, value.card.difficulty),
            total_points: value.game.total_points,
            total_rounds: value.game.total_rounds,
            next_turn: value.next_participant.as_ref().map(ParticipantSummary::from),
        }
    }
}

/// Final state of a finished game and the updated ranking.
#[derive(Debug, Serialize, ToSchema)]
pub struct FinishGameResponse {
    pub game: GameSummary,
    pub rounds: Vec<RoundRecord>,
    pub ranking: RankingSummary,
}

impl From<FinishOutcome> for FinishGameResponse {
    fn from(value: FinishOutcome) -> Self {
        Self {
            game: GameSummary::from(&value.snapshot.session),
            rounds: round_records(&value.snapshot),
            ranking: RankingSummary::from(&value.ranking),
        }
    }
}

/// Points a self-report would earn on a card. Nothing is recorded.
#[derive(Debug, Serialize, ToSchema)]
pub struct ScoreCardResponse {
    pub answer: CardAnswer,
    pub correct: FieldCorrectness,
    pub score: PointsBreakdown,
}

impl ScoreCardResponse {
    pub(crate) fn new(card: &CardEntity, score: &Score) -> Self {
        Self {
            answer: CardAnswer::from(card),
            correct: score.correctness.into(),
            score: PointsBreakdown::new(score, card.difficulty),
        }
    }
}
