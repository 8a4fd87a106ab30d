pub mod memory;

use std::time::SystemTime;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::models::{
    CardId, DeckId, GameEntity, ParticipantEntity, ParticipantRoundEntity, RankingEntity,
    RoundEntity, UserId,
};
use crate::dao::storage::StorageResult;

/// Rows written by a single round submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundWrites {
    /// One simple-mode round for the game owner.
    Simple(RoundEntity),
    /// One round per participant; each also bumps that participant's aggregates.
    Participants(Vec<ParticipantRoundEntity>),
}

/// Unit of work applied atomically by [`SessionStore::commit_rounds`].
///
/// Either every row insert and aggregate increment lands, or none does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundCommit {
    pub game_id: Uuid,
    /// When set, the commit only applies while `total_rounds` still has this value.
    pub expected_total_rounds: Option<u32>,
    pub writes: RoundWrites,
    /// Added to the game's `total_points`.
    pub game_points: u32,
    /// Added to the game's `total_rounds`.
    pub game_rounds: u32,
}

impl RoundCommit {
    /// Points and round count applied to each participant touched by the commit.
    pub fn participant_increments(&self) -> Vec<(Uuid, u32)> {
        match &self.writes {
            RoundWrites::Simple(_) => Vec::new(),
            RoundWrites::Participants(rounds) => rounds
                .iter()
                .map(|round| (round.participant_id, round.points))
                .collect(),
        }
    }
}

/// Finish transition applied atomically by [`SessionStore::finish_game`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishCommit {
    pub game_id: Uuid,
    pub user_id: UserId,
    pub deck_id: DeckId,
    pub ended_at: SystemTime,
    /// Identifier used if the ranking row does not exist yet.
    pub new_ranking_id: Uuid,
}

/// Abstraction over the persistence layer for game sessions and rankings.
pub trait SessionStore: Send + Sync {
    /// Persist a new started game with its participants in one write.
    fn create_game(
        &self,
        game: GameEntity,
        participants: Vec<ParticipantEntity>,
    ) -> BoxFuture<'static, StorageResult<()>>;
    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>>;
    fn find_started_game(
        &self,
        user_id: UserId,
        deck_id: DeckId,
    ) -> BoxFuture<'static, StorageResult<Option<GameEntity>>>;
    /// Participants of a game ordered by turn order.
    fn list_participants(
        &self,
        game_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ParticipantEntity>>>;
    /// Simple-mode rounds ordered by play time.
    fn list_rounds(&self, game_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<RoundEntity>>>;
    /// Participant rounds ordered by play time.
    fn list_participant_rounds(
        &self,
        game_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ParticipantRoundEntity>>>;
    fn find_round(
        &self,
        game_id: Uuid,
        card_id: CardId,
    ) -> BoxFuture<'static, StorageResult<Option<RoundEntity>>>;
    fn find_participant_rounds_for_card(
        &self,
        game_id: Uuid,
        card_id: CardId,
    ) -> BoxFuture<'static, StorageResult<Vec<ParticipantRoundEntity>>>;
    /// Apply a round submission atomically and return the updated game.
    fn commit_rounds(&self, commit: RoundCommit) -> BoxFuture<'static, StorageResult<GameEntity>>;
    /// Mark a game finished and fold its points into the ranking atomically.
    fn finish_game(
        &self,
        commit: FinishCommit,
    ) -> BoxFuture<'static, StorageResult<(GameEntity, RankingEntity)>>;
    /// Move a started game to expired. Returns false when it was no longer started.
    fn expire_game(&self, id: Uuid, ended_at: SystemTime) -> BoxFuture<'static, StorageResult<bool>>;
    fn find_ranking(
        &self,
        user_id: UserId,
        deck_id: DeckId,
    ) -> BoxFuture<'static, StorageResult<Option<RankingEntity>>>;
    /// Rankings of a deck, best first (points desc, then most recent play).
    fn list_deck_rankings(
        &self,
        deck_id: DeckId,
        limit: u32,
        offset: u32,
    ) -> BoxFuture<'static, StorageResult<Vec<RankingEntity>>>;
    /// Rankings of a user across decks, points desc.
    fn list_user_rankings(
        &self,
        user_id: UserId,
    ) -> BoxFuture<'static, StorageResult<Vec<RankingEntity>>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
