//! In-process session store. Every operation runs under one lock, which gives the
//! same all-or-nothing and serialization guarantees as a database transaction.

use std::{collections::HashMap, sync::Arc, time::SystemTime};

use futures::future::BoxFuture;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{FinishCommit, RoundCommit, RoundWrites, SessionStore};
use crate::dao::{
    models::{
        CardId, DeckId, GameEntity, ParticipantEntity, ParticipantRoundEntity, RankingEntity,
        RoundEntity, SessionStatus, UserId,
    },
    storage::{StorageConflict, StorageResult},
};

#[derive(Clone, Default)]
pub struct InMemorySessionStore {
    inner: Arc<Mutex<Tables>>,
}

#[derive(Default)]
struct Tables {
    games: HashMap<Uuid, GameEntity>,
    participants: HashMap<Uuid, ParticipantEntity>,
    rounds: Vec<RoundEntity>,
    participant_rounds: Vec<ParticipantRoundEntity>,
    rankings: HashMap<(UserId, DeckId), RankingEntity>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Tables {
    fn started_game(&self, user_id: UserId, deck_id: DeckId) -> Option<&GameEntity> {
        self.games.values().find(|game| {
            game.user_id == user_id
                && game.deck_id == deck_id
                && game.status == SessionStatus::Started
        })
    }

    /// Validate a commit against the current tables without mutating anything.
    fn check_commit(&self, commit: &RoundCommit) -> StorageResult<()> {
        let game = self
            .games
            .get(&commit.game_id)
            .filter(|game| game.status == SessionStatus::Started)
            .ok_or(StorageConflict::StaleGame)?;

        if let Some(expected) = commit.expected_total_rounds {
            if game.total_rounds != expected {
                return Err(StorageConflict::StaleGame.into());
            }
        }

        match &commit.writes {
            RoundWrites::Simple(round) => {
                if self
                    .rounds
                    .iter()
                    .any(|r| r.game_id == round.game_id && r.card_id == round.card_id)
                {
                    return Err(StorageConflict::DuplicateRound.into());
                }
            }
            RoundWrites::Participants(rounds) => {
                for (index, round) in rounds.iter().enumerate() {
                    let belongs = self
                        .participants
                        .get(&round.participant_id)
                        .is_some_and(|p| p.game_id == commit.game_id);
                    if !belongs {
                        return Err(StorageConflict::StaleGame.into());
                    }

                    let already_played = self.participant_rounds.iter().any(|r| {
                        r.participant_id == round.participant_id && r.card_id == round.card_id
                    });
                    let repeated_in_batch = rounds[..index].iter().any(|r| {
                        r.participant_id == round.participant_id && r.card_id == round.card_id
                    });
                    if already_played || repeated_in_batch {
                        return Err(StorageConflict::DuplicateRound.into());
                    }
                }
            }
        }

        Ok(())
    }
}

impl SessionStore for InMemorySessionStore {
    fn create_game(
        &self,
        game: GameEntity,
        participants: Vec<ParticipantEntity>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut tables = inner.lock().await;
            if tables.started_game(game.user_id, game.deck_id).is_some() {
                return Err(StorageConflict::ActiveGameExists.into());
            }
            for participant in participants {
                tables.participants.insert(participant.id, participant);
            }
            tables.games.insert(game.id, game);
            Ok(())
        })
    }

    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.lock().await.games.get(&id).cloned()) })
    }

    fn find_started_game(
        &self,
        user_id: UserId,
        deck_id: DeckId,
    ) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let tables = inner.lock().await;
            Ok(tables.started_game(user_id, deck_id).cloned())
        })
    }

    fn list_participants(
        &self,
        game_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ParticipantEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let tables = inner.lock().await;
            let mut participants: Vec<_> = tables
                .participants
                .values()
                .filter(|p| p.game_id == game_id)
                .cloned()
                .collect();
            participants.sort_by_key(|p| p.turn_order);
            Ok(participants)
        })
    }

    fn list_rounds(&self, game_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<RoundEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let tables = inner.lock().await;
            let mut rounds: Vec<_> = tables
                .rounds
                .iter()
                .filter(|r| r.game_id == game_id)
                .cloned()
                .collect();
            rounds.sort_by_key(|r| r.played_at);
            Ok(rounds)
        })
    }

    fn list_participant_rounds(
        &self,
        game_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ParticipantRoundEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let tables = inner.lock().await;
            let mut rounds: Vec<_> = tables
                .participant_rounds
                .iter()
                .filter(|r| r.game_id == game_id)
                .cloned()
                .collect();
            rounds.sort_by_key(|r| r.played_at);
            Ok(rounds)
        })
    }

    fn find_round(
        &self,
        game_id: Uuid,
        card_id: CardId,
    ) -> BoxFuture<'static, StorageResult<Option<RoundEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let tables = inner.lock().await;
            Ok(tables
                .rounds
                .iter()
                .find(|r| r.game_id == game_id && r.card_id == card_id)
                .cloned())
        })
    }

    fn find_participant_rounds_for_card(
        &self,
        game_id: Uuid,
        card_id: CardId,
    ) -> BoxFuture<'static, StorageResult<Vec<ParticipantRoundEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let tables = inner.lock().await;
            Ok(tables
                .participant_rounds
                .iter()
                .filter(|r| r.game_id == game_id && r.card_id == card_id)
                .cloned()
                .collect())
        })
    }

    fn commit_rounds(&self, commit: RoundCommit) -> BoxFuture<'static, StorageResult<GameEntity>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut tables = inner.lock().await;
            tables.check_commit(&commit)?;

            for (participant_id, points) in commit.participant_increments() {
                if let Some(participant) = tables.participants.get_mut(&participant_id) {
                    participant.total_points += points;
                    participant.total_rounds += 1;
                }
            }

            match commit.writes {
                RoundWrites::Simple(round) => tables.rounds.push(round),
                RoundWrites::Participants(rounds) => tables.participant_rounds.extend(rounds),
            }

            let game = tables
                .games
                .get_mut(&commit.game_id)
                .ok_or(StorageConflict::StaleGame)?;
            game.total_points += commit.game_points;
            game.total_rounds += commit.game_rounds;
            Ok(game.clone())
        })
    }

    fn finish_game(
        &self,
        commit: FinishCommit,
    ) -> BoxFuture<'static, StorageResult<(GameEntity, RankingEntity)>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut tables = inner.lock().await;
            let game = tables
                .games
                .get_mut(&commit.game_id)
                .filter(|game| game.status == SessionStatus::Started)
                .ok_or(StorageConflict::StaleGame)?;
            game.status = SessionStatus::Finished;
            game.ended_at = Some(commit.ended_at);
            let game = game.clone();

            let ranking = tables
                .rankings
                .entry((commit.user_id, commit.deck_id))
                .and_modify(|ranking| {
                    ranking.points_total += u64::from(game.total_points);
                    ranking.games_played += 1;
                    ranking.last_played_at = commit.ended_at;
                })
                .or_insert_with(|| RankingEntity {
                    id: commit.new_ranking_id,
                    user_id: commit.user_id,
                    deck_id: commit.deck_id,
                    points_total: u64::from(game.total_points),
                    games_played: 1,
                    last_played_at: commit.ended_at,
                })
                .clone();

            Ok((game, ranking))
        })
    }

    fn expire_game(&self, id: Uuid, ended_at: SystemTime) -> BoxFuture<'static, StorageResult<bool>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut tables = inner.lock().await;
            match tables.games.get_mut(&id) {
                Some(game) if game.status == SessionStatus::Started => {
                    game.status = SessionStatus::Expired;
                    game.ended_at = Some(ended_at);
                    Ok(true)
                }
                _ => Ok(false),
            }
        })
    }

    fn find_ranking(
        &self,
        user_id: UserId,
        deck_id: DeckId,
    ) -> BoxFuture<'static, StorageResult<Option<RankingEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.lock().await.rankings.get(&(user_id, deck_id)).cloned()) })
    }

    fn list_deck_rankings(
        &self,
        deck_id: DeckId,
        limit: u32,
        offset: u32,
    ) -> BoxFuture<'static, StorageResult<Vec<RankingEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let tables = inner.lock().await;
            let mut rankings: Vec<_> = tables
                .rankings
                .values()
                .filter(|r| r.deck_id == deck_id)
                .cloned()
                .collect();
            rankings.sort_by(|a, b| {
                b.points_total
                    .cmp(&a.points_total)
                    .then(b.last_played_at.cmp(&a.last_played_at))
            });
            Ok(rankings
                .into_iter()
                .skip(offset as usize)
                .take(limit as usize)
                .collect())
        })
    }

    fn list_user_rankings(
        &self,
        user_id: UserId,
    ) -> BoxFuture<'static, StorageResult<Vec<RankingEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let tables = inner.lock().await;
            let mut rankings: Vec<_> = tables
                .rankings
                .values()
                .filter(|r| r.user_id == user_id)
                .cloned()
                .collect();
            rankings.sort_by(|a, b| b.points_total.cmp(&a.points_total));
            Ok(rankings)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::dao::{
        models::{Correctness, SessionMode},
        storage::StorageError,
    };

    fn game(user_id: UserId, deck_id: DeckId) -> GameEntity {
        GameEntity {
            id: Uuid::new_v4(),
            user_id,
            deck_id,
            mode: SessionMode::Score,
            status: SessionStatus::Started,
            total_points: 0,
            total_rounds: 0,
            started_at: SystemTime::UNIX_EPOCH,
            ended_at: None,
        }
    }

    fn participant(game_id: Uuid, name: &str) -> ParticipantEntity {
        ParticipantEntity {
            id: Uuid::new_v4(),
            game_id,
            name: name.into(),
            total_points: 0,
            total_rounds: 0,
            turn_order: 0,
        }
    }

    fn participant_round(game_id: Uuid, participant_id: Uuid, points: u32) -> ParticipantRoundEntity {
        ParticipantRoundEntity {
            id: Uuid::new_v4(),
            game_id,
            participant_id,
            card_id: 7,
            correctness: Correctness::default(),
            points,
            played_at: SystemTime::UNIX_EPOCH,
        }
    }

    fn assert_conflict(err: StorageError, expected: StorageConflict) {
        match err {
            StorageError::Conflict(conflict) => assert_eq!(conflict, expected),
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn rejects_second_started_game_for_same_deck() {
        let store = InMemorySessionStore::new();
        store.create_game(game(1, 1), Vec::new()).await.unwrap();

        let err = store.create_game(game(1, 1), Vec::new()).await.unwrap_err();
        assert_conflict(err, StorageConflict::ActiveGameExists);

        store.create_game(game(1, 2), Vec::new()).await.unwrap();
    }

    #[tokio::test]
    async fn participant_commit_is_all_or_nothing() {
        let store = InMemorySessionStore::new();
        let game = game(1, 1);
        let alice = participant(game.id, "Alice");
        let bob = participant(game.id, "Bob");
        store
            .create_game(game.clone(), vec![alice.clone(), bob.clone()])
            .await
            .unwrap();

        let first = RoundCommit {
            game_id: game.id,
            expected_total_rounds: None,
            writes: RoundWrites::Participants(vec![participant_round(game.id, alice.id, 2)]),
            game_points: 2,
            game_rounds: 1,
        };
        store.commit_rounds(first).await.unwrap();

        // Bob is fine but Alice already played card 7: nothing from this batch may land.
        let second = RoundCommit {
            game_id: game.id,
            expected_total_rounds: None,
            writes: RoundWrites::Participants(vec![
                participant_round(game.id, bob.id, 3),
                participant_round(game.id, alice.id, 3),
            ]),
            game_points: 6,
            game_rounds: 1,
        };
        let err = store.commit_rounds(second).await.unwrap_err();
        assert_conflict(err, StorageConflict::DuplicateRound);

        let participants = store.list_participants(game.id).await.unwrap();
        let bob_after = participants.iter().find(|p| p.id == bob.id).unwrap();
        assert_eq!(bob_after.total_points, 0);
        assert_eq!(bob_after.total_rounds, 0);

        let stored = store.find_game(game.id).await.unwrap().unwrap();
        assert_eq!(stored.total_points, 2);
        assert_eq!(stored.total_rounds, 1);
        assert_eq!(store.list_participant_rounds(game.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn guarded_commit_rejects_moved_round_counter() {
        let store = InMemorySessionStore::new();
        let game = game(1, 1);
        let alice = participant(game.id, "Alice");
        store.create_game(game.clone(), vec![alice.clone()]).await.unwrap();

        let commit = RoundCommit {
            game_id: game.id,
            expected_total_rounds: Some(3),
            writes: RoundWrites::Participants(vec![participant_round(game.id, alice.id, 1)]),
            game_points: 1,
            game_rounds: 1,
        };
        let err = store.commit_rounds(commit).await.unwrap_err();
        assert_conflict(err, StorageConflict::StaleGame);
    }

    #[tokio::test]
    async fn finish_accumulates_ranking() {
        let store = InMemorySessionStore::new();
        let ended_at = SystemTime::UNIX_EPOCH + Duration::from_secs(60);

        for points in [4, 6] {
            let mut entity = game(9, 3);
            entity.total_points = points;
            store.create_game(entity.clone(), Vec::new()).await.unwrap();
            store
                .finish_game(FinishCommit {
                    game_id: entity.id,
                    user_id: 9,
                    deck_id: 3,
                    ended_at,
                    new_ranking_id: Uuid::new_v4(),
                })
                .await
                .unwrap();
        }

        let ranking = store.find_ranking(9, 3).await.unwrap().unwrap();
        assert_eq!(ranking.points_total, 10);
        assert_eq!(ranking.games_played, 2);
    }

    #[tokio::test]
    async fn expire_only_touches_started_games() {
        let store = InMemorySessionStore::new();
        let entity = game(1, 1);
        store.create_game(entity.clone(), Vec::new()).await.unwrap();

        assert!(store.expire_game(entity.id, SystemTime::now()).await.unwrap());
        assert!(!store.expire_game(entity.id, SystemTime::now()).await.unwrap());
        assert!(store.find_started_game(1, 1).await.unwrap().is_none());
    }
}
