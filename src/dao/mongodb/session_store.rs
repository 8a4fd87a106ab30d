use std::time::SystemTime;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    ClientSession, Collection, IndexModel,
    bson::{DateTime, Document, doc},
    options::{IndexOptions, ReturnDocument},
};
use serde::de::DeserializeOwned;
use tracing::warn;
use uuid::Uuid;

use super::{
    connection::MongoHandle,
    error::{MongoDaoError, MongoResult},
    models::{
        GAME_COLLECTION, GameDocument, PARTICIPANT_COLLECTION, PARTICIPANT_ROUND_COLLECTION,
        ParticipantDocument, ParticipantRoundDocument, RANKING_COLLECTION, ROUND_COLLECTION,
        RankingDocument, RoundDocument,
    },
};
use crate::dao::{
    models::{
        CardId, DeckId, GameEntity, ParticipantEntity, ParticipantRoundEntity, RankingEntity,
        RoundEntity, SessionStatus, UserId,
    },
    session_store::{FinishCommit, RoundCommit, RoundWrites, SessionStore},
    storage::{StorageConflict, StorageResult},
};

/// Session store backed by MongoDB; multi-row writes run inside client-session transactions.
#[derive(Clone)]
pub struct MongoSessionStore {
    handle: MongoHandle,
}

struct IndexPlan {
    collection: &'static str,
    name: &'static str,
    keys: Document,
    unique: bool,
    partial: Option<Document>,
}

impl MongoSessionStore {
    pub(super) async fn new(handle: MongoHandle) -> MongoResult<Self> {
        let store = Self { handle };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let plans = [
            IndexPlan {
                collection: GAME_COLLECTION,
                name: "game_started_per_deck_idx",
                keys: doc! {"user_id": 1, "deck_id": 1},
                unique: true,
                partial: Some(doc! {"status": SessionStatus::Started.as_str()}),
            },
            IndexPlan {
                collection: PARTICIPANT_COLLECTION,
                name: "participant_game_idx",
                keys: doc! {"game_id": 1, "turn_order": 1},
                unique: false,
                partial: None,
            },
            IndexPlan {
                collection: ROUND_COLLECTION,
                name: "round_game_card_idx",
                keys: doc! {"game_id": 1, "card_id": 1},
                unique: true,
                partial: None,
            },
            IndexPlan {
                collection: PARTICIPANT_ROUND_COLLECTION,
                name: "participant_round_card_idx",
                keys: doc! {"participant_id": 1, "card_id": 1},
                unique: true,
                partial: None,
            },
            IndexPlan {
                collection: PARTICIPANT_ROUND_COLLECTION,
                name: "participant_round_game_idx",
                keys: doc! {"game_id": 1, "card_id": 1},
                unique: false,
                partial: None,
            },
            IndexPlan {
                collection: RANKING_COLLECTION,
                name: "ranking_user_deck_idx",
                keys: doc! {"user_id": 1, "deck_id": 1},
                unique: true,
                partial: None,
            },
            IndexPlan {
                collection: RANKING_COLLECTION,
                name: "ranking_leaderboard_idx",
                keys: doc! {"deck_id": 1, "points_total": -1, "last_played_at": -1},
                unique: false,
                partial: None,
            },
        ];

        let database = self.handle.database().await;
        for plan in plans {
            let options = IndexOptions::builder()
                .name(Some(plan.name.to_owned()))
                .unique(Some(plan.unique))
                .partial_filter_expression(plan.partial)
                .build();
            let index = IndexModel::builder()
                .keys(plan.keys)
                .options(options)
                .build();

            database
                .collection::<Document>(plan.collection)
                .create_index(index)
                .await
                .map_err(|source| MongoDaoError::EnsureIndex {
                    collection: plan.collection,
                    index: plan.name,
                    source,
                })?;
        }

        Ok(())
    }

    async fn games(&self) -> Collection<GameDocument> {
        self.handle.collection(GAME_COLLECTION).await
    }

    async fn participants(&self) -> Collection<ParticipantDocument> {
        self.handle.collection(PARTICIPANT_COLLECTION).await
    }

    async fn rounds(&self) -> Collection<RoundDocument> {
        self.handle.collection(ROUND_COLLECTION).await
    }

    async fn participant_rounds(&self) -> Collection<ParticipantRoundDocument> {
        self.handle.collection(PARTICIPANT_ROUND_COLLECTION).await
    }

    async fn rankings(&self) -> Collection<RankingDocument> {
        self.handle.collection(RANKING_COLLECTION).await
    }

    /// Run `filter` against a collection and convert every document.
    async fn find_all<D, E>(
        collection: Collection<D>,
        filter: Document,
        sort: Document,
        operation: &'static str,
    ) -> MongoResult<Vec<E>>
    where
        D: DeserializeOwned + Send + Sync + Unpin,
        E: TryFrom<D, Error = MongoDaoError>,
    {
        let documents: Vec<D> = collection
            .find(filter)
            .sort(sort)
            .await
            .map_err(|source| MongoDaoError::Query { operation, source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Query { operation, source })?;

        documents.into_iter().map(E::try_from).collect()
    }

    async fn start_transaction(&self, operation: &'static str) -> MongoResult<ClientSession> {
        let client = self.handle.client().await;
        let mut session = client
            .start_session()
            .await
            .map_err(|source| MongoDaoError::transaction(operation, source))?;
        session
            .start_transaction()
            .await
            .map_err(|source| MongoDaoError::transaction(operation, source))?;
        Ok(session)
    }

    /// Commit on success, abort on failure, and hand back the work's result.
    async fn finish_transaction<T>(
        mut session: ClientSession,
        operation: &'static str,
        outcome: MongoResult<T>,
    ) -> MongoResult<T> {
        match outcome {
            Ok(value) => {
                session
                    .commit_transaction()
                    .await
                    .map_err(|source| MongoDaoError::transaction(operation, source))?;
                Ok(value)
            }
            Err(err) => {
                if let Err(abort_err) = session.abort_transaction().await {
                    warn!(operation, error = %abort_err, "failed to abort MongoDB transaction");
                }
                Err(err)
            }
        }
    }

    async fn create_game(
        &self,
        game: GameEntity,
        participants: Vec<ParticipantEntity>,
    ) -> MongoResult<()> {
        const OPERATION: &str = "create game";
        let mut session = self.start_transaction(OPERATION).await?;
        let outcome = self
            .insert_game(&mut session, &game, &participants)
            .await;
        Self::finish_transaction(session, OPERATION, outcome).await
    }

    async fn insert_game(
        &self,
        session: &mut ClientSession,
        game: &GameEntity,
        participants: &[ParticipantEntity],
    ) -> MongoResult<()> {
        self.games()
            .await
            .insert_one(GameDocument::from(game))
            .session(&mut *session)
            .await
            .map_err(|source| {
                MongoDaoError::write("insert game", source, StorageConflict::ActiveGameExists)
            })?;

        let collection = self.participants().await;
        for participant in participants {
            collection
                .insert_one(ParticipantDocument::from(participant))
                .session(&mut *session)
                .await
                .map_err(|source| {
                    MongoDaoError::write(
                        "insert participant",
                        source,
                        StorageConflict::ConcurrentUpdate,
                    )
                })?;
        }

        Ok(())
    }

    async fn find_game(&self, id: Uuid) -> MongoResult<Option<GameEntity>> {
        self.games()
            .await
            .find_one(doc! {"_id": id.to_string()})
            .await
            .map_err(|source| MongoDaoError::Query {
                operation: "find game",
                source,
            })?
            .map(GameEntity::try_from)
            .transpose()
    }

    async fn find_started_game(
        &self,
        user_id: UserId,
        deck_id: DeckId,
    ) -> MongoResult<Option<GameEntity>> {
        self.games()
            .await
            .find_one(doc! {
                "user_id": user_id,
                "deck_id": deck_id,
                "status": SessionStatus::Started.as_str(),
            })
            .await
            .map_err(|source| MongoDaoError::Query {
                operation: "find started game",
                source,
            })?
            .map(GameEntity::try_from)
            .transpose()
    }

    async fn find_round(&self, game_id: Uuid, card_id: CardId) -> MongoResult<Option<RoundEntity>> {
        self.rounds()
            .await
            .find_one(doc! {"game_id": game_id.to_string(), "card_id": card_id})
            .await
            .map_err(|source| MongoDaoError::Query {
                operation: "find round",
                source,
            })?
            .map(RoundEntity::try_from)
            .transpose()
    }

    async fn commit_rounds(&self, commit: RoundCommit) -> MongoResult<GameEntity> {
        const OPERATION: &str = "commit rounds";
        let mut session = self.start_transaction(OPERATION).await?;
        let outcome = self.apply_round_commit(&mut session, &commit).await;
        Self::finish_transaction(session, OPERATION, outcome).await
    }

    async fn apply_round_commit(
        &self,
        session: &mut ClientSession,
        commit: &RoundCommit,
    ) -> MongoResult<GameEntity> {
        let mut filter = doc! {
            "_id": commit.game_id.to_string(),
            "status": SessionStatus::Started.as_str(),
        };
        if let Some(expected) = commit.expected_total_rounds {
            filter.insert("total_rounds", i64::from(expected));
        }

        // Touch the game first so concurrent submissions on the same game conflict early.
        let updated = self
            .games()
            .await
            .find_one_and_update(
                filter,
                doc! {"$inc": {
                    "total_points": i64::from(commit.game_points),
                    "total_rounds": i64::from(commit.game_rounds),
                }},
            )
            .return_document(ReturnDocument::After)
            .session(&mut *session)
            .await
            .map_err(|source| {
                MongoDaoError::write("increment game", source, StorageConflict::ConcurrentUpdate)
            })?
            .ok_or(MongoDaoError::Conflict(StorageConflict::StaleGame))?;

        match &commit.writes {
            RoundWrites::Simple(round) => {
                self.rounds()
                    .await
                    .insert_one(RoundDocument::from(round))
                    .session(&mut *session)
                    .await
                    .map_err(|source| {
                        MongoDaoError::write("insert round", source, StorageConflict::DuplicateRound)
                    })?;
            }
            RoundWrites::Participants(rounds) => {
                let round_collection = self.participant_rounds().await;
                let participant_collection = self.participants().await;
                for round in rounds {
                    round_collection
                        .insert_one(ParticipantRoundDocument::from(round))
                        .session(&mut *session)
                        .await
                        .map_err(|source| {
                            MongoDaoError::write(
                                "insert participant round",
                                source,
                                StorageConflict::DuplicateRound,
                            )
                        })?;

                    let result = participant_collection
                        .update_one(
                            doc! {
                                "_id": round.participant_id.to_string(),
                                "game_id": commit.game_id.to_string(),
                            },
                            doc! {"$inc": {
                                "total_points": i64::from(round.points),
                                "total_rounds": 1_i64,
                            }},
                        )
                        .session(&mut *session)
                        .await
                        .map_err(|source| {
                            MongoDaoError::write(
                                "increment participant",
                                source,
                                StorageConflict::ConcurrentUpdate,
                            )
                        })?;
                    if result.matched_count == 0 {
                        return Err(MongoDaoError::Conflict(StorageConflict::StaleGame));
                    }
                }
            }
        }

        GameEntity::try_from(updated)
    }

    async fn finish_game(&self, commit: FinishCommit) -> MongoResult<(GameEntity, RankingEntity)> {
        const OPERATION: &str = "finish game";
        let mut session = self.start_transaction(OPERATION).await?;
        let outcome = self.apply_finish(&mut session, &commit).await;
        Self::finish_transaction(session, OPERATION, outcome).await
    }

    async fn apply_finish(
        &self,
        session: &mut ClientSession,
        commit: &FinishCommit,
    ) -> MongoResult<(GameEntity, RankingEntity)> {
        let ended_at = DateTime::from_system_time(commit.ended_at);
        let game = self
            .games()
            .await
            .find_one_and_update(
                doc! {
                    "_id": commit.game_id.to_string(),
                    "status": SessionStatus::Started.as_str(),
                },
                doc! {"$set": {
                    "status": SessionStatus::Finished.as_str(),
                    "ended_at": ended_at,
                }},
            )
            .return_document(ReturnDocument::After)
            .session(&mut *session)
            .await
            .map_err(|source| {
                MongoDaoError::write("finish game", source, StorageConflict::ConcurrentUpdate)
            })?
            .ok_or(MongoDaoError::Conflict(StorageConflict::StaleGame))?;

        let ranking = self
            .rankings()
            .await
            .find_one_and_update(
                doc! {"user_id": commit.user_id, "deck_id": commit.deck_id},
                doc! {
                    "$inc": {"points_total": game.total_points, "games_played": 1_i64},
                    "$set": {"last_played_at": ended_at},
                    "$setOnInsert": {"_id": commit.new_ranking_id.to_string()},
                },
            )
            .upsert(true)
            .return_document(ReturnDocument::After)
            .session(&mut *session)
            .await
            .map_err(|source| {
                MongoDaoError::write("upsert ranking", source, StorageConflict::ConcurrentUpdate)
            })?
            .ok_or(MongoDaoError::Conflict(StorageConflict::ConcurrentUpdate))?;

        Ok((GameEntity::try_from(game)?, RankingEntity::try_from(ranking)?))
    }

    async fn expire_game(&self, id: Uuid, ended_at: SystemTime) -> MongoResult<bool> {
        let result = self
            .games()
            .await
            .update_one(
                doc! {"_id": id.to_string(), "status": SessionStatus::Started.as_str()},
                doc! {"$set": {
                    "status": SessionStatus::Expired.as_str(),
                    "ended_at": DateTime::from_system_time(ended_at),
                }},
            )
            .await
            .map_err(|source| MongoDaoError::Write {
                operation: "expire game",
                source,
            })?;
        Ok(result.modified_count > 0)
    }

    async fn find_ranking(
        &self,
        user_id: UserId,
        deck_id: DeckId,
    ) -> MongoResult<Option<RankingEntity>> {
        self.rankings()
            .await
            .find_one(doc! {"user_id": user_id, "deck_id": deck_id})
            .await
            .map_err(|source| MongoDaoError::Query {
                operation: "find ranking",
                source,
            })?
            .map(RankingEntity::try_from)
            .transpose()
    }

    async fn list_deck_rankings(
        &self,
        deck_id: DeckId,
        limit: u32,
        offset: u32,
    ) -> MongoResult<Vec<RankingEntity>> {
        const OPERATION: &str = "list deck rankings";
        let documents: Vec<RankingDocument> = self
            .rankings()
            .await
            .find(doc! {"deck_id": deck_id})
            .sort(doc! {"points_total": -1, "last_played_at": -1})
            .skip(u64::from(offset))
            .limit(i64::from(limit))
            .await
            .map_err(|source| MongoDaoError::Query {
                operation: OPERATION,
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Query {
                operation: OPERATION,
                source,
            })?;

        documents.into_iter().map(RankingEntity::try_from).collect()
    }
}

impl SessionStore for MongoSessionStore {
    fn create_game(
        &self,
        game: GameEntity,
        participants: Vec<ParticipantEntity>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .create_game(game, participants)
                .await
                .map_err(Into::into)
        })
    }

    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_game(id).await.map_err(Into::into) })
    }

    fn find_started_game(
        &self,
        user_id: UserId,
        deck_id: DeckId,
    ) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_started_game(user_id, deck_id)
                .await
                .map_err(Into::into)
        })
    }

    fn list_participants(
        &self,
        game_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ParticipantEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let collection = store.participants().await;
            Self::find_all(
                collection,
                doc! {"game_id": game_id.to_string()},
                doc! {"turn_order": 1},
                "list participants",
            )
            .await
            .map_err(Into::into)
        })
    }

    fn list_rounds(&self, game_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<RoundEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let collection = store.rounds().await;
            Self::find_all(
                collection,
                doc! {"game_id": game_id.to_string()},
                doc! {"played_at": 1},
                "list rounds",
            )
            .await
            .map_err(Into::into)
        })
    }

    fn list_participant_rounds(
        &self,
        game_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ParticipantRoundEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let collection = store.participant_rounds().await;
            Self::find_all(
                collection,
                doc! {"game_id": game_id.to_string()},
                doc! {"played_at": 1},
                "list participant rounds",
            )
            .await
            .map_err(Into::into)
        })
    }

    fn find_round(
        &self,
        game_id: Uuid,
        card_id: CardId,
    ) -> BoxFuture<'static, StorageResult<Option<RoundEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_round(game_id, card_id).await.map_err(Into::into) })
    }

    fn find_participant_rounds_for_card(
        &self,
        game_id: Uuid,
        card_id: CardId,
    ) -> BoxFuture<'static, StorageResult<Vec<ParticipantRoundEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let collection = store.participant_rounds().await;
            Self::find_all(
                collection,
                doc! {"game_id": game_id.to_string(), "card_id": card_id},
                doc! {"played_at": 1},
                "find participant rounds for card",
            )
            .await
            .map_err(Into::into)
        })
    }

    fn commit_rounds(&self, commit: RoundCommit) -> BoxFuture<'static, StorageResult<GameEntity>> {
        let store = self.clone();
        Box::pin(async move { store.commit_rounds(commit).await.map_err(Into::into) })
    }

    fn finish_game(
        &self,
        commit: FinishCommit,
    ) -> BoxFuture<'static, StorageResult<(GameEntity, RankingEntity)>> {
        let store = self.clone();
        Box::pin(async move { store.finish_game(commit).await.map_err(Into::into) })
    }

    fn expire_game(&self, id: Uuid, ended_at: SystemTime) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.expire_game(id, ended_at).await.map_err(Into::into) })
    }

    fn find_ranking(
        &self,
        user_id: UserId,
        deck_id: DeckId,
    ) -> BoxFuture<'static, StorageResult<Option<RankingEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_ranking(user_id, deck_id)
                .await
                .map_err(Into::into)
        })
    }

    fn list_deck_rankings(
        &self,
        deck_id: DeckId,
        limit: u32,
        offset: u32,
    ) -> BoxFuture<'static, StorageResult<Vec<RankingEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .list_deck_rankings(deck_id, limit, offset)
                .await
                .map_err(Into::into)
        })
    }

    fn list_user_rankings(
        &self,
        user_id: UserId,
    ) -> BoxFuture<'static, StorageResult<Vec<RankingEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let collection = store.rankings().await;
            Self::find_all(
                collection,
                doc! {"user_id": user_id},
                doc! {"points_total": -1},
                "list user rankings",
            )
            .await
            .map_err(Into::into)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.handle.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.handle.reconnect().await.map_err(Into::into) })
    }
}
