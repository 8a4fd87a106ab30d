//! Game session lifecycle: start, round submission for every mode, finish,
//! lazy expiry and ranking reconciliation.

use std::{collections::HashSet, sync::Arc};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    config::SessionSettings,
    dao::{
        catalog::CardCatalog,
        models::{
            CardEntity, CardId, DeckId, GameEntity, ParticipantEntity, ParticipantRoundEntity,
            RankingEntity, RoundEntity, SessionMode, SessionStatus, UserId,
        },
        session_store::{FinishCommit, RoundCommit, RoundWrites, SessionStore},
        storage::{StorageConflict, StorageError},
    },
    error::{ErrorCode, ServiceError},
    services::{
        scoring::{self, Guess, Score, SelfReport},
        turns,
    },
    state::{
        Clock,
        session::{
            CompetitiveSession, GameSession, Participant, ScoreSession, SimpleSession,
            TurnSession,
        },
    },
};

/// Request to open a new game.
#[derive(Debug, Clone)]
pub struct StartSession {
    pub user_id: UserId,
    pub deck_id: DeckId,
    pub mode: SessionMode,
    /// Participant names in turn order. Empty for simple games.
    pub participants: Vec<String>,
}

/// Owned free-text answers.
#[derive(Debug, Clone, Default)]
pub struct GuessText {
    pub song: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
}

impl GuessText {
    fn as_guess(&self) -> Guess<'_> {
        Guess {
            song: self.song.as_deref(),
            artist: self.artist.as_deref(),
            album: self.album.as_deref(),
        }
    }
}

/// One participant's answer in a free-for-all round.
#[derive(Debug, Clone)]
pub struct ParticipantAnswer<T> {
    pub participant_id: Uuid,
    pub answer: T,
}

/// Result of a simple round.
#[derive(Debug, Clone)]
pub struct RoundOutcome {
    /// Card with its canonical answers.
    pub card: CardEntity,
    pub score: Score,
    /// Game aggregates after the round.
    pub game: GameEntity,
}

/// Score of one participant in a multi-participant round.
#[derive(Debug, Clone)]
pub struct ParticipantResult {
    /// Participant with updated aggregates.
    pub participant: Participant,
    pub score: Score,
}

/// Result of a free-for-all round.
#[derive(Debug, Clone)]
pub struct ParticipantRoundsOutcome {
    pub card: CardEntity,
    /// One entry per submitted answer, in submission order.
    pub results: Vec<ParticipantResult>,
    pub game: GameEntity,
}

/// Result of a strict-turn round.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub card: CardEntity,
    pub result: ParticipantResult,
    pub game: GameEntity,
    /// Whose turn it is now.
    pub next_participant: Option<Participant>,
}

/// A game with its full round history.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub session: GameSession,
    /// Simple-mode rounds, by play time.
    pub rounds: Vec<RoundEntity>,
    /// Participant rounds, by play time.
    pub participant_rounds: Vec<ParticipantRoundEntity>,
    /// Current player in turn mode while the game is running.
    pub current_turn: Option<Participant>,
}

/// Result of finishing a game.
#[derive(Debug, Clone)]
pub struct FinishOutcome {
    pub snapshot: SessionSnapshot,
    /// Ranking for the (user, deck) pair after folding the game in.
    pub ranking: RankingEntity,
}

/// Orchestrates game sessions on top of a session store and a card catalog.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    catalog: Arc<dyn CardCatalog>,
    clock: Arc<dyn Clock>,
    settings: SessionSettings,
}

impl SessionManager {
    /// Bind a manager to its collaborators.
    pub fn new(
        store: Arc<dyn SessionStore>,
        catalog: Arc<dyn CardCatalog>,
        clock: Arc<dyn Clock>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            store,
            catalog,
            clock,
            settings,
        }
    }

    /// Open a new game, expiring an abandoned one on the same deck first.
    pub async fn start_session(&self, request: StartSession) -> Result<GameSession, ServiceError> {
        let StartSession {
            user_id,
            deck_id,
            mode,
            participants,
        } = request;

        if !self.catalog.has_deck_access(user_id, deck_id).await? {
            return Err(ServiceError::rejected(
                ErrorCode::DeckAccessDenied,
                format!("no access to deck `{deck_id}`"),
            ));
        }

        let deck = self
            .catalog
            .find_deck(deck_id)
            .await?
            .filter(|deck| deck.active)
            .ok_or_else(|| {
                ServiceError::rejected(
                    ErrorCode::InvalidDeck,
                    format!("deck `{deck_id}` does not exist or is inactive"),
                )
            })?;
        if deck.card_count == 0 {
            return Err(ServiceError::rejected(
                ErrorCode::NoCardsInDeck,
                format!("deck `{deck_id}` has no cards"),
            ));
        }

        let names = self.validate_participants(mode, participants)?;

        if let Some(existing) = self.store.find_started_game(user_id, deck_id).await? {
            let existing = GameSession::from_parts(existing, Vec::new());
            if existing.is_stale(self.clock.now(), self.settings.ttl) {
                self.expire(&existing).await?;
            } else {
                return Err(ServiceError::ActiveGameExists {
                    game_id: existing.id,
                });
            }
        }

        let game = GameEntity {
            id: Uuid::new_v4(),
            user_id,
            deck_id,
            mode,
            status: SessionStatus::Started,
            total_points: 0,
            total_rounds: 0,
            started_at: self.clock.now(),
            ended_at: None,
        };
        let participants: Vec<ParticipantEntity> = names
            .into_iter()
            .enumerate()
            .map(|(index, name)| ParticipantEntity {
                id: Uuid::new_v4(),
                game_id: game.id,
                name,
                total_points: 0,
                total_rounds: 0,
                turn_order: if mode == SessionMode::CompetitiveTurns {
                    index as u32
                } else {
                    0
                },
            })
            .collect();

        match self
            .store
            .create_game(game.clone(), participants.clone())
            .await
        {
            Ok(()) => {}
            Err(StorageError::Conflict(StorageConflict::ActiveGameExists)) => {
                // Lost a race against another start for the same deck.
                let winner = self.store.find_started_game(user_id, deck_id).await?;
                return Err(match winner {
                    Some(winner) => ServiceError::ActiveGameExists { game_id: winner.id },
                    None => StorageConflict::ConcurrentUpdate.into(),
                });
            }
            Err(err) => return Err(err.into()),
        }

        info!(
            game_id = %game.id,
            user_id,
            deck_id,
            mode = mode.as_str(),
            participants = participants.len(),
            "game started"
        );
        Ok(GameSession::from_parts(game, participants))
    }

    /// Trim and check participant names against the mode and configured limits.
    fn validate_participants(
        &self,
        mode: SessionMode,
        participants: Vec<String>,
    ) -> Result<Vec<String>, ServiceError> {
        if !mode.has_participants() {
            if !participants.is_empty() {
                return Err(ServiceError::rejected(
                    ErrorCode::InvalidParticipants,
                    "simple games are played without participants",
                ));
            }
            return Ok(Vec::new());
        }

        if participants.is_empty() {
            return Err(ServiceError::rejected(
                ErrorCode::NoParticipants,
                format!("{} games need at least one participant", mode.as_str()),
            ));
        }
        if participants.len() > self.settings.max_participants {
            return Err(ServiceError::rejected(
                ErrorCode::TooManyParticipants,
                format!(
                    "at most {} participants are allowed",
                    self.settings.max_participants
                ),
            ));
        }

        let mut seen = HashSet::new();
        participants
            .into_iter()
            .map(|name| {
                let name = name.trim().to_owned();
                let length = name.chars().count();
                if length == 0 || length > self.settings.max_participant_name_len {
                    return Err(ServiceError::rejected(
                        ErrorCode::InvalidParticipantName,
                        format!(
                            "participant names must have between 1 and {} characters",
                            self.settings.max_participant_name_len
                        ),
                    ));
                }
                if !seen.insert(name.to_lowercase()) {
                    return Err(ServiceError::rejected(
                        ErrorCode::DuplicateParticipantNames,
                        format!("participant name `{name}` is used more than once"),
                    ));
                }
                Ok(name)
            })
            .collect()
    }

    /// Record a simple-mode round for the game owner.
    pub async fn submit_simple_round(
        &self,
        user_id: UserId,
        game_id: Uuid,
        card_id: CardId,
        guess: GuessText,
    ) -> Result<RoundOutcome, ServiceError> {
        let session = SimpleSession::try_from(self.load_active(user_id, game_id).await?)?;
        let card = self.card_for(&session, card_id).await?;

        if self.store.find_round(session.id, card_id).await?.is_some() {
            return Err(ServiceError::CardAlreadyPlayed {
                card_id,
                participant_ids: Vec::new(),
            });
        }

        let score = scoring::score_guess(&card, &guess.as_guess());
        let round = RoundEntity {
            id: Uuid::new_v4(),
            game_id: session.id,
            card_id,
            correctness: score.correctness,
            points: score.points,
            played_at: self.clock.now(),
        };
        let commit = RoundCommit {
            game_id: session.id,
            expected_total_rounds: None,
            writes: RoundWrites::Simple(round),
            game_points: score.points,
            game_rounds: 1,
        };

        let game = match self.store.commit_rounds(commit).await {
            Ok(game) => game,
            Err(StorageError::Conflict(StorageConflict::DuplicateRound)) => {
                return Err(ServiceError::CardAlreadyPlayed {
                    card_id,
                    participant_ids: Vec::new(),
                });
            }
            Err(err) => return Err(self.commit_failure(session.id, err).await),
        };

        info!(
            game_id = %game.id,
            card_id,
            points = score.points,
            total_points = game.total_points,
            "simple round recorded"
        );
        Ok(RoundOutcome { card, score, game })
    }

    /// Record free-text answers of several participants for one card.
    pub async fn submit_score_round(
        &self,
        user_id: UserId,
        game_id: Uuid,
        card_id: CardId,
        answers: Vec<ParticipantAnswer<GuessText>>,
    ) -> Result<ParticipantRoundsOutcome, ServiceError> {
        let session = ScoreSession::try_from(self.load_active(user_id, game_id).await?)?;
        let card = self.card_for(&session, card_id).await?;

        let scores = answers
            .iter()
            .map(|entry| {
                (
                    entry.participant_id,
                    scoring::score_guess(&card, &entry.answer.as_guess()),
                )
            })
            .collect();

        self.submit_free_for_all(&session, card, scores).await
    }

    /// Record self-reports of several participants for one card.
    pub async fn submit_competitive_round(
        &self,
        user_id: UserId,
        game_id: Uuid,
        card_id: CardId,
        answers: Vec<ParticipantAnswer<SelfReport>>,
    ) -> Result<ParticipantRoundsOutcome, ServiceError> {
        let session = CompetitiveSession::try_from(self.load_active(user_id, game_id).await?)?;
        let card = self.card_for(&session, card_id).await?;

        let scores = answers
            .iter()
            .map(|entry| {
                (
                    entry.participant_id,
                    scoring::score_self_report(&card, entry.answer),
                )
            })
            .collect();

        self.submit_free_for_all(&session, card, scores).await
    }

    /// Shared path of score and competitive rounds: all participants land or none does.
    async fn submit_free_for_all(
        &self,
        session: &GameSession,
        card: CardEntity,
        scores: Vec<(Uuid, Score)>,
    ) -> Result<ParticipantRoundsOutcome, ServiceError> {
        if scores.is_empty() {
            return Err(ServiceError::rejected(
                ErrorCode::InvalidParticipants,
                "a round needs at least one participant answer",
            ));
        }

        let mut submitted = HashSet::new();
        for (participant_id, _) in &scores {
            if session.participant(participant_id).is_none() {
                return Err(ServiceError::rejected(
                    ErrorCode::InvalidParticipants,
                    format!(
                        "participant `{participant_id}` does not belong to game `{}`",
                        session.id
                    ),
                ));
            }
            if !submitted.insert(*participant_id) {
                return Err(ServiceError::rejected(
                    ErrorCode::InvalidParticipants,
                    format!("participant `{participant_id}` answered more than once"),
                ));
            }
        }

        let collisions = self.collisions(session.id, card.id, &submitted).await?;
        if !collisions.is_empty() {
            return Err(ServiceError::CardAlreadyPlayed {
                card_id: card.id,
                participant_ids: collisions,
            });
        }

        let played_at = self.clock.now();
        let rounds: Vec<ParticipantRoundEntity> = scores
            .iter()
            .map(|(participant_id, score)| ParticipantRoundEntity {
                id: Uuid::new_v4(),
                game_id: session.id,
                participant_id: *participant_id,
                card_id: card.id,
                correctness: score.correctness,
                points: score.points,
                played_at,
            })
            .collect();
        let game_points = scores.iter().map(|(_, score)| score.points).sum();
        let commit = RoundCommit {
            game_id: session.id,
            expected_total_rounds: None,
            writes: RoundWrites::Participants(rounds),
            game_points,
            game_rounds: 1,
        };

        let game = match self.store.commit_rounds(commit).await {
            Ok(game) => game,
            Err(StorageError::Conflict(StorageConflict::DuplicateRound)) => {
                let participant_ids = self.collisions(session.id, card.id, &submitted).await?;
                return Err(ServiceError::CardAlreadyPlayed {
                    card_id: card.id,
                    participant_ids,
                });
            }
            Err(err) => return Err(self.commit_failure(session.id, err).await),
        };

        let participants = self.participants_by_id(session.id).await?;
        let results = scores
            .into_iter()
            .filter_map(|(participant_id, score)| {
                participants
                    .iter()
                    .find(|participant| participant.id == participant_id)
                    .map(|participant| ParticipantResult {
                        participant: participant.clone(),
                        score,
                    })
            })
            .collect::<Vec<_>>();

        info!(
            game_id = %game.id,
            card_id = card.id,
            mode = session.mode.as_str(),
            participants = results.len(),
            points = game_points,
            total_points = game.total_points,
            "participant round recorded"
        );
        Ok(ParticipantRoundsOutcome {
            card,
            results,
            game,
        })
    }

    /// Record one self-report in a strict-turn game, then pass the turn.
    pub async fn submit_turn_round(
        &self,
        user_id: UserId,
        game_id: Uuid,
        card_id: CardId,
        participant_id: Uuid,
        report: SelfReport,
    ) -> Result<TurnOutcome, ServiceError> {
        let session = TurnSession::try_from(self.load_active(user_id, game_id).await?)?;
        let card = self.card_for(&session, card_id).await?;

        let participant = match turns::ensure_turn(&session, participant_id) {
            Ok(participant) => participant.clone(),
            Err(err) => {
                debug!(game_id = %session.id, %participant_id, "submission out of turn");
                return Err(err);
            }
        };

        let submitted = HashSet::from([participant.id]);
        if !self
            .collisions(session.id, card_id, &submitted)
            .await?
            .is_empty()
        {
            return Err(ServiceError::CardAlreadyPlayed {
                card_id,
                participant_ids: vec![participant.id],
            });
        }

        let score = scoring::score_self_report(&card, report);
        let round = ParticipantRoundEntity {
            id: Uuid::new_v4(),
            game_id: session.id,
            participant_id: participant.id,
            card_id,
            correctness: score.correctness,
            points: score.points,
            played_at: self.clock.now(),
        };
        // Guarding on the round counter serializes turns: a concurrent submission
        // that already moved the turn makes this commit fail untouched.
        let commit = RoundCommit {
            game_id: session.id,
            expected_total_rounds: Some(session.total_rounds),
            writes: RoundWrites::Participants(vec![round]),
            game_points: score.points,
            game_rounds: 1,
        };

        let game = match self.store.commit_rounds(commit).await {
            Ok(game) => game,
            Err(StorageError::Conflict(StorageConflict::DuplicateRound)) => {
                return Err(ServiceError::CardAlreadyPlayed {
                    card_id,
                    participant_ids: vec![participant.id],
                });
            }
            Err(err) => return Err(self.commit_failure(session.id, err).await),
        };

        let participant = Participant {
            total_points: participant.total_points + score.points,
            total_rounds: participant.total_rounds + 1,
            ..participant
        };
        // The guarded commit moved the counter by exactly one round.
        let next_id = session.next_participant().map(|next| next.id);
        let mut session = session.into_inner();
        session.apply_game(&game);
        if let Some(entry) = session.participants.get_mut(&participant.id) {
            *entry = participant.clone();
        }
        let next_participant = next_id.and_then(|id| session.participants.get(&id).cloned());

        info!(
            game_id = %game.id,
            card_id,
            participant_id = %participant.id,
            points = score.points,
            total_rounds = game.total_rounds,
            "turn round recorded"
        );
        Ok(TurnOutcome {
            card,
            result: ParticipantResult { participant, score },
            game,
            next_participant,
        })
    }

    /// Close a started game and fold its points into the ranking.
    pub async fn finish_session(
        &self,
        user_id: UserId,
        game_id: Uuid,
    ) -> Result<FinishOutcome, ServiceError> {
        let session = self.load_active(user_id, game_id).await?;

        let commit = FinishCommit {
            game_id: session.id,
            user_id: session.user_id,
            deck_id: session.deck_id,
            ended_at: self.clock.now(),
            new_ranking_id: Uuid::new_v4(),
        };
        let (game, ranking) = match self.store.finish_game(commit).await {
            Ok(finished) => finished,
            Err(err) => return Err(self.commit_failure(session.id, err).await),
        };

        info!(
            game_id = %game.id,
            user_id,
            deck_id = game.deck_id,
            total_points = game.total_points,
            ranking_points = ranking.points_total,
            games_played = ranking.games_played,
            "game finished"
        );

        let mut session = session;
        session.apply_game(&game);
        let snapshot = self.snapshot(session).await?;
        Ok(FinishOutcome { snapshot, ranking })
    }

    /// Full state of a game owned by the caller. Abandoned games are expired on read.
    pub async fn get_session_state(
        &self,
        user_id: UserId,
        game_id: Uuid,
    ) -> Result<SessionSnapshot, ServiceError> {
        let mut session = self.load_owned(user_id, game_id).await?;
        if session.is_stale(self.clock.now(), self.settings.ttl) {
            self.expire(&session).await?;
            session = self.load_owned(user_id, game_id).await?;
        }
        self.snapshot(session).await
    }

    /// The caller's running game on a deck, if it is still fresh.
    pub async fn get_active_session_for_deck(
        &self,
        user_id: UserId,
        deck_id: DeckId,
    ) -> Result<SessionSnapshot, ServiceError> {
        let not_found = || {
            ServiceError::rejected(
                ErrorCode::GameNotFound,
                format!("no active game for deck `{deck_id}`"),
            )
        };

        let game = self
            .store
            .find_started_game(user_id, deck_id)
            .await?
            .ok_or_else(not_found)?;
        let participants = self.store.list_participants(game.id).await?;
        let session = GameSession::from_parts(game, participants);

        if session.is_stale(self.clock.now(), self.settings.ttl) {
            self.expire(&session).await?;
            return Err(not_found());
        }
        self.snapshot(session).await
    }

    /// Points a self-report would earn on a card, without recording anything.
    pub async fn score_card(
        &self,
        user_id: UserId,
        card_id: CardId,
        report: SelfReport,
    ) -> Result<(CardEntity, Score), ServiceError> {
        let card = self.catalog.find_card(card_id).await?.ok_or_else(|| {
            ServiceError::rejected(ErrorCode::CardNotFound, format!("card `{card_id}` not found"))
        })?;
        if !self.catalog.has_deck_access(user_id, card.deck_id).await? {
            return Err(ServiceError::rejected(
                ErrorCode::DeckAccessDenied,
                format!("no access to deck `{}`", card.deck_id),
            ));
        }

        let score = scoring::score_self_report(&card, report);
        Ok((card, score))
    }

    /// Load a game and its participants, hiding games owned by someone else.
    async fn load_owned(&self, user_id: UserId, game_id: Uuid) -> Result<GameSession, ServiceError> {
        let game = self
            .store
            .find_game(game_id)
            .await?
            .filter(|game| game.user_id == user_id)
            .ok_or_else(|| {
                ServiceError::rejected(ErrorCode::GameNotFound, format!("game `{game_id}` not found"))
            })?;
        let participants = self.store.list_participants(game.id).await?;
        Ok(GameSession::from_parts(game, participants))
    }

    /// Load a game that must still accept rounds; abandoned games are expired and rejected.
    async fn load_active(&self, user_id: UserId, game_id: Uuid) -> Result<GameSession, ServiceError> {
        let session = self.load_owned(user_id, game_id).await?;
        if session.is_stale(self.clock.now(), self.settings.ttl) {
            self.expire(&session).await?;
            return Err(ServiceError::rejected(
                ErrorCode::GameNotActive,
                format!("game `{game_id}` expired"),
            ));
        }
        session.ensure_started()?;
        Ok(session)
    }

    async fn expire(&self, session: &GameSession) -> Result<(), ServiceError> {
        let expired = self.store.expire_game(session.id, self.clock.now()).await?;
        if expired {
            info!(
                game_id = %session.id,
                user_id = session.user_id,
                deck_id = session.deck_id,
                "abandoned game expired"
            );
        }
        Ok(())
    }

    /// Fetch a card and make sure it belongs to the game's deck.
    async fn card_for(&self, session: &GameSession, card_id: CardId) -> Result<CardEntity, ServiceError> {
        let card = self.catalog.find_card(card_id).await?.ok_or_else(|| {
            ServiceError::rejected(ErrorCode::CardNotFound, format!("card `{card_id}` not found"))
        })?;
        if card.deck_id != session.deck_id {
            return Err(ServiceError::rejected(
                ErrorCode::CardNotInDeck,
                format!("card `{card_id}` is not part of deck `{}`", session.deck_id),
            ));
        }
        Ok(card)
    }

    /// Submitted participants that already have a round for the card.
    async fn collisions(
        &self,
        game_id: Uuid,
        card_id: CardId,
        submitted: &HashSet<Uuid>,
    ) -> Result<Vec<Uuid>, ServiceError> {
        let played = self
            .store
            .find_participant_rounds_for_card(game_id, card_id)
            .await?;
        let mut collisions: Vec<Uuid> = played
            .into_iter()
            .map(|round| round.participant_id)
            .filter(|id| submitted.contains(id))
            .collect();
        collisions.sort();
        collisions.dedup();
        Ok(collisions)
    }

    async fn participants_by_id(&self, game_id: Uuid) -> Result<Vec<Participant>, ServiceError> {
        Ok(self
            .store
            .list_participants(game_id)
            .await?
            .into_iter()
            .map(Participant::from)
            .collect())
    }

    /// Translate a failed commit, telling a closed game apart from a lost race.
    async fn commit_failure(&self, game_id: Uuid, err: StorageError) -> ServiceError {
        match err {
            StorageError::Conflict(conflict) => {
                let closed = matches!(
                    self.store.find_game(game_id).await,
                    Ok(Some(game)) if game.status != SessionStatus::Started
                );
                if closed {
                    ServiceError::rejected(
                        ErrorCode::GameNotActive,
                        format!("game `{game_id}` is no longer active"),
                    )
                } else {
                    debug!(%game_id, ?conflict, "commit lost a concurrent update");
                    conflict.into()
                }
            }
            unavailable => {
                warn!(%game_id, error = %unavailable, "storage failure while writing game");
                unavailable.into()
            }
        }
    }

    async fn snapshot(&self, session: GameSession) -> Result<SessionSnapshot, ServiceError> {
        let (rounds, participant_rounds) = if session.mode.has_participants() {
            (Vec::new(), self.store.list_participant_rounds(session.id).await?)
        } else {
            (self.store.list_rounds(session.id).await?, Vec::new())
        };

        let current_turn = if session.mode == SessionMode::CompetitiveTurns && session.is_started()
        {
            TurnSession::try_from(session.clone())?
                .current_participant()
                .cloned()
        } else {
            None
        };

        Ok(SessionSnapshot {
            session,
            rounds,
            participant_rounds,
            current_turn,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        dao::{
            catalog::memory::InMemoryCatalog,
            models::{Correctness, Difficulty},
            session_store::memory::InMemorySessionStore,
        },
        error::ErrorKind,
        state::ManualClock,
    };

    const USER: UserId = 7;
    const DECK: DeckId = 1;

    struct Fixture {
        manager: SessionManager,
        store: InMemorySessionStore,
        clock: Arc<ManualClock>,
    }

    fn fixture() -> Fixture {
        let catalog = InMemoryCatalog::new();
        catalog.insert_deck(DECK, "Rock en español", true);
        catalog.insert_deck(2, "Empty", true);
        catalog.insert_deck(3, "Retired", false);
        catalog.insert_deck(4, "Other", true);
        for (id, deck_id, difficulty, album) in [
            (10, DECK, Difficulty::Medium, None),
            (11, DECK, Difficulty::Easy, Some("Canción Animal")),
            (12, DECK, Difficulty::Hard, None),
            (40, 4, Difficulty::Easy, None),
        ] {
            catalog.insert_card(CardEntity {
                id,
                deck_id,
                song_name: "De música ligera".into(),
                artist_name: "Soda Stereo".into(),
                album_title: album.map(str::to_owned),
                difficulty,
            });
        }
        for deck in [DECK, 2, 3, 4] {
            catalog.grant_access(USER, deck);
        }

        let store = InMemorySessionStore::new();
        let clock = Arc::new(ManualClock::default());
        let manager = SessionManager::new(
            Arc::new(store.clone()),
            Arc::new(catalog),
            clock.clone(),
            SessionSettings::default(),
        );
        Fixture {
            manager,
            store,
            clock,
        }
    }

    fn start(mode: SessionMode, names: &[&str]) -> StartSession {
        StartSession {
            user_id: USER,
            deck_id: DECK,
            mode,
            participants: names.iter().map(|name| name.to_string()).collect(),
        }
    }

    fn knew_song() -> SelfReport {
        SelfReport {
            song_knew: true,
            ..SelfReport::default()
        }
    }

    fn full_guess() -> GuessText {
        GuessText {
            song: Some("de musica ligera!!".into()),
            artist: Some("SODA STEREO".into()),
            album: Some(String::new()),
        }
    }

    #[tokio::test]
    async fn simple_round_scores_and_accumulates() {
        let f = fixture();
        let game = f.manager.start_session(start(SessionMode::Simple, &[])).await.unwrap();

        let outcome = f
            .manager
            .submit_simple_round(USER, game.id, 10, full_guess())
            .await
            .unwrap();

        assert_eq!(outcome.score.points, 5);
        assert_eq!(outcome.score.bonus, 2);
        assert_eq!(outcome.game.total_points, 5);
        assert_eq!(outcome.game.total_rounds, 1);
        assert_eq!(outcome.card.song_name, "De música ligera");
    }

    #[tokio::test]
    async fn replaying_a_card_is_a_state_conflict() {
        let f = fixture();
        let game = f.manager.start_session(start(SessionMode::Simple, &[])).await.unwrap();
        let first = f
            .manager
            .submit_simple_round(USER, game.id, 11, GuessText::default())
            .await
            .unwrap();
        assert_eq!(first.score.points, 0);

        let err = f
            .manager
            .submit_simple_round(USER, game.id, 11, full_guess())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StateConflict);
        assert_eq!(err.code(), ErrorCode::CardAlreadyPlayed);

        let state = f.manager.get_session_state(USER, game.id).await.unwrap();
        assert_eq!(state.rounds.len(), 1);
        assert_eq!(state.session.total_points, 0);
    }

    #[tokio::test]
    async fn second_start_conflicts_until_first_expires() {
        let f = fixture();
        let first = f.manager.start_session(start(SessionMode::Simple, &[])).await.unwrap();

        match f.manager.start_session(start(SessionMode::Simple, &[])).await {
            Err(ServiceError::ActiveGameExists { game_id }) => assert_eq!(game_id, first.id),
            other => panic!("expected active game conflict, got {other:?}"),
        }

        f.clock.advance(Duration::from_secs(3600));
        let second = f.manager.start_session(start(SessionMode::Simple, &[])).await.unwrap();
        assert_ne!(second.id, first.id);

        let previous = f.store.find_game(first.id).await.unwrap().unwrap();
        assert_eq!(previous.status, SessionStatus::Expired);
        assert!(previous.ended_at.is_some());
    }

    #[tokio::test]
    async fn turns_rotate_and_wrong_turn_changes_nothing() {
        let f = fixture();
        let game = f
            .manager
            .start_session(start(SessionMode::CompetitiveTurns, &["A", "B", "C"]))
            .await
            .unwrap();
        let ids: Vec<Uuid> = game.participants.keys().copied().collect();

        let err = f
            .manager
            .submit_turn_round(USER, game.id, 10, ids[2], knew_song())
            .await
            .unwrap_err();
        match err {
            ServiceError::WrongTurn {
                expected_id,
                expected_name,
            } => {
                assert_eq!(expected_id, ids[0]);
                assert_eq!(expected_name, "A");
            }
            other => panic!("expected wrong turn, got {other:?}"),
        }
        let untouched = f.store.find_game(game.id).await.unwrap().unwrap();
        assert_eq!(untouched.total_rounds, 0);

        let outcome = f
            .manager
            .submit_turn_round(USER, game.id, 10, ids[0], knew_song())
            .await
            .unwrap();
        assert_eq!(outcome.game.total_rounds, 1);
        assert_eq!(outcome.next_participant.unwrap().id, ids[1]);
        assert_eq!(outcome.result.participant.total_points, 2);

        let state = f.manager.get_session_state(USER, game.id).await.unwrap();
        assert_eq!(state.current_turn.unwrap().name, "B");
    }

    #[tokio::test]
    async fn turn_endpoint_rejects_other_modes() {
        let f = fixture();
        let game = f
            .manager
            .start_session(start(SessionMode::Score, &["A"]))
            .await
            .unwrap();
        let id = *game.participants.keys().next().unwrap();

        let err = f
            .manager
            .submit_turn_round(USER, game.id, 10, id, knew_song())
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidGameMode);
    }

    #[tokio::test]
    async fn score_round_is_all_or_nothing() {
        let f = fixture();
        let game = f
            .manager
            .start_session(start(SessionMode::Score, &["Ana", "Beto"]))
            .await
            .unwrap();
        let ids: Vec<Uuid> = game.participants.keys().copied().collect();

        f.manager
            .submit_score_round(
                USER,
                game.id,
                10,
                vec![ParticipantAnswer {
                    participant_id: ids[0],
                    answer: full_guess(),
                }],
            )
            .await
            .unwrap();

        let err = f
            .manager
            .submit_score_round(
                USER,
                game.id,
                10,
                ids.iter()
                    .map(|id| ParticipantAnswer {
                        participant_id: *id,
                        answer: full_guess(),
                    })
                    .collect(),
            )
            .await
            .unwrap_err();
        match err {
            ServiceError::CardAlreadyPlayed {
                card_id,
                participant_ids,
            } => {
                assert_eq!(card_id, 10);
                assert_eq!(participant_ids, vec![ids[0]]);
            }
            other => panic!("expected card already played, got {other:?}"),
        }

        let state = f.manager.get_session_state(USER, game.id).await.unwrap();
        assert_eq!(state.participant_rounds.len(), 1);
        assert_eq!(state.session.participants[&ids[1]].total_rounds, 0);
        assert_eq!(state.session.total_points, 5);
    }

    #[tokio::test]
    async fn competitive_round_sums_participant_points() {
        let f = fixture();
        let game = f
            .manager
            .start_session(start(SessionMode::Competitive, &["Ana", "Beto"]))
            .await
            .unwrap();
        let ids: Vec<Uuid> = game.participants.keys().copied().collect();

        let outcome = f
            .manager
            .submit_competitive_round(
                USER,
                game.id,
                12,
                vec![
                    ParticipantAnswer {
                        participant_id: ids[0],
                        answer: knew_song(),
                    },
                    ParticipantAnswer {
                        participant_id: ids[1],
                        answer: SelfReport::default(),
                    },
                ],
            )
            .await
            .unwrap();

        assert_eq!(outcome.results[0].score.points, 2);
        assert_eq!(outcome.results[1].score.points, 0);
        assert_eq!(outcome.results[0].participant.total_points, 2);
        assert_eq!(outcome.game.total_points, 2);
        assert_eq!(outcome.game.total_rounds, 1);
    }

    #[tokio::test]
    async fn foreign_participant_rejects_whole_round() {
        let f = fixture();
        let game = f
            .manager
            .start_session(start(SessionMode::Competitive, &["Ana"]))
            .await
            .unwrap();
        let ana = *game.participants.keys().next().unwrap();

        let err = f
            .manager
            .submit_competitive_round(
                USER,
                game.id,
                10,
                vec![
                    ParticipantAnswer {
                        participant_id: ana,
                        answer: knew_song(),
                    },
                    ParticipantAnswer {
                        participant_id: Uuid::new_v4(),
                        answer: knew_song(),
                    },
                ],
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidParticipants);
        assert!(f.store.list_participant_rounds(game.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn finish_creates_then_increments_ranking() {
        let f = fixture();

        let first = f.manager.start_session(start(SessionMode::Simple, &[])).await.unwrap();
        f.manager
            .submit_simple_round(USER, first.id, 10, full_guess())
            .await
            .unwrap();
        let finished = f.manager.finish_session(USER, first.id).await.unwrap();
        assert_eq!(finished.ranking.games_played, 1);
        assert_eq!(finished.ranking.points_total, 5);
        assert_eq!(finished.snapshot.session.status, SessionStatus::Finished);
        assert_eq!(finished.snapshot.rounds.len(), 1);

        let second = f.manager.start_session(start(SessionMode::Simple, &[])).await.unwrap();
        f.manager
            .submit_simple_round(
                USER,
                second.id,
                11,
                GuessText {
                    song: Some("De Musica Ligera".into()),
                    ..GuessText::default()
                },
            )
            .await
            .unwrap();
        let finished = f.manager.finish_session(USER, second.id).await.unwrap();
        assert_eq!(finished.ranking.games_played, 2);
        assert_eq!(finished.ranking.points_total, 6);
    }

    #[tokio::test]
    async fn finished_game_rejects_rounds_and_second_finish() {
        let f = fixture();
        let game = f.manager.start_session(start(SessionMode::Simple, &[])).await.unwrap();
        f.manager.finish_session(USER, game.id).await.unwrap();

        let err = f.manager.finish_session(USER, game.id).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::GameNotActive);

        let err = f
            .manager
            .submit_simple_round(USER, game.id, 10, full_guess())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StateConflict);
    }

    #[tokio::test]
    async fn stale_game_is_expired_on_read() {
        let f = fixture();
        let game = f.manager.start_session(start(SessionMode::Simple, &[])).await.unwrap();
        f.clock.advance(Duration::from_secs(3601));

        let err = f
            .manager
            .get_active_session_for_deck(USER, DECK)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::GameNotFound);

        let state = f.manager.get_session_state(USER, game.id).await.unwrap();
        assert_eq!(state.session.status, SessionStatus::Expired);
        assert!(f.store.find_ranking(USER, DECK).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn start_validates_deck_and_participants() {
        let f = fixture();
        let cases = [
            (
                StartSession {
                    deck_id: 99,
                    ..start(SessionMode::Simple, &[])
                },
                ErrorCode::DeckAccessDenied,
            ),
            (
                StartSession {
                    deck_id: 2,
                    ..start(SessionMode::Simple, &[])
                },
                ErrorCode::NoCardsInDeck,
            ),
            (
                StartSession {
                    deck_id: 3,
                    ..start(SessionMode::Simple, &[])
                },
                ErrorCode::InvalidDeck,
            ),
            (start(SessionMode::Score, &[]), ErrorCode::NoParticipants),
            (
                start(SessionMode::Score, &["a", "b", "c", "d", "e", "f", "g", "h", "i"]),
                ErrorCode::TooManyParticipants,
            ),
            (
                start(SessionMode::Competitive, &["Ana", " ana "]),
                ErrorCode::DuplicateParticipantNames,
            ),
            (
                start(SessionMode::CompetitiveTurns, &["   "]),
                ErrorCode::InvalidParticipantName,
            ),
        ];

        for (request, expected) in cases {
            let err = f.manager.start_session(request).await.unwrap_err();
            assert_eq!(err.code(), expected);
        }
    }

    #[tokio::test]
    async fn turn_order_follows_submission_order() {
        let f = fixture();
        let game = f
            .manager
            .start_session(start(SessionMode::CompetitiveTurns, &[" Zoe ", "Ana"]))
            .await
            .unwrap();
        let seats: Vec<_> = game
            .participants
            .values()
            .map(|p| (p.name.as_str(), p.turn_order))
            .collect();
        assert_eq!(seats, [("Zoe", 0), ("Ana", 1)]);

        let score = f
            .manager
            .start_session(StartSession {
                deck_id: 4,
                ..start(SessionMode::Score, &["Zoe", "Ana"])
            })
            .await
            .unwrap();
        assert!(score.participants.values().all(|p| p.turn_order == 0));
    }

    #[tokio::test]
    async fn card_from_another_deck_is_rejected() {
        let f = fixture();
        let game = f.manager.start_session(start(SessionMode::Simple, &[])).await.unwrap();

        let err = f
            .manager
            .submit_simple_round(USER, game.id, 40, full_guess())
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::CardNotInDeck);
    }

    #[tokio::test]
    async fn games_of_other_users_are_not_found() {
        let f = fixture();
        let game = f.manager.start_session(start(SessionMode::Simple, &[])).await.unwrap();

        let err = f.manager.get_session_state(USER + 1, game.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn score_card_preview_persists_nothing() {
        let f = fixture();
        let (card, score) = f
            .manager
            .score_card(
                USER,
                12,
                SelfReport {
                    song_knew: true,
                    artist_knew: true,
                    album_knew: false,
                },
            )
            .await
            .unwrap();
        assert_eq!(card.id, 12);
        assert_eq!(score.points, 4);
        assert_eq!(
            score.correctness,
            Correctness {
                song: true,
                artist: true,
                album: false
            }
        );

        let err = f
            .manager
            .score_card(USER + 1, 12, knew_song())
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::DeckAccessDenied);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn racing_turn_submissions_record_one_round() {
        for _ in 0..16 {
            let f = fixture();
            let game = f
                .manager
                .start_session(start(SessionMode::CompetitiveTurns, &["A", "B"]))
                .await
                .unwrap();
            let game_id = game.id;
            let first = *game.participants.keys().next().unwrap();

            let submit = |card_id: CardId| {
                let manager = f.manager.clone();
                tokio::spawn(async move {
                    manager
                        .submit_turn_round(USER, game_id, card_id, first, knew_song())
                        .await
                })
            };
            let (left, right) = tokio::join!(submit(10), submit(11));
            let results = [left.unwrap(), right.unwrap()];

            assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
            let loser = results.iter().find_map(|result| result.as_ref().err()).unwrap();
            assert!(
                matches!(loser.code(), ErrorCode::ConcurrentUpdate | ErrorCode::WrongTurn),
                "{loser:?}"
            );

            let stored = f.store.find_game(game_id).await.unwrap().unwrap();
            assert_eq!(stored.total_rounds, 1);
            assert_eq!(f.store.list_participant_rounds(game_id).await.unwrap().len(), 1);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn overlapping_score_rounds_land_one_batch() {
        for _ in 0..16 {
            let f = fixture();
            let game = f
                .manager
                .start_session(start(SessionMode::Score, &["Ana", "Beto"]))
                .await
                .unwrap();
            let game_id = game.id;
            let ids: Vec<Uuid> = game.participants.keys().copied().collect();

            let submit = || {
                let manager = f.manager.clone();
                let answers: Vec<_> = ids
                    .iter()
                    .map(|id| ParticipantAnswer {
                        participant_id: *id,
                        answer: full_guess(),
                    })
                    .collect();
                tokio::spawn(async move {
                    manager.submit_score_round(USER, game_id, 10, answers).await
                })
            };
            let (left, right) = tokio::join!(submit(), submit());
            let results = [left.unwrap(), right.unwrap()];

            assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
            let loser = results.iter().find_map(|result| result.as_ref().err()).unwrap();
            assert_eq!(loser.code(), ErrorCode::CardAlreadyPlayed);

            let state = f.manager.get_session_state(USER, game_id).await.unwrap();
            assert_eq!(state.participant_rounds.len(), 2);
            assert_eq!(state.session.total_rounds, 1);
            assert_eq!(state.session.total_points, 10);
            assert!(state.session.participants.values().all(|p| p.total_rounds == 1));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_finishes_count_the_game_once() {
        for _ in 0..16 {
            let f = fixture();
            let game = f.manager.start_session(start(SessionMode::Simple, &[])).await.unwrap();
            let game_id = game.id;
            f.manager
                .submit_simple_round(USER, game_id, 10, full_guess())
                .await
                .unwrap();

            let finish = || {
                let manager = f.manager.clone();
                tokio::spawn(async move { manager.finish_session(USER, game_id).await })
            };
            let (left, right) = tokio::join!(finish(), finish());
            let results = [left.unwrap(), right.unwrap()];

            assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
            let loser = results.iter().find_map(|result| result.as_ref().err()).unwrap();
            assert_eq!(loser.code(), ErrorCode::GameNotActive);

            let ranking = f.store.find_ranking(USER, DECK).await.unwrap().unwrap();
            assert_eq!(ranking.games_played, 1);
            assert_eq!(ranking.points_total, 5);
        }
    }
}
