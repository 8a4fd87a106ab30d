//! Runtime view of a persisted game and its participants.

use std::{
    ops::Deref,
    time::{Duration, SystemTime},
};

use indexmap::IndexMap;
use uuid::Uuid;

use crate::{
    dao::models::{
        DeckId, GameEntity, ParticipantEntity, SessionMode, SessionStatus, UserId,
    },
    error::{ErrorCode, ServiceError},
    services::turns,
};

/// Named local player tracked during a game session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    /// Stable identifier of the participant.
    pub id: Uuid,
    /// Display name, unique per game ignoring case.
    pub name: String,
    /// Points earned so far.
    pub total_points: u32,
    /// Rounds played so far.
    pub total_rounds: u32,
    /// Zero-based seat in turn mode, 0 otherwise.
    pub turn_order: u32,
}

impl From<ParticipantEntity> for Participant {
    fn from(value: ParticipantEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            total_points: value.total_points,
            total_rounds: value.total_rounds,
            turn_order: value.turn_order,
        }
    }
}

/// Aggregated state for a game, loaded from the session store.
#[derive(Debug, Clone)]
pub struct GameSession {
    /// Primary key of the game.
    pub id: Uuid,
    /// Owner of the game.
    pub user_id: UserId,
    /// Deck being played.
    pub deck_id: DeckId,
    /// Mode chosen at start.
    pub mode: SessionMode,
    /// Lifecycle status.
    pub status: SessionStatus,
    /// Running sum of points.
    pub total_points: u32,
    /// Running count of round submissions.
    pub total_rounds: u32,
    /// Start timestamp.
    pub started_at: SystemTime,
    /// Set once the game is finished or expired.
    pub ended_at: Option<SystemTime>,
    /// Participants keyed by id, iterated in turn order.
    pub participants: IndexMap<Uuid, Participant>,
}

impl GameSession {
    /// Assemble a session from its stored rows.
    pub fn from_parts(game: GameEntity, mut participants: Vec<ParticipantEntity>) -> Self {
        participants.sort_by_key(|participant| participant.turn_order);

        Self {
            id: game.id,
            user_id: game.user_id,
            deck_id: game.deck_id,
            mode: game.mode,
            status: game.status,
            total_points: game.total_points,
            total_rounds: game.total_rounds,
            started_at: game.started_at,
            ended_at: game.ended_at,
            participants: participants
                .into_iter()
                .map(|participant| (participant.id, participant.into()))
                .collect(),
        }
    }

    /// Refresh the aggregates after a commit returned the updated game row.
    pub fn apply_game(&mut self, game: &GameEntity) {
        self.status = game.status;
        self.total_points = game.total_points;
        self.total_rounds = game.total_rounds;
        self.ended_at = game.ended_at;
    }

    /// Whether rounds can still be submitted.
    pub fn is_started(&self) -> bool {
        self.status == SessionStatus::Started
    }

    /// A started game whose age reached `ttl` is abandoned and must be expired.
    pub fn is_stale(&self, now: SystemTime, ttl: Duration) -> bool {
        self.is_started()
            && now
                .duration_since(self.started_at)
                .is_ok_and(|age| age >= ttl)
    }

    /// Look a participant up by id.
    pub fn participant(&self, id: &Uuid) -> Option<&Participant> {
        self.participants.get(id)
    }

    /// Fail unless the game is still started.
    pub fn ensure_started(&self) -> Result<(), ServiceError> {
        if self.is_started() {
            Ok(())
        } else {
            Err(ServiceError::rejected(
                ErrorCode::GameNotActive,
                format!("game `{}` is {}", self.id, self.status.as_str()),
            ))
        }
    }
}

fn wrong_mode(session: &GameSession, expected: SessionMode) -> ServiceError {
    ServiceError::rejected(
        ErrorCode::InvalidGameMode,
        format!(
            "game `{}` is a {} game, this operation requires {}",
            session.id,
            session.mode.as_str(),
            expected.as_str()
        ),
    )
}

macro_rules! mode_session {
    ($(#[$meta:meta])* $name:ident => $mode:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $name(GameSession);

        impl TryFrom<GameSession> for $name {
            type Error = ServiceError;

            fn try_from(session: GameSession) -> Result<Self, Self::Error> {
                if session.mode == $mode {
                    Ok(Self(session))
                } else {
                    Err(wrong_mode(&session, $mode))
                }
            }
        }

        impl Deref for $name {
            type Target = GameSession;

            fn deref(&self) -> &GameSession {
                &self.0
            }
        }

        impl $name {
            /// Give the underlying session back.
            pub fn into_inner(self) -> GameSession {
                self.0
            }
        }
    };
}

mode_session!(
    /// A game in simple mode: the owner guesses alone.
    SimpleSession => SessionMode::Simple
);
mode_session!(
    /// A game in score mode: participants guess free text for the same card.
    ScoreSession => SessionMode::Score
);
mode_session!(
    /// A game in competitive mode: participants self-report for the same card.
    CompetitiveSession => SessionMode::Competitive
);
mode_session!(
    /// A game in strict-turn competitive mode.
    TurnSession => SessionMode::CompetitiveTurns
);

impl TurnSession {
    /// Participant expected to play the next round.
    pub fn current_participant(&self) -> Option<&Participant> {
        turns::current_turn_index(self.total_rounds, self.participants.len())
            .and_then(|index| self.participants.get_index(index))
            .map(|(_, participant)| participant)
    }

    /// Participant who plays after the current one.
    pub fn next_participant(&self) -> Option<&Participant> {
        turns::next_turn_index(self.total_rounds, self.participants.len())
            .and_then(|index| self.participants.get_index(index))
            .map(|(_, participant)| participant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn session(mode: SessionMode) -> GameSession {
        let game = GameEntity {
            id: Uuid::new_v4(),
            user_id: 1,
            deck_id: 1,
            mode,
            status: SessionStatus::Started,
            total_points: 0,
            total_rounds: 0,
            started_at: SystemTime::UNIX_EPOCH,
            ended_at: None,
        };
        let participants = ["Cara", "Ana", "Beto"]
            .into_iter()
            .enumerate()
            .map(|(order, name)| ParticipantEntity {
                id: Uuid::new_v4(),
                game_id: game.id,
                name: name.into(),
                total_points: 0,
                total_rounds: 0,
                turn_order: 2 - order as u32,
            })
            .collect();
        GameSession::from_parts(game, participants)
    }

    #[test]
    fn participants_are_ordered_by_turn_order() {
        let session = session(SessionMode::CompetitiveTurns);
        let names: Vec<_> = session.participants.values().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["Beto", "Ana", "Cara"]);
    }

    #[test]
    fn narrowing_rejects_other_modes() {
        let err = TurnSession::try_from(session(SessionMode::Score)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidGameMode);
        assert_eq!(err.kind(), ErrorKind::Validation);

        assert!(ScoreSession::try_from(session(SessionMode::Score)).is_ok());
    }

    #[test]
    fn current_turn_follows_total_rounds() {
        let mut inner = session(SessionMode::CompetitiveTurns);
        inner.total_rounds = 4;
        let turns = TurnSession::try_from(inner).unwrap();
        assert_eq!(turns.current_participant().unwrap().name, "Ana");
        assert_eq!(turns.next_participant().unwrap().name, "Cara");
    }

    #[test]
    fn staleness_needs_started_status_and_full_ttl() {
        let ttl = Duration::from_secs(3600);
        let mut session = session(SessionMode::Simple);
        let almost = SystemTime::UNIX_EPOCH + Duration::from_secs(3599);
        let exactly = SystemTime::UNIX_EPOCH + ttl;

        assert!(!session.is_stale(almost, ttl));
        assert!(session.is_stale(exactly, ttl));

        session.status = SessionStatus::Finished;
        assert!(!session.is_stale(exactly, ttl));
    }
}
