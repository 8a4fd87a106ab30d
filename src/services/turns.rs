//! Turn order for strict-turn competitive games.
//!
//! Whose turn it is is always derived from the game's round counter; nothing
//! else is stored.

use uuid::Uuid;

use crate::{
    error::{ErrorCode, ServiceError},
    state::session::{Participant, TurnSession},
};

/// Index of the participant whose turn it is, or `None` without participants.
pub fn current_turn_index(total_rounds: u32, participant_count: usize) -> Option<usize> {
    if participant_count == 0 {
        return None;
    }
    Some(total_rounds as usize % participant_count)
}

/// Index of the participant who plays after the current one.
pub fn next_turn_index(total_rounds: u32, participant_count: usize) -> Option<usize> {
    let count = u64::try_from(participant_count).ok().filter(|count| *count > 0)?;
    usize::try_from((u64::from(total_rounds) + 1) % count).ok()
}

/// Resolve the submitting participant, failing with `WRONG_TURN` when it is not theirs.
pub fn ensure_turn(session: &TurnSession, participant_id: Uuid) -> Result<&Participant, ServiceError> {
    let expected = session.current_participant().ok_or_else(|| {
        ServiceError::rejected(
            ErrorCode::InvalidParticipants,
            format!("game `{}` has no participants", session.id),
        )
    })?;

    if expected.id == participant_id {
        return Ok(expected);
    }

    if session.participant(&participant_id).is_none() {
        return Err(ServiceError::rejected(
            ErrorCode::InvalidParticipants,
            format!("participant `{participant_id}` does not belong to game `{}`", session.id),
        ));
    }

    Err(ServiceError::WrongTurn {
        expected_id: expected.id,
        expected_name: expected.name.clone(),
    })
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;
    use crate::{
        dao::models::{GameEntity, ParticipantEntity, SessionMode, SessionStatus},
        state::session::GameSession,
    };

    fn turn_session(total_rounds: u32) -> (TurnSession, Vec<Uuid>) {
        let game = GameEntity {
            id: Uuid::new_v4(),
            user_id: 1,
            deck_id: 1,
            mode: SessionMode::CompetitiveTurns,
            status: SessionStatus::Started,
            total_points: 0,
            total_rounds,
            started_at: SystemTime::UNIX_EPOCH,
            ended_at: None,
        };
        let participants: Vec<_> = ["A", "B", "C"]
            .into_iter()
            .enumerate()
            .map(|(order, name)| ParticipantEntity {
                id: Uuid::new_v4(),
                game_id: game.id,
                name: name.into(),
                total_points: 0,
                total_rounds: 0,
                turn_order: order as u32,
            })
            .collect();
        let ids = participants.iter().map(|p| p.id).collect();
        let session = TurnSession::try_from(GameSession::from_parts(game, participants)).unwrap();
        (session, ids)
    }

    #[test]
    fn indices_wrap_around() {
        assert_eq!(current_turn_index(0, 3), Some(0));
        assert_eq!(current_turn_index(4, 3), Some(1));
        assert_eq!(next_turn_index(2, 3), Some(0));
        assert_eq!(current_turn_index(5, 0), None);
        assert_eq!(next_turn_index(5, 0), None);
    }

    #[test]
    fn next_index_does_not_wrap_the_counter() {
        assert_eq!(current_turn_index(u32::MAX, 3), Some(0));
        assert_eq!(next_turn_index(u32::MAX, 3), Some(1));
        assert_eq!(next_turn_index(u32::MAX, 1), Some(0));
    }

    #[test]
    fn first_participant_opens_the_game() {
        let (session, ids) = turn_session(0);
        assert_eq!(ensure_turn(&session, ids[0]).unwrap().name, "A");
    }

    #[test]
    fn out_of_turn_submission_names_expected_player() {
        let (session, ids) = turn_session(0);
        match ensure_turn(&session, ids[2]) {
            Err(ServiceError::WrongTurn {
                expected_id,
                expected_name,
            }) => {
                assert_eq!(expected_id, ids[0]);
                assert_eq!(expected_name, "A");
            }
            other => panic!("expected wrong turn, got {other:?}"),
        }
    }

    #[test]
    fn turn_passes_with_round_counter() {
        let (session, ids) = turn_session(1);
        assert_eq!(ensure_turn(&session, ids[1]).unwrap().name, "B");
    }

    #[test]
    fn stranger_is_not_a_wrong_turn() {
        let (session, _) = turn_session(0);
        let err = ensure_turn(&session, Uuid::new_v4()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidParticipants);
    }
}
