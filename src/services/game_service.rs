use uuid::Uuid;

use crate::{
    dao::models::{CardId, DeckId, UserId},
    dto::game::{
        CompetitiveRoundRequest, FinishGameResponse, GameStateResponse, GameSummary,
        ParticipantRoundResponse, ScoreCardResponse, ScoreRoundRequest, SelfReportInput,
        SimpleRoundRequest, SimpleRoundResponse, StartGameRequest, TurnRoundRequest,
        TurnRoundResponse,
    },
    error::ServiceError,
    services::session_manager::StartSession,
    state::SharedState,
};

/// Open a new game for the caller on a deck.
pub async fn start_game(
    state: &SharedState,
    user_id: UserId,
    request: StartGameRequest,
) -> Result<GameSummary, ServiceError> {
    let manager = state.session_manager().await?;
    let session = manager
        .start_session(StartSession {
            user_id,
            deck_id: request.deck_id,
            mode: request.mode,
            participants: request
                .participants
                .into_iter()
                .map(|participant| participant.name)
                .collect(),
        })
        .await?;
    Ok(GameSummary::from(&session))
}

/// Full state of one of the caller's games.
pub async fn get_game(
    state: &SharedState,
    user_id: UserId,
    game_id: Uuid,
) -> Result<GameStateResponse, ServiceError> {
    let manager = state.session_manager().await?;
    let snapshot = manager.get_session_state(user_id, game_id).await?;
    Ok(GameStateResponse::from(&snapshot))
}

/// The caller's running game on a deck.
pub async fn get_active_game(
    state: &SharedState,
    user_id: UserId,
    deck_id: DeckId,
) -> Result<GameStateResponse, ServiceError> {
    let manager = state.session_manager().await?;
    let snapshot = manager.get_active_session_for_deck(user_id, deck_id).await?;
    Ok(GameStateResponse::from(&snapshot))
}

/// Record a simple-mode round.
pub async fn submit_round(
    state: &SharedState,
    user_id: UserId,
    game_id: Uuid,
    request: SimpleRoundRequest,
) -> Result<SimpleRoundResponse, ServiceError> {
    let manager = state.session_manager().await?;
    let outcome = manager
        .submit_simple_round(user_id, game_id, request.card_id, request.guess())
        .await?;
    Ok(outcome.into())
}

/// Record a score-mode round for several participants.
pub async fn submit_score_round(
    state: &SharedState,
    user_id: UserId,
    game_id: Uuid,
    request: ScoreRoundRequest,
) -> Result<ParticipantRoundResponse, ServiceError> {
    let manager = state.session_manager().await?;
    let outcome = manager
        .submit_score_round(user_id, game_id, request.card_id, request.answers())
        .await?;
    Ok(outcome.into())
}

/// Record a competitive-mode round for several participants.
pub async fn submit_competitive_round(
    state: &SharedState,
    user_id: UserId,
    game_id: Uuid,
    request: CompetitiveRoundRequest,
) -> Result<ParticipantRoundResponse, ServiceError> {
    let manager = state.session_manager().await?;
    let outcome = manager
        .submit_competitive_round(user_id, game_id, request.card_id, request.answers())
        .await?;
    Ok(outcome.into())
}

/// Record the current participant's round in a strict-turn game.
pub async fn submit_turn_round(
    state: &SharedState,
    user_id: UserId,
    game_id: Uuid,
    request: TurnRoundRequest,
) -> Result<TurnRoundResponse, ServiceError> {
    let manager = state.session_manager().await?;
    let outcome = manager
        .submit_turn_round(
            user_id,
            game_id,
            request.card_id,
            request.participant_id,
            request.knew.into(),
        )
        .await?;
    Ok(outcome.into())
}

/// Finish a game and return the updated ranking.
pub async fn finish_game(
    state: &SharedState,
    user_id: UserId,
    game_id: Uuid,
) -> Result<FinishGameResponse, ServiceError> {
    let manager = state.session_manager().await?;
    let outcome = manager.finish_session(user_id, game_id).await?;
    Ok(outcome.into())
}

/// Preview the points of a self-report on a card.
pub async fn score_card(
    state: &SharedState,
    user_id: UserId,
    card_id: CardId,
    report: SelfReportInput,
) -> Result<ScoreCardResponse, ServiceError> {
    let manager = state.session_manager().await?;
    let (card, score) = manager.score_card(user_id, card_id, report.into()).await?;
    Ok(ScoreCardResponse::new(&card, &score))
}
