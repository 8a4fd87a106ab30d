use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::DeckId,
    dto::game::{
        CompetitiveRoundRequest, FinishGameResponse, GameStateResponse, GameSummary,
        ParticipantRoundResponse, ScoreRoundRequest, SimpleRoundRequest, SimpleRoundResponse,
        StartGameRequest, TurnRoundRequest, TurnRoundResponse,
    },
    error::{AppError, ErrorBody},
    routes::auth::CurrentUser,
    services::game_service,
    state::SharedState,
};

/// Game session endpoints for the authenticated caller.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/games", post(start_game))
        .route("/games/active/{deck_id}", get(get_active_game))
        .route("/games/{id}", get(get_game))
        .route("/games/{id}/rounds", post(submit_round))
        .route("/games/{id}/score-rounds", post(submit_score_round))
        .route(
            "/games/{id}/competitive-rounds",
            post(submit_competitive_round),
        )
        .route("/games/{id}/turn-rounds", post(submit_turn_round))
        .route("/games/{id}/finish", post(finish_game))
}

/// Start a new game on a deck.
#[utoipa::path(
    post,
    path = "/games",
    tag = "games",
    params(("X-User-Id" = i64, Header, description = "Authenticated user id")),
    request_body = StartGameRequest,
    responses(
        (status = 201, description = "Game started", body = GameSummary),
        (status = 400, description = "Invalid deck or participants", body = ErrorBody),
        (status = 403, description = "No access to the deck", body = ErrorBody),
        (status = 409, description = "A game is already running on the deck", body = ErrorBody),
        (status = 503, description = "Storage unavailable", body = ErrorBody)
    )
)]
pub async fn start_game(
    State(state): State<SharedState>,
    CurrentUser(user_id): CurrentUser,
    Json(payload): Json<StartGameRequest>,
) -> Result<(StatusCode, Json<GameSummary>), AppError> {
    payload.validate()?;
    let game = game_service::start_game(&state, user_id, payload).await?;
    Ok((StatusCode::CREATED, Json(game)))
}

/// Running game of the caller on a deck.
#[utoipa::path(
    get,
    path = "/games/active/{deck_id}",
    tag = "games",
    params(
        ("X-User-Id" = i64, Header, description = "Authenticated user id"),
        ("deck_id" = i64, Path, description = "Deck identifier")
    ),
    responses(
        (status = 200, description = "Active game", body = GameStateResponse),
        (status = 404, description = "No active game on the deck", body = ErrorBody)
    )
)]
pub async fn get_active_game(
    State(state): State<SharedState>,
    CurrentUser(user_id): CurrentUser,
    Path(deck_id): Path<DeckId>,
) -> Result<Json<GameStateResponse>, AppError> {
    Ok(Json(
        game_service::get_active_game(&state, user_id, deck_id).await?,
    ))
}

/// Full state of one of the caller's games.
#[utoipa::path(
    get,
    path = "/games/{id}",
    tag = "games",
    params(
        ("X-User-Id" = i64, Header, description = "Authenticated user id"),
        ("id" = Uuid, Path, description = "Game identifier")
    ),
    responses(
        (status = 200, description = "Game state", body = GameStateResponse),
        (status = 404, description = "Game not found", body = ErrorBody)
    )
)]
pub async fn get_game(
    State(state): State<SharedState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<GameStateResponse>, AppError> {
    Ok(Json(game_service::get_game(&state, user_id, id).await?))
}

/// Submit the caller's guesses in a simple game.
#[utoipa::path(
    post,
    path = "/games/{id}/rounds",
    tag = "games",
    params(
        ("X-User-Id" = i64, Header, description = "Authenticated user id"),
        ("id" = Uuid, Path, description = "Game identifier")
    ),
    request_body = SimpleRoundRequest,
    responses(
        (status = 200, description = "Round scored", body = SimpleRoundResponse),
        (status = 400, description = "Invalid input or wrong game mode", body = ErrorBody),
        (status = 404, description = "Game or card not found", body = ErrorBody),
        (status = 409, description = "Card already played or game closed", body = ErrorBody)
    )
)]
pub async fn submit_round(
    State(state): State<SharedState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<SimpleRoundRequest>,
) -> Result<Json<SimpleRoundResponse>, AppError> {
    payload.validate()?;
    Ok(Json(
        game_service::submit_round(&state, user_id, id, payload).await?,
    ))
}

/// Submit free-text guesses of several participants in a score game.
#[utoipa::path(
    post,
    path = "/games/{id}/score-rounds",
    tag = "games",
    params(
        ("X-User-Id" = i64, Header, description = "Authenticated user id"),
        ("id" = Uuid, Path, description = "Game identifier")
    ),
    request_body = ScoreRoundRequest,
    responses(
        (status = 200, description = "Round scored for every participant", body = ParticipantRoundResponse),
        (status = 400, description = "Invalid input or participants", body = ErrorBody),
        (status = 409, description = "Card already played by a participant", body = ErrorBody)
    )
)]
pub async fn submit_score_round(
    State(state): State<SharedState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ScoreRoundRequest>,
) -> Result<Json<ParticipantRoundResponse>, AppError> {
    payload.validate()?;
    Ok(Json(
        game_service::submit_score_round(&state, user_id, id, payload).await?,
    ))
}

/// Submit self-reports of several participants in a competitive game.
#[utoipa::path(
    post,
    path = "/games/{id}/competitive-rounds",
    tag = "games",
    params(
        ("X-User-Id" = i64, Header, description = "Authenticated user id"),
        ("id" = Uuid, Path, description = "Game identifier")
    ),
    request_body = CompetitiveRoundRequest,
    responses(
        (status = 200, description = "Round scored for every participant", body = ParticipantRoundResponse),
        (status = 400, description = "Invalid input or participants", body = ErrorBody),
        (status = 409, description = "Card already played by a participant", body = ErrorBody)
    )
)]
pub async fn submit_competitive_round(
    State(state): State<SharedState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CompetitiveRoundRequest>,
) -> Result<Json<ParticipantRoundResponse>, AppError> {
    payload.validate()?;
    Ok(Json(
        game_service::submit_competitive_round(&state, user_id, id, payload).await?,
    ))
}

/// Submit the current participant's self-report in a strict-turn game.
#[utoipa::path(
    post,
    path = "/games/{id}/turn-rounds",
    tag = "games",
    params(
        ("X-User-Id" = i64, Header, description = "Authenticated user id"),
        ("id" = Uuid, Path, description = "Game identifier")
    ),
    request_body = TurnRoundRequest,
    responses(
        (status = 200, description = "Round scored and turn passed", body = TurnRoundResponse),
        (status = 409, description = "Wrong turn, card already played or game closed", body = ErrorBody)
    )
)]
pub async fn submit_turn_round(
    State(state): State<SharedState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<TurnRoundRequest>,
) -> Result<Json<TurnRoundResponse>, AppError> {
    payload.validate()?;
    Ok(Json(
        game_service::submit_turn_round(&state, user_id, id, payload).await?,
    ))
}

/// Finish a game and fold its points into the caller's ranking.
#[utoipa::path(
    post,
    path = "/games/{id}/finish",
    tag = "games",
    params(
        ("X-User-Id" = i64, Header, description = "Authenticated user id"),
        ("id" = Uuid, Path, description = "Game identifier")
    ),
    responses(
        (status = 200, description = "Game finished", body = FinishGameResponse),
        (status = 404, description = "Game not found", body = ErrorBody),
        (status = 409, description = "Game already finished or expired", body = ErrorBody)
    )
)]
pub async fn finish_game(
    State(state): State<SharedState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<FinishGameResponse>, AppError> {
    Ok(Json(game_service::finish_game(&state, user_id, id).await?))
}
