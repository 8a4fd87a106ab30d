use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use validator::Validate;

use crate::{
    dao::models::DeckId,
    dto::ranking::{DeckLeaderboardResponse, LeaderboardQuery, UserRankingsResponse},
    error::{AppError, ErrorBody},
    routes::auth::CurrentUser,
    services::ranking_service,
    state::SharedState,
};

/// Leaderboards and personal rankings.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/rankings/me", get(my_rankings))
        .route("/rankings/decks/{deck_id}", get(deck_leaderboard))
}

/// Best players of a deck.
#[utoipa::path(
    get,
    path = "/rankings/decks/{deck_id}",
    tag = "rankings",
    params(
        ("X-User-Id" = i64, Header, description = "Authenticated user id"),
        ("deck_id" = i64, Path, description = "Deck identifier"),
        LeaderboardQuery
    ),
    responses(
        (status = 200, description = "Leaderboard page", body = DeckLeaderboardResponse),
        (status = 400, description = "Invalid pagination", body = ErrorBody),
        (status = 404, description = "Deck not found", body = ErrorBody)
    )
)]
pub async fn deck_leaderboard(
    State(state): State<SharedState>,
    CurrentUser(_user_id): CurrentUser,
    Path(deck_id): Path<DeckId>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<DeckLeaderboardResponse>, AppError> {
    query.validate()?;
    Ok(Json(
        ranking_service::deck_leaderboard(&state, deck_id, query).await?,
    ))
}

/// Rankings of the caller on every deck, with totals.
#[utoipa::path(
    get,
    path = "/rankings/me",
    tag = "rankings",
    params(("X-User-Id" = i64, Header, description = "Authenticated user id")),
    responses((status = 200, description = "Caller rankings", body = UserRankingsResponse))
)]
pub async fn my_rankings(
    State(state): State<SharedState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<UserRankingsResponse>, AppError> {
    Ok(Json(ranking_service::user_rankings(&state, user_id).await?))
}
