use axum::{
    Json, Router,
    extract::{Path, State},
    routing::post,
};

use crate::{
    dao::models::CardId,
    dto::game::{ScoreCardResponse, SelfReportInput},
    error::{AppError, ErrorBody},
    routes::auth::CurrentUser,
    services::game_service,
    state::SharedState,
};

/// Card endpoints that do not touch any game.
pub fn router() -> Router<SharedState> {
    Router::new().route("/cards/{card_id}/score", post(score_card))
}

/// Preview the points a self-report would earn on a card. Nothing is recorded.
#[utoipa::path(
    post,
    path = "/cards/{card_id}/score",
    tag = "cards",
    params(
        ("X-User-Id" = i64, Header, description = "Authenticated user id"),
        ("card_id" = i64, Path, description = "Card identifier")
    ),
    request_body = SelfReportInput,
    responses(
        (status = 200, description = "Points preview", body = ScoreCardResponse),
        (status = 403, description = "No access to the card's deck", body = ErrorBody),
        (status = 404, description = "Card not found", body = ErrorBody)
    )
)]
pub async fn score_card(
    State(state): State<SharedState>,
    CurrentUser(user_id): CurrentUser,
    Path(card_id): Path<CardId>,
    Json(payload): Json<SelfReportInput>,
) -> Result<Json<ScoreCardResponse>, AppError> {
    if card_id < 1 {
        return Err(AppError::bad_request("card id must be positive"));
    }
    Ok(Json(
        game_service::score_card(&state, user_id, card_id, payload).await?,
    ))
}
