use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Oldly Fun Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::game::start_game,
        crate::routes::game::get_active_game,
        crate::routes::game::get_game,
        crate::routes::game::submit_round,
        crate::routes::game::submit_score_round,
        crate::routes::game::submit_competitive_round,
        crate::routes::game::submit_turn_round,
        crate::routes::game::finish_game,
        crate::routes::cards::score_card,
        crate::routes::rankings::deck_leaderboard,
        crate::routes::rankings::my_rankings,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::health::HealthStatus,
            crate::dto::game::StartGameRequest,
            crate::dto::game::ParticipantInput,
            crate::dto::game::SimpleRoundRequest,
            crate::dto::game::ScoreRoundRequest,
            crate::dto::game::ParticipantGuessInput,
            crate::dto::game::CompetitiveRoundRequest,
            crate::dto::game::ParticipantSelfReportInput,
            crate::dto::game::TurnRoundRequest,
            crate::dto::game::SelfReportInput,
            crate::dto::game::GameSummary,
            crate::dto::game::ParticipantSummary,
            crate::dto::game::GameStateResponse,
            crate::dto::game::RoundRecord,
            crate::dto::game::SimpleRoundResponse,
            crate::dto::game::ParticipantRoundResponse,
            crate::dto::game::ParticipantRoundResult,
            crate::dto::game::TurnRoundResponse,
            crate::dto::game::FinishGameResponse,
            crate::dto::game::ScoreCardResponse,
            crate::dto::game::CardAnswer,
            crate::dto::game::FieldCorrectness,
            crate::dto::game::PointsBreakdown,
            crate::dto::ranking::RankingSummary,
            crate::dto::ranking::LeaderboardEntry,
            crate::dto::ranking::DeckLeaderboardResponse,
            crate::dto::ranking::UserRankingsResponse,
            crate::dao::models::SessionMode,
            crate::dao::models::SessionStatus,
            crate::dao::models::Difficulty,
            crate::error::ErrorBody,
            crate::error::ErrorCode,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "games", description = "Game sessions and round submission"),
        (name = "cards", description = "Card scoring previews"),
        (name = "rankings", description = "Deck leaderboards and personal rankings"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/healthcheck",
            "/games",
            "/games/active/{deck_id}",
            "/games/{id}/turn-rounds",
            "/cards/{card_id}/score",
            "/rankings/me",
        ] {
            assert!(doc.paths.paths.contains_key(path), "{path}");
        }
    }
}
