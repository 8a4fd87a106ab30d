use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    dao::models::{DeckId, RankingEntity, UserId},
    dto::format_system_time,
};

fn default_limit() -> u32 {
    20
}

/// All-time totals of the caller on one deck.
#[derive(Debug, Serialize, ToSchema)]
pub struct RankingSummary {
    pub deck_id: DeckId,
    pub points_total: u64,
    pub games_played: u32,
    pub last_played_at: String,
}

impl From<&RankingEntity> for RankingSummary {
    fn from(value: &RankingEntity) -> Self {
        Self {
            deck_id: value.deck_id,
            points_total: value.points_total,
            games_played: value.games_played,
            last_played_at: format_system_time(value.last_played_at),
        }
    }
}

/// Pagination of a deck leaderboard.
#[derive(Debug, Deserialize, IntoParams, Validate)]
#[into_params(parameter_in = Query)]
pub struct LeaderboardQuery {
    /// Entries per page, 1 to 100. Defaults to 20.
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 100))]
    pub limit: u32,
    /// Entries to skip.
    #[serde(default)]
    pub offset: u32,
}

impl Default for LeaderboardQuery {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            offset: 0,
        }
    }
}

/// One line of a deck leaderboard.
#[derive(Debug, Serialize, ToSchema)]
pub struct LeaderboardEntry {
    /// 1-based position across all pages.
    pub rank: u32,
    pub user_id: UserId,
    pub points_total: u64,
    pub games_played: u32,
    pub last_played_at: String,
}

impl LeaderboardEntry {
    pub(crate) fn new(rank: u32, ranking: &RankingEntity) -> Self {
        Self {
            rank,
            user_id: ranking.user_id,
            points_total: ranking.points_total,
            games_played: ranking.games_played,
            last_played_at: format_system_time(ranking.last_played_at),
        }
    }
}

/// Best players of a deck.
#[derive(Debug, Serialize, ToSchema)]
pub struct DeckLeaderboardResponse {
    pub deck_id: DeckId,
    pub deck_title: String,
    pub entries: Vec<LeaderboardEntry>,
}

/// The caller's rankings across every deck they finished a game on.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserRankingsResponse {
    pub total_points: u64,
    pub total_games: u32,
    pub decks_played: u32,
    pub rankings: Vec<RankingSummary>,
}

impl UserRankingsResponse {
    pub(crate) fn from_rankings(rankings: &[RankingEntity]) -> Self {
        Self {
            total_points: rankings.iter().map(|r| r.points_total).sum(),
            total_games: rankings.iter().map(|r| r.games_played).sum(),
            decks_played: rankings.len() as u32,
            rankings: rankings.iter().map(RankingSummary::from).collect(),
        }
    }
}
