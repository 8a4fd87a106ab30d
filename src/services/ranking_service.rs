use tracing::debug;

use crate::{
    dao::models::{DeckId, UserId},
    dto::ranking::{
        DeckLeaderboardResponse, LeaderboardEntry, LeaderboardQuery, UserRankingsResponse,
    },
    error::{ErrorCode, ServiceError},
    state::SharedState,
};

/// Best players of a deck, one page at a time.
pub async fn deck_leaderboard(
    state: &SharedState,
    deck_id: DeckId,
    query: LeaderboardQuery,
) -> Result<DeckLeaderboardResponse, ServiceError> {
    let backend = state.require_backend().await?;

    let deck = backend.catalog.find_deck(deck_id).await?.ok_or_else(|| {
        ServiceError::rejected(ErrorCode::InvalidDeck, format!("deck `{deck_id}` not found"))
    })?;

    let rankings = backend
        .store
        .list_deck_rankings(deck_id, query.limit, query.offset)
        .await?;
    debug!(deck_id, count = rankings.len(), offset = query.offset, "leaderboard page loaded");

    let entries = rankings
        .iter()
        .enumerate()
        .map(|(index, ranking)| LeaderboardEntry::new(query.offset + index as u32 + 1, ranking))
        .collect();

    Ok(DeckLeaderboardResponse {
        deck_id,
        deck_title: deck.title,
        entries,
    })
}

/// Every ranking of the caller with overall totals.
pub async fn user_rankings(
    state: &SharedState,
    user_id: UserId,
) -> Result<UserRankingsResponse, ServiceError> {
    let backend = state.require_backend().await?;
    let rankings = backend.store.list_user_rankings(user_id).await?;
    Ok(UserRankingsResponse::from_rankings(&rankings))
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::SystemTime};

    use uuid::Uuid;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            catalog::memory::InMemoryCatalog,
            models::{GameEntity, SessionMode, SessionStatus},
            session_store::{FinishCommit, SessionStore, memory::InMemorySessionStore},
        },
        state::{AppState, Backend},
    };

    async fn finished_game(store: &InMemorySessionStore, user_id: UserId, points: u32) {
        let game = GameEntity {
            id: Uuid::new_v4(),
            user_id,
            deck_id: 1,
            mode: SessionMode::Simple,
            status: SessionStatus::Started,
            total_points: points,
            total_rounds: 1,
            started_at: SystemTime::UNIX_EPOCH,
            ended_at: None,
        };
        store.create_game(game.clone(), Vec::new()).await.unwrap();
        store
            .finish_game(FinishCommit {
                game_id: game.id,
                user_id,
                deck_id: 1,
                ended_at: SystemTime::UNIX_EPOCH,
                new_ranking_id: Uuid::new_v4(),
            })
            .await
            .unwrap();
    }

    async fn state_with_rankings() -> SharedState {
        let catalog = InMemoryCatalog::new();
        catalog.insert_deck(1, "Clásicos", true);
        let store = InMemorySessionStore::new();
        finished_game(&store, 1, 4).await;
        finished_game(&store, 2, 9).await;
        finished_game(&store, 3, 6).await;
        finished_game(&store, 1, 3).await;

        let state = AppState::new(AppConfig::default());
        state
            .set_backend(Backend::new("memory", Arc::new(store), Arc::new(catalog)))
            .await;
        state
    }

    #[tokio::test]
    async fn leaderboard_ranks_across_pages() {
        let state = state_with_rankings().await;

        let page = deck_leaderboard(&state, 1, LeaderboardQuery::default())
            .await
            .unwrap();
        let ranked: Vec<_> = page
            .entries
            .iter()
            .map(|entry| (entry.rank, entry.user_id, entry.points_total))
            .collect();
        assert_eq!(ranked, [(1, 2, 9), (2, 1, 7), (3, 3, 6)]);
        assert_eq!(page.deck_title, "Clásicos");

        let second = deck_leaderboard(&state, 1, LeaderboardQuery { limit: 1, offset: 1 })
            .await
            .unwrap();
        assert_eq!(second.entries.len(), 1);
        assert_eq!(second.entries[0].rank, 2);
        assert_eq!(second.entries[0].user_id, 1);
    }

    #[tokio::test]
    async fn unknown_deck_leaderboard_is_not_found() {
        let state = state_with_rankings().await;
        let err = deck_leaderboard(&state, 42, LeaderboardQuery::default())
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidDeck);
    }

    #[tokio::test]
    async fn user_rankings_sum_every_deck() {
        let state = state_with_rankings().await;
        let mine = user_rankings(&state, 1).await.unwrap();
        assert_eq!(mine.total_points, 7);
        assert_eq!(mine.total_games, 2);
        assert_eq!(mine.decks_played, 1);

        let nobody = user_rankings(&state, 99).await.unwrap();
        assert_eq!(nobody.decks_played, 0);
        assert!(nobody.rankings.is_empty());
    }
}
