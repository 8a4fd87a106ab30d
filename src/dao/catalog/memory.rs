use std::{collections::HashSet, sync::Arc};

use dashmap::DashMap;
use futures::future::BoxFuture;

use super::CardCatalog;
use crate::{
    config::CatalogSeed,
    dao::{
        models::{CardEntity, CardId, DeckEntity, DeckId, UserId},
        storage::StorageResult,
    },
};

#[derive(Debug, Clone)]
struct DeckRecord {
    title: String,
    active: bool,
}

/// Catalog held in memory, seeded from configuration or built up in tests.
#[derive(Clone, Default)]
pub struct InMemoryCatalog {
    decks: Arc<DashMap<DeckId, DeckRecord>>,
    cards: Arc<DashMap<CardId, CardEntity>>,
    grants: Arc<DashMap<UserId, HashSet<DeckId>>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from the `catalog` section of the application config.
    pub fn from_seed(seed: &CatalogSeed) -> Self {
        let catalog = Self::new();
        for deck in &seed.decks {
            catalog.insert_deck(deck.id, &deck.title, deck.active);
            for card in &deck.cards {
                catalog.insert_card(CardEntity {
                    id: card.id,
                    deck_id: deck.id,
                    song_name: card.song_name.clone(),
                    artist_name: card.artist_name.clone(),
                    album_title: card.album_title.clone(),
                    difficulty: card.difficulty,
                });
            }
        }
        for grant in &seed.grants {
            catalog.grant_access(grant.user_id, grant.deck_id);
        }
        catalog
    }

    pub fn insert_deck(&self, id: DeckId, title: &str, active: bool) {
        self.decks.insert(
            id,
            DeckRecord {
                title: title.to_owned(),
                active,
            },
        );
    }

    pub fn insert_card(&self, card: CardEntity) {
        self.cards.insert(card.id, card);
    }

    pub fn grant_access(&self, user_id: UserId, deck_id: DeckId) {
        self.grants.entry(user_id).or_default().insert(deck_id);
    }
}

impl CardCatalog for InMemoryCatalog {
    fn has_deck_access(
        &self,
        user_id: UserId,
        deck_id: DeckId,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let granted = self
            .grants
            .get(&user_id)
            .is_some_and(|decks| decks.contains(&deck_id));
        Box::pin(async move { Ok(granted) })
    }

    fn find_deck(&self, deck_id: DeckId) -> BoxFuture<'static, StorageResult<Option<DeckEntity>>> {
        let deck = self.decks.get(&deck_id).map(|record| {
            let card_count = self
                .cards
                .iter()
                .filter(|card| card.deck_id == deck_id)
                .count() as u64;
            DeckEntity {
                id: deck_id,
                title: record.title.clone(),
                active: record.active,
                card_count,
            }
        });
        Box::pin(async move { Ok(deck) })
    }

    fn find_card(&self, card_id: CardId) -> BoxFuture<'static, StorageResult<Option<CardEntity>>> {
        let card = self.cards.get(&card_id).map(|card| card.clone());
        Box::pin(async move { Ok(card) })
    }
}
