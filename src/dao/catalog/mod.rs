pub mod memory;

use futures::future::BoxFuture;

use crate::dao::models::{CardEntity, CardId, DeckEntity, DeckId, UserId};
use crate::dao::storage::StorageResult;

/// Read-only view over decks, cards and deck access grants.
pub trait CardCatalog: Send + Sync {
    /// Whether the user holds an access grant for the deck.
    fn has_deck_access(
        &self,
        user_id: UserId,
        deck_id: DeckId,
    ) -> BoxFuture<'static, StorageResult<bool>>;
    /// Deck metadata, active or not.
    fn find_deck(&self, deck_id: DeckId) -> BoxFuture<'static, StorageResult<Option<DeckEntity>>>;
    fn find_card(&self, card_id: CardId) -> BoxFuture<'static, StorageResult<Option<CardEntity>>>;
}
