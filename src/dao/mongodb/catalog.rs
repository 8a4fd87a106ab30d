use futures::future::BoxFuture;
use mongodb::bson::{Document, doc};

use super::{
    connection::MongoHandle,
    error::{MongoDaoError, MongoResult},
    models::{CARD_COLLECTION, CardDocument, DECK_COLLECTION, DeckDocument, GRANT_COLLECTION},
};
use crate::dao::{
    catalog::CardCatalog,
    models::{CardEntity, CardId, DeckEntity, DeckId, UserId},
    storage::StorageResult,
};

/// Read-only view over the deck, card and access-grant collections.
#[derive(Clone)]
pub struct MongoCatalog {
    handle: MongoHandle,
}

impl MongoCatalog {
    pub(super) fn new(handle: MongoHandle) -> Self {
        Self { handle }
    }

    async fn has_deck_access(&self, user_id: UserId, deck_id: DeckId) -> MongoResult<bool> {
        let grant = self
            .handle
            .collection::<Document>(GRANT_COLLECTION)
            .await
            .find_one(doc! {"user_id": user_id, "deck_id": deck_id})
            .await
            .map_err(|source| MongoDaoError::Query {
                operation: "find deck grant",
                source,
            })?;
        Ok(grant.is_some())
    }

    async fn find_deck(&self, deck_id: DeckId) -> MongoResult<Option<DeckEntity>> {
        let Some(deck) = self
            .handle
            .collection::<DeckDocument>(DECK_COLLECTION)
            .await
            .find_one(doc! {"_id": deck_id})
            .await
            .map_err(|source| MongoDaoError::Query {
                operation: "find deck",
                source,
            })?
        else {
            return Ok(None);
        };

        let card_count = self
            .handle
            .collection::<CardDocument>(CARD_COLLECTION)
            .await
            .count_documents(doc! {"deck_id": deck_id})
            .await
            .map_err(|source| MongoDaoError::Query {
                operation: "count deck cards",
                source,
            })?;

        Ok(Some(DeckEntity {
            id: deck.id,
            title: deck.title,
            active: deck.active,
            card_count,
        }))
    }

    async fn find_card(&self, card_id: CardId) -> MongoResult<Option<CardEntity>> {
        let card = self
            .handle
            .collection::<CardDocument>(CARD_COLLECTION)
            .await
            .find_one(doc! {"_id": card_id})
            .await
            .map_err(|source| MongoDaoError::Query {
                operation: "find card",
                source,
            })?;
        Ok(card.map(CardEntity::from))
    }
}

impl CardCatalog for MongoCatalog {
    fn has_deck_access(
        &self,
        user_id: UserId,
        deck_id: DeckId,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let catalog = self.clone();
        Box::pin(async move {
            catalog
                .has_deck_access(user_id, deck_id)
                .await
                .map_err(Into::into)
        })
    }

    fn find_deck(&self, deck_id: DeckId) -> BoxFuture<'static, StorageResult<Option<DeckEntity>>> {
        let catalog = self.clone();
        Box::pin(async move { catalog.find_deck(deck_id).await.map_err(Into::into) })
    }

    fn find_card(&self, card_id: CardId) -> BoxFuture<'static, StorageResult<Option<CardEntity>>> {
        let catalog = self.clone();
        Box::pin(async move { catalog.find_card(card_id).await.map_err(Into::into) })
    }
}
