mod catalog;
pub mod config;
mod connection;
mod error;
mod models;
mod session_store;

pub use catalog::MongoCatalog;
pub use config::MongoConfig;
pub use error::MongoDaoError;
pub use session_store::MongoSessionStore;

use connection::MongoHandle;
use error::MongoResult;

use crate::dao::storage::StorageError;

impl From<MongoDaoError> for StorageError {
    fn from(err: MongoDaoError) -> Self {
        match err {
            MongoDaoError::Conflict(conflict) => StorageError::Conflict(conflict),
            other => StorageError::unavailable(other.to_string(), other),
        }
    }
}

/// Connect once and build both the session store and the catalog over the same client.
pub async fn connect(config: MongoConfig) -> MongoResult<(MongoSessionStore, MongoCatalog)> {
    let handle = MongoHandle::connect(config).await?;
    let store = MongoSessionStore::new(handle.clone()).await?;
    Ok((store, MongoCatalog::new(handle)))
}
