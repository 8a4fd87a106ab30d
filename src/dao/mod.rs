/// Read-only deck and card catalog.
pub mod catalog;
/// Database model definitions.
pub mod models;
/// MongoDB backends for the session store and the catalog.
#[cfg(feature = "mongo-store")]
pub mod mongodb;
/// Game session persistence and its unit-of-work commits.
pub mod session_store;
/// Storage abstraction layer for database operations.
pub mod storage;
