use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// A write was rejected because it would break a store-level invariant.
    #[error("storage conflict: {0}")]
    Conflict(StorageConflict),
}

/// Invariant a rejected write would have violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StorageConflict {
    /// The (game, card) or (participant, card) pair already has a round.
    #[error("round already recorded for this card")]
    DuplicateRound,
    /// The game is no longer started, or its round counter moved since it was read.
    #[error("game changed since it was read")]
    StaleGame,
    /// Another started game exists for the same user and deck.
    #[error("a started game already exists for this deck")]
    ActiveGameExists,
    /// A concurrent transaction touched the same rows.
    #[error("concurrent update on the same game")]
    ConcurrentUpdate,
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}

impl From<StorageConflict> for StorageError {
    fn from(conflict: StorageConflict) -> Self {
        StorageError::Conflict(conflict)
    }
}
