use mongodb::error::{Error as MongoError, ErrorKind, TRANSIENT_TRANSACTION_ERROR, WriteFailure};
use thiserror::Error;

use crate::dao::storage::StorageConflict;

/// Convenient result alias returning [`MongoDaoError`] failures.
pub type MongoResult<T> = Result<T, MongoDaoError>;

const DUPLICATE_KEY_CODE: i32 = 11000;

/// Failures that can occur while interacting with MongoDB.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("missing MongoDB environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB query `{operation}` failed")]
    Query {
        operation: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB write `{operation}` failed")]
    Write {
        operation: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB transaction failed during `{operation}`")]
    Transaction {
        operation: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("invalid identifier `{value}` stored in `{collection}`")]
    InvalidId {
        collection: &'static str,
        value: String,
        #[source]
        source: uuid::Error,
    },
    #[error(transparent)]
    Conflict(StorageConflict),
}

impl MongoDaoError {
    /// Classify a failed write, turning unique-index and write-conflict failures into conflicts.
    pub(super) fn write(
        operation: &'static str,
        source: MongoError,
        on_duplicate: StorageConflict,
    ) -> Self {
        if is_duplicate_key(&source) {
            MongoDaoError::Conflict(on_duplicate)
        } else if source.contains_label(TRANSIENT_TRANSACTION_ERROR) {
            MongoDaoError::Conflict(StorageConflict::ConcurrentUpdate)
        } else {
            MongoDaoError::Write { operation, source }
        }
    }

    pub(super) fn transaction(operation: &'static str, source: MongoError) -> Self {
        if source.contains_label(TRANSIENT_TRANSACTION_ERROR) {
            MongoDaoError::Conflict(StorageConflict::ConcurrentUpdate)
        } else {
            MongoDaoError::Transaction { operation, source }
        }
    }
}

fn is_duplicate_key(err: &MongoError) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => {
            write_error.code == DUPLICATE_KEY_CODE
        }
        ErrorKind::Command(command_error) => command_error.code == DUPLICATE_KEY_CODE,
        _ => false,
    }
}
