use std::fmt;

use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::ValidationErrors;

use crate::dao::{
    models::CardId,
    storage::{StorageConflict, StorageError},
};

/// Logical category of a failure, independent of the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or out-of-range input.
    Validation,
    /// The caller lacks a grant for the resource.
    AccessDenied,
    /// The resource is absent or not owned by the caller.
    NotFound,
    /// The request collides with the current state of a game.
    StateConflict,
    /// Storage or other server-side failure.
    Internal,
}

/// Machine-readable error code returned to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[allow(missing_docs)]
pub enum ErrorCode {
    InvalidDeck,
    DeckAccessDenied,
    NoCardsInDeck,
    ActiveGameExists,
    NoParticipants,
    TooManyParticipants,
    DuplicateParticipantNames,
    InvalidParticipantName,
    InvalidParticipants,
    CardAlreadyPlayed,
    WrongTurn,
    GameNotFound,
    CardNotFound,
    CardNotInDeck,
    InvalidGameMode,
    GameNotActive,
    ConcurrentUpdate,
    InvalidInput,
    Unauthorized,
    StorageUnavailable,
    Internal,
}

impl ErrorCode {
    /// Category the code belongs to.
    pub fn kind(self) -> ErrorKind {
        use ErrorCode::*;
        match self {
            NoCardsInDeck
            | NoParticipants
            | TooManyParticipants
            | DuplicateParticipantNames
            | InvalidParticipantName
            | InvalidParticipants
            | InvalidGameMode
            | InvalidInput
            | Unauthorized => ErrorKind::Validation,
            DeckAccessDenied => ErrorKind::AccessDenied,
            InvalidDeck | GameNotFound | CardNotFound | CardNotInDeck => ErrorKind::NotFound,
            ActiveGameExists | CardAlreadyPlayed | WrongTurn | GameNotActive | ConcurrentUpdate => {
                ErrorKind::StateConflict
            }
            StorageUnavailable | Internal => ErrorKind::Internal,
        }
    }
}

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// The caller already has a started game for the deck.
    #[error("a game is already active for this deck")]
    ActiveGameExists {
        /// The game that is still running.
        game_id: Uuid,
    },
    /// One or more participants (or the game itself) already played the card.
    #[error("card {card_id} was already played in this game")]
    CardAlreadyPlayed {
        /// Card submitted twice.
        card_id: CardId,
        /// Colliding participants; empty for simple games.
        participant_ids: Vec<Uuid>,
    },
    /// A turn-mode submission came from someone other than the current player.
    #[error("it is {expected_name}'s turn")]
    WrongTurn {
        /// Participant whose turn it is.
        expected_id: Uuid,
        /// Name of that participant.
        expected_name: String,
    },
    /// Any other rejection, identified by its code.
    #[error("{message}")]
    Rejected {
        /// Machine-readable reason.
        code: ErrorCode,
        /// Human-readable explanation.
        message: String,
    },
}

impl ServiceError {
    /// Build a plain rejection with a code and a message.
    pub fn rejected(code: ErrorCode, message: impl Into<String>) -> Self {
        ServiceError::Rejected {
            code,
            message: message.into(),
        }
    }

    /// Machine-readable code of the error.
    pub fn code(&self) -> ErrorCode {
        match self {
            ServiceError::Unavailable(_) | ServiceError::Degraded => ErrorCode::StorageUnavailable,
            ServiceError::ActiveGameExists { .. } => ErrorCode::ActiveGameExists,
            ServiceError::CardAlreadyPlayed { .. } => ErrorCode::CardAlreadyPlayed,
            ServiceError::WrongTurn { .. } => ErrorCode::WrongTurn,
            ServiceError::Rejected { code, .. } => *code,
        }
    }

    /// Logical category of the error.
    pub fn kind(&self) -> ErrorKind {
        self.code().kind()
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            ServiceError::ActiveGameExists { game_id } => Some(json!({ "game_id": game_id })),
            ServiceError::CardAlreadyPlayed {
                card_id,
                participant_ids,
            } => Some(json!({
                "card_id": card_id,
                "participant_ids": participant_ids,
            })),
            ServiceError::WrongTurn {
                expected_id,
                expected_name,
            } => Some(json!({
                "expected_participant_id": expected_id,
                "expected_participant_name": expected_name,
            })),
            _ => None,
        }
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Conflict(conflict) => conflict.into(),
            unavailable => ServiceError::Unavailable(unavailable),
        }
    }
}

impl From<StorageConflict> for ServiceError {
    fn from(conflict: StorageConflict) -> Self {
        match conflict {
            StorageConflict::DuplicateRound => ServiceError::rejected(
                ErrorCode::CardAlreadyPlayed,
                "card was already played in this game",
            ),
            StorageConflict::ActiveGameExists => ServiceError::rejected(
                ErrorCode::ActiveGameExists,
                "a game is already active for this deck",
            ),
            StorageConflict::StaleGame | StorageConflict::ConcurrentUpdate => {
                ServiceError::rejected(
                    ErrorCode::ConcurrentUpdate,
                    "game was updated concurrently; reload and retry",
                )
            }
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(ErrorBody::new(
            ErrorCode::InvalidInput,
            format!("validation failed: {err}"),
        ))
    }
}

/// JSON payload returned with every error response.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Machine-readable error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
    /// Structured context for conflicts (existing game, expected player, colliding participants).
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
}

impl ErrorBody {
    /// Body without details.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }
}

impl fmt::Display for ErrorBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(ErrorBody),
    /// Missing or malformed caller identity.
    #[error("unauthorized: {0}")]
    Unauthorized(ErrorBody),
    /// Caller is not allowed to use the resource.
    #[error("forbidden: {0}")]
    Forbidden(ErrorBody),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(ErrorBody),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(ErrorBody),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(ErrorBody),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(ErrorBody),
}

impl AppError {
    /// Reject a request whose caller identity is missing or invalid.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        AppError::Unauthorized(ErrorBody::new(ErrorCode::Unauthorized, message))
    }

    /// Reject malformed input that did not reach the service layer.
    pub fn bad_request(message: impl Into<String>) -> Self {
        AppError::BadRequest(ErrorBody::new(ErrorCode::InvalidInput, message))
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn into_body(self) -> ErrorBody {
        match self {
            AppError::BadRequest(body)
            | AppError::Unauthorized(body)
            | AppError::Forbidden(body)
            | AppError::NotFound(body)
            | AppError::Conflict(body)
            | AppError::ServiceUnavailable(body)
            | AppError::Internal(body) => body,
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        let body = ErrorBody {
            code: err.code(),
            message: err.to_string(),
            details: err.details(),
        };

        match err {
            ServiceError::Unavailable(_) | ServiceError::Degraded => {
                AppError::ServiceUnavailable(body)
            }
            other => match other.kind() {
                ErrorKind::Validation => AppError::BadRequest(body),
                ErrorKind::AccessDenied => AppError::Forbidden(body),
                ErrorKind::NotFound => AppError::NotFound(body),
                ErrorKind::StateConflict => AppError::Conflict(body),
                ErrorKind::Internal => AppError::Internal(body),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        (status, Json(self.into_body())).into_response()
    }
}
