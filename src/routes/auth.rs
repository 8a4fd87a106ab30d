use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{dao::models::UserId, error::AppError};

/// Header carrying the authenticated user id, set by the upstream auth layer.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Caller identity resolved from [`USER_ID_HEADER`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser(pub UserId);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::unauthorized("missing user header `X-User-Id`"))?;

        match raw.trim().parse::<UserId>() {
            Ok(id) if id > 0 => Ok(CurrentUser(id)),
            _ => Err(AppError::unauthorized("invalid user header `X-User-Id`")),
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    async fn extract(header: Option<&str>) -> Result<CurrentUser, AppError> {
        let mut builder = Request::builder().uri("/games");
        if let Some(value) = header {
            builder = builder.header(USER_ID_HEADER, value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        CurrentUser::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn reads_positive_user_id() {
        assert_eq!(extract(Some(" 42 ")).await.unwrap(), CurrentUser(42));
    }

    #[tokio::test]
    async fn rejects_missing_or_malformed_header() {
        for header in [None, Some("abc"), Some("0"), Some("-3")] {
            assert!(
                matches!(extract(header).await, Err(AppError::Unauthorized(_))),
                "{header:?}"
            );
        }
    }
}
