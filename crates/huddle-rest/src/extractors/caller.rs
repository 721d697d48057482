//! Caller identity extractor.

use crate::responses::AppError;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use huddle_core::{HuddleError, UserId};

/// Header carrying the verified user id, set by the trusted gateway.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The user on whose behalf the request runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerId(pub UserId);

impl std::ops::Deref for CallerId {
    type Target = UserId;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CallerId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| HuddleError::invalid_argument("missing X-User-Id header"))?
            .to_str()
            .map_err(|_| HuddleError::invalid_argument("X-User-Id header is not valid text"))?;

        let user_id = UserId::parse(raw.trim())?;
        Ok(CallerId(user_id))
    }
}
