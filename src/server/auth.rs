//! Caller identity.
//!
//! Sessions are resolved by the gateway in front of this service, which
//! forwards the authenticated user in a header. Requests without it are
//! rejected before any handler logic runs.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::constants::network::USER_ID_HEADER;
use crate::types::{BookError, UserId};

/// The authenticated caller
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserId);

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = BookError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| CurrentUser(UserId::new(id)))
            .ok_or(BookError::Unauthorized)
    }
}
