//! Caller Identity
//!
//! Authentication happens upstream. The gateway forwards the verified
//! identity in `x-auth-*` headers, which are trusted as-is.

use std::convert::Infallible;

use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::{request::Parts, StatusCode},
    Json,
};
use lesson_core::Principal;

use crate::handlers::ErrorResponse;

pub const EMAIL_HEADER: &str = "x-auth-email";
pub const NAME_HEADER: &str = "x-auth-name";
pub const AVATAR_HEADER: &str = "x-auth-avatar";

/// Authenticated caller; rejects with 401 when no identity is forwarded
#[derive(Clone, Debug)]
pub struct CurrentUser(pub Principal);

fn header(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn principal(parts: &Parts) -> Option<Principal> {
    let email = header(parts, EMAIL_HEADER)?;
    Some(Principal {
        email,
        name: header(parts, NAME_HEADER),
        avatar_url: header(parts, AVATAR_HEADER),
    })
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        principal(parts).map(Self).ok_or_else(|| {
            (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "Authentication required".into(),
                    code: "UNAUTHORIZED".into(),
                }),
            )
        })
    }
}

impl<S> OptionalFromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(principal(parts).map(Self))
    }
}
