//! Bearer token extraction for protected handlers.
//!
//! Downstream services call [`require_auth`] (or [`SessionService::verify`] directly) to
//! turn an `Authorization: Bearer` header into a [`Principal`].

use axum::http::{header::AUTHORIZATION, HeaderMap};

use crate::auth::{unix_now, AuthError, Principal, SessionService};

/// Resolve the bearer access token into a principal, or reject with 401.
///
/// # Errors
/// Returns `InvalidAccessToken` when the header is missing or the token fails verification.
pub fn require_auth(headers: &HeaderMap, session: &SessionService) -> Result<Principal, AuthError> {
    let token = extract_bearer_token(headers).ok_or(AuthError::InvalidAccessToken)?;
    session.verify(token, unix_now())
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}
