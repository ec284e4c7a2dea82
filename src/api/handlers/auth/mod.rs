//! Auth handlers.
//!
//! Every rejection is rendered from [`AuthError`] so the status code and body for a given
//! outcome are identical across endpoints. Internal failures are logged here and reach the
//! client only as a bare 500.

pub(crate) mod login;
pub(crate) mod logout;
pub(crate) mod me;
pub(crate) mod principal;
pub(crate) mod refresh;
pub(crate) mod register;
pub(crate) mod types;

use axum::{
    http::{header::WWW_AUTHENTICATE, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::error;

use crate::auth::AuthError;

pub(crate) const REGISTERED_MESSAGE: &str = "User registered successfully";

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            Self::InvalidInput(reason) => (StatusCode::BAD_REQUEST, reason).into_response(),
            Self::DuplicateUsername => {
                (StatusCode::BAD_REQUEST, "Username already exists").into_response()
            }
            Self::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, "Invalid username or password").into_response()
            }
            Self::InvalidRefreshToken => {
                (StatusCode::UNAUTHORIZED, "Invalid refresh token").into_response()
            }
            Self::InvalidAccessToken => (
                StatusCode::UNAUTHORIZED,
                [(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"))],
                "Invalid access token",
            )
                .into_response(),
            Self::Forbidden => (StatusCode::FORBIDDEN, "Forbidden").into_response(),
            Self::Internal(err) => {
                error!("Internal failure: {err:#}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        }
    }
}
