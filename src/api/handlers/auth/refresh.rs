use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;
use tracing::instrument;

use super::types::{RefreshTokenRequest, TokenResponse};
use crate::auth::{unix_now, SessionService};

#[utoipa::path(
    post,
    path = "/auth/refresh-token",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "New access token and rotated refresh token", body = TokenResponse),
        (status = 401, description = "Invalid, expired, or already used refresh token", body = String),
    ),
    tag = "auth"
)]
#[instrument(skip(session, payload))]
pub async fn refresh_token(
    session: Extension<Arc<SessionService>>,
    payload: Option<Json<RefreshTokenRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload").into_response();
    };

    match session.refresh(&request.refresh_token, unix_now()).await {
        Ok(pair) => (StatusCode::OK, Json(TokenResponse::from(pair))).into_response(),
        Err(err) => err.into_response(),
    }
}
