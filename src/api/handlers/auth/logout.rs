use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;
use tracing::instrument;

use super::types::RefreshTokenRequest;
use crate::auth::{unix_now, AuthError, SessionService};

#[utoipa::path(
    post,
    path = "/auth/logout",
    request_body = RefreshTokenRequest,
    responses(
        (status = 204, description = "Refresh token revoked")
    ),
    tag = "auth"
)]
#[instrument(skip(session, payload))]
pub async fn logout(
    session: Extension<Arc<SessionService>>,
    payload: Option<Json<RefreshTokenRequest>>,
) -> impl IntoResponse {
    // Rejected tokens still answer 204; only backend failures surface.
    let Some(Json(request)) = payload else {
        return StatusCode::NO_CONTENT.into_response();
    };

    match session.logout(&request.refresh_token, unix_now()).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err @ AuthError::Internal(_)) => err.into_response(),
        Err(_) => StatusCode::NO_CONTENT.into_response(),
    }
}
