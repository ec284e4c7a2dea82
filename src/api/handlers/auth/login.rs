use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;
use tracing::instrument;

use super::types::{CredentialsRequest, TokenResponse};
use crate::auth::{unix_now, SessionService};

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = CredentialsRequest,
    responses(
        (status = 200, description = "Access and refresh tokens", body = TokenResponse),
        (status = 401, description = "Invalid username or password", body = String),
    ),
    tag = "auth"
)]
#[instrument(skip(session, payload))]
pub async fn login(
    session: Extension<Arc<SessionService>>,
    payload: Option<Json<CredentialsRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload").into_response();
    };

    match session
        .login(&request.username, &request.password, unix_now())
        .await
    {
        Ok(pair) => (StatusCode::OK, Json(TokenResponse::from(pair))).into_response(),
        Err(err) => err.into_response(),
    }
}
