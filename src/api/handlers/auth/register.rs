use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;
use tracing::instrument;

use super::{types::CredentialsRequest, REGISTERED_MESSAGE};
use crate::auth::SessionService;

#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = CredentialsRequest,
    responses(
        (status = 200, description = "User registered successfully", body = String),
        (status = 400, description = "Username already exists or invalid input", body = String),
    ),
    tag = "auth"
)]
#[instrument(skip(session, payload))]
pub async fn register(
    session: Extension<Arc<SessionService>>,
    payload: Option<Json<CredentialsRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload").into_response();
    };

    match session.register(&request.username, &request.password).await {
        Ok(_) => (StatusCode::OK, REGISTERED_MESSAGE).into_response(),
        Err(err) => err.into_response(),
    }
}
