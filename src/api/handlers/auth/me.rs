use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use super::{principal::require_auth, types::MeResponse};
use crate::auth::SessionService;

#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "Identity carried by the bearer access token", body = MeResponse),
        (status = 401, description = "Missing, invalid, or expired access token", body = String),
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn me(headers: HeaderMap, session: Extension<Arc<SessionService>>) -> impl IntoResponse {
    match require_auth(&headers, &session) {
        Ok(principal) => (StatusCode::OK, Json(MeResponse::from(principal))).into_response(),
        Err(err) => err.into_response(),
    }
}
