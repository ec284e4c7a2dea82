use crate::api::GIT_COMMIT_HASH;
use axum::response::IntoResponse;

// axum handler for the banner at `/`
pub async fn root() -> impl IntoResponse {
    format!(
        "{} {} ({})",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        GIT_COMMIT_HASH
    )
}
