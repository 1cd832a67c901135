use crate::error::PollError;
use crate::startup::{ADMIN_TOKEN_HEADER, AppState};
use axum::{
    body::Bytes,
    extract::{Extension, Json},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde_json::json;

/// Accept a vote or reset posted as JSON.
///
/// Responds with the tally as it stood right after this request was applied.
pub async fn submit(
    Extension(app_state): Extension<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, PollError> {
    let token = headers
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok());
    let role = app_state.reset_policy.role_for(token);

    let tally = app_state.ingress.handle_raw(&body, role).await?;
    Ok((StatusCode::OK, Json(tally)))
}

pub async fn get_tally(Extension(app_state): Extension<AppState>) -> impl IntoResponse {
    let tally = app_state.ingress.connect_snapshot().await;
    (StatusCode::OK, Json(tally))
}

pub async fn health(Extension(app_state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "observers": app_state.ingress.broadcaster().observer_count(),
        })),
    )
}
