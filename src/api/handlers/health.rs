use crate::AppState;
use axum::{Json, extract::State, response::IntoResponse};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub storage: String,
    pub records: String,
    pub open_forms: usize,
    pub live_previews: usize,
    pub version: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "System health status", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        storage: state.storage.backend().to_string(),
        records: state.records.backend().to_string(),
        open_forms: state.forms.session_count(),
        live_previews: state.previews.len(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
