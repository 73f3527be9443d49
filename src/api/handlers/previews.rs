use crate::AppState;
use crate::api::error::AppError;
use crate::utils::auth::Claims;
use axum::{
    Extension,
    extract::{Path, State},
    http::header,
    response::IntoResponse,
};
use uuid::Uuid;

#[utoipa::path(
    get,
    path = "/previews/{id}",
    params(("id" = Uuid, Path, description = "Preview handle")),
    responses(
        (status = 200, description = "Staged image bytes"),
        (status = 404, description = "Preview released, unknown, or staged by another user")
    ),
    security(("jwt" = [])),
    tag = "forms"
)]
pub async fn get_preview(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let (data, content_type) = state
        .previews
        .read(id, &claims.sub)
        .await
        .ok_or_else(|| AppError::NotFound("Preview not found".to_string()))?;

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, "private, no-store".to_string()),
        ],
        data,
    ))
}
