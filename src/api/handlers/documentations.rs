use crate::AppState;
use crate::api::error::AppError;
use crate::models::Documentation;
use crate::utils::auth::Claims;
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};

#[utoipa::path(
    get,
    path = "/documentations",
    responses(
        (status = 200, description = "The caller's journal entries, newest date first", body = Vec<Documentation>),
        (status = 401, description = "Unauthorized")
    ),
    security(("jwt" = [])),
    tag = "documentations"
)]
pub async fn list_documentations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<Documentation>>, AppError> {
    let docs = state
        .records
        .list_documentations(&claims.sub)
        .await
        .map_err(|e| AppError::BadGateway(e.to_string()))?;
    Ok(Json(docs))
}

#[utoipa::path(
    delete,
    path = "/documentations/{id}",
    params(("id" = String, Path, description = "Documentation ID")),
    responses(
        (status = 204, description = "Entry deleted"),
        (status = 404, description = "Entry not found")
    ),
    security(("jwt" = [])),
    tag = "documentations"
)]
pub async fn delete_documentation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let exists = state
        .records
        .get_documentation(&claims.sub, &id)
        .await
        .map_err(|e| AppError::BadGateway(e.to_string()))?
        .is_some();
    if !exists {
        return Err(AppError::NotFound("Documentation not found".to_string()));
    }

    // Stored images are left in the bucket
    state
        .records
        .delete_documentation(&claims.sub, &id)
        .await
        .map_err(|e| AppError::BadGateway(e.to_string()))?;

    tracing::info!("🗑️  Deleted documentation {} of {}", id, claims.sub);
    Ok(StatusCode::NO_CONTENT)
}
