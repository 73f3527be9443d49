use crate::AppState;
use crate::api::error::AppError;
use crate::api::middleware::auth::require_admin;
use crate::models::{Vehicle, VehiclePatch};
use crate::utils::auth::Claims;
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};

#[utoipa::path(
    get,
    path = "/vehicles",
    responses(
        (status = 200, description = "Vehicle catalog, newest first", body = Vec<Vehicle>)
    ),
    tag = "vehicles"
)]
pub async fn list_vehicles(State(state): State<AppState>) -> Result<Json<Vec<Vehicle>>, AppError> {
    let vehicles = state
        .records
        .list_vehicles()
        .await
        .map_err(|e| AppError::BadGateway(e.to_string()))?;
    Ok(Json(vehicles))
}

async fn find_vehicle(state: &AppState, id: &str) -> Result<Vehicle, AppError> {
    state
        .records
        .get_vehicle(id)
        .await
        .map_err(|e| AppError::BadGateway(e.to_string()))?
        .ok_or_else(|| AppError::NotFound("Vehicle not found".to_string()))
}

#[utoipa::path(
    delete,
    path = "/vehicles/{id}",
    params(("id" = String, Path, description = "Vehicle ID")),
    responses(
        (status = 204, description = "Vehicle deleted"),
        (status = 403, description = "Not an administrator"),
        (status = 404, description = "Vehicle not found")
    ),
    security(("jwt" = [])),
    tag = "vehicles"
)]
pub async fn delete_vehicle(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    require_admin(&state.config, &claims)?;
    find_vehicle(&state, &id).await?;

    state
        .records
        .delete_vehicle(&id)
        .await
        .map_err(|e| AppError::BadGateway(e.to_string()))?;

    tracing::info!("🗑️  Vehicle {} deleted by {}", id, claims.sub);
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/vehicles/{id}/toggle-status",
    params(("id" = String, Path, description = "Vehicle ID")),
    responses(
        (status = 200, description = "Status flipped between available and sold", body = Vehicle),
        (status = 403, description = "Not an administrator"),
        (status = 404, description = "Vehicle not found")
    ),
    security(("jwt" = [])),
    tag = "vehicles"
)]
pub async fn toggle_vehicle_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<Vehicle>, AppError> {
    require_admin(&state.config, &claims)?;
    let vehicle = find_vehicle(&state, &id).await?;

    let updated = state
        .records
        .update_vehicle(&id, VehiclePatch::status(vehicle.status.toggled()))
        .await
        .map_err(|e| AppError::BadGateway(e.to_string()))?;

    tracing::info!("🔁 Vehicle {} is now {:?}", id, updated.status);
    Ok(Json(updated))
}
