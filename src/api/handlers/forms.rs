use crate::AppState;
use crate::api::error::AppError;
use crate::api::middleware::auth::require_admin;
use crate::models::{DocumentationInput, RecordFields, RecordKind, SubmittedRecord, VehicleInput};
use crate::services::form_service::{FormView, UploadedFile};
use crate::utils::auth::Claims;
use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

/// Multipart field carrying the picked images
const FILES_FIELD: &str = "files";

#[derive(Deserialize, ToSchema)]
pub struct OpenFormRequest {
    pub kind: RecordKind,
    /// Existing record to edit; omit to create a new one
    pub record_id: Option<String>,
}

#[utoipa::path(
    post,
    path = "/forms",
    request_body = OpenFormRequest,
    responses(
        (status = 201, description = "Form opened", body = FormView),
        (status = 403, description = "Vehicle forms require an administrator"),
        (status = 404, description = "Record not found")
    ),
    security(("jwt" = [])),
    tag = "forms"
)]
pub async fn open_form(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<OpenFormRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.kind == RecordKind::Vehicle {
        require_admin(&state.config, &claims)?;
    }

    let view = state
        .forms
        .open(&claims.sub, payload.kind, payload.record_id.as_deref())
        .await?;

    Ok((StatusCode::CREATED, Json(view)))
}

#[utoipa::path(
    get,
    path = "/forms/{id}",
    params(("id" = Uuid, Path, description = "Form session ID")),
    responses(
        (status = 200, description = "Current form state", body = FormView),
        (status = 404, description = "Form not found")
    ),
    security(("jwt" = [])),
    tag = "forms"
)]
pub async fn get_form(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<FormView>, AppError> {
    Ok(Json(state.forms.view(&claims.sub, id).await?))
}

#[utoipa::path(
    delete,
    path = "/forms/{id}",
    params(("id" = Uuid, Path, description = "Form session ID")),
    responses(
        (status = 204, description = "Form closed and previews released"),
        (status = 404, description = "Form not found")
    ),
    security(("jwt" = [])),
    tag = "forms"
)]
pub async fn close_form(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.forms.close(&claims.sub, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/forms/{id}/images",
    params(("id" = Uuid, Path, description = "Form session ID")),
    request_body(content = Object, description = "One or more `files` parts", content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Images staged", body = FormView),
        (status = 400, description = "Too many images or not an image")
    ),
    security(("jwt" = [])),
    tag = "forms"
)]
pub async fn add_images(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<FormView>, AppError> {
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        let err_msg = e.to_string();
        if err_msg.contains("length limit exceeded") {
            AppError::PayloadTooLarge("Request body exceeds the maximum allowed limit".to_string())
        } else {
            AppError::BadRequest(err_msg)
        }
    })? {
        if field.name() != Some(FILES_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or("unnamed").to_string();
        let content_type = field.content_type().map(|s| s.to_string());
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;

        files.push(UploadedFile {
            filename,
            content_type,
            data,
        });
    }

    if files.is_empty() {
        return Err(AppError::BadRequest("No files provided".to_string()));
    }

    Ok(Json(state.forms.add_files(&claims.sub, id, files).await?))
}

#[utoipa::path(
    delete,
    path = "/forms/{id}/images/{index}",
    params(
        ("id" = Uuid, Path, description = "Form session ID"),
        ("index" = usize, Path, description = "Position of the image in display order")
    ),
    responses(
        (status = 200, description = "Image removed", body = FormView),
        (status = 400, description = "No image at that position")
    ),
    security(("jwt" = [])),
    tag = "forms"
)]
pub async fn remove_image(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((id, index)): Path<(Uuid, usize)>,
) -> Result<Json<FormView>, AppError> {
    Ok(Json(state.forms.remove_image(&claims.sub, id, index).await?))
}

#[utoipa::path(
    post,
    path = "/forms/{id}/submit",
    params(("id" = Uuid, Path, description = "Form session ID")),
    request_body(content = Object, description = "DocumentationInput or VehicleInput, matching the form's kind"),
    responses(
        (status = 200, description = "Images uploaded and record saved", body = SubmittedRecord),
        (status = 400, description = "Invalid fields"),
        (status = 409, description = "Form closed or already submitting"),
        (status = 502, description = "Upload or record write failed")
    ),
    security(("jwt" = [])),
    tag = "forms"
)]
pub async fn submit_form(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<serde_json::Value>,
) -> Result<Json<SubmittedRecord>, AppError> {
    let kind = state.forms.kind(&claims.sub, id).await?;

    let fields = match kind {
        RecordKind::Documentation => serde_json::from_value::<DocumentationInput>(payload)
            .map(RecordFields::Documentation),
        RecordKind::Vehicle => {
            require_admin(&state.config, &claims)?;
            serde_json::from_value::<VehicleInput>(payload).map(RecordFields::Vehicle)
        }
    }
    .map_err(|e| AppError::BadRequest(format!("Invalid {} fields: {}", kind, e)))?;

    Ok(Json(state.forms.submit(&claims.sub, id, fields).await?))
}
