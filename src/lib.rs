pub mod api;
pub mod config;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod staging;
pub mod utils;

use crate::api::middleware::{auth::auth_middleware, request_id::request_id_middleware};
use crate::config::AppConfig;
use crate::models::RecordKind;
use crate::services::form_service::FormService;
use crate::services::records::RecordStore;
use crate::services::storage::ObjectStorage;
use crate::staging::PreviewStore;
use axum::{
    Router,
    http::HeaderValue,
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::health::health_check,
        api::handlers::forms::open_form,
        api::handlers::forms::get_form,
        api::handlers::forms::close_form,
        api::handlers::forms::add_images,
        api::handlers::forms::remove_image,
        api::handlers::forms::submit_form,
        api::handlers::previews::get_preview,
        api::handlers::documentations::list_documentations,
        api::handlers::documentations::delete_documentation,
        api::handlers::vehicles::list_vehicles,
        api::handlers::vehicles::delete_vehicle,
        api::handlers::vehicles::toggle_vehicle_status,
    ),
    components(
        schemas(
            api::handlers::health::HealthResponse,
            api::handlers::forms::OpenFormRequest,
            services::form_service::FormView,
            services::form_service::ImageView,
            services::form_service::SessionState,
            models::RecordKind,
            models::VehicleStatus,
            models::Documentation,
            models::DocumentationInput,
            models::Vehicle,
            models::VehicleInput,
            models::SubmittedRecord,
        )
    ),
    tags(
        (name = "forms", description = "Edit forms and image staging"),
        (name = "documentations", description = "OJT journal entries"),
        (name = "vehicles", description = "Showroom vehicle catalog"),
        (name = "system", description = "System endpoints")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub records: Arc<dyn RecordStore>,
    pub storage: Arc<dyn ObjectStorage>,
    pub previews: Arc<PreviewStore>,
    pub forms: Arc<FormService>,
    pub config: AppConfig,
}

impl AppState {
    /// Wires the form service to the given collaborators and a fresh preview store
    pub fn new(
        config: AppConfig,
        records: Arc<dyn RecordStore>,
        storage: Arc<dyn ObjectStorage>,
    ) -> anyhow::Result<Self> {
        let previews = Arc::new(PreviewStore::new()?);
        let forms = Arc::new(FormService::new(
            records.clone(),
            storage.clone(),
            previews.clone(),
            config.clone(),
        ));

        Ok(Self {
            records,
            storage,
            previews,
            forms,
            config,
        })
    }
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

pub fn create_app(state: AppState) -> Router {
    let max_images = state
        .config
        .max_images_for(RecordKind::Documentation)
        .max(state.config.max_images_for(RecordKind::Vehicle));
    let body_limit = state.config.max_image_size * max_images + 1024 * 1024;

    let protected = Router::new()
        .route("/forms", post(api::handlers::forms::open_form))
        .route(
            "/forms/:id",
            get(api::handlers::forms::get_form).delete(api::handlers::forms::close_form),
        )
        .route("/forms/:id/images", post(api::handlers::forms::add_images))
        .route(
            "/forms/:id/images/:index",
            delete(api::handlers::forms::remove_image),
        )
        .route("/forms/:id/submit", post(api::handlers::forms::submit_form))
        .route("/previews/:id", get(api::handlers::previews::get_preview))
        .route(
            "/documentations",
            get(api::handlers::documentations::list_documentations),
        )
        .route(
            "/documentations/:id",
            delete(api::handlers::documentations::delete_documentation),
        )
        .route(
            "/vehicles/:id",
            delete(api::handlers::vehicles::delete_vehicle),
        )
        .route(
            "/vehicles/:id/toggle-status",
            post(api::handlers::vehicles::toggle_vehicle_status),
        )
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .route("/vehicles", get(api::handlers::vehicles::list_vehicles))
        .merge(protected)
        .layer(cors_layer(&state.config))
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}
