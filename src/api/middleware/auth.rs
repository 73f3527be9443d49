use crate::AppState;
use crate::api::error::AppError;
use crate::config::AppConfig;
use crate::utils::auth::{Claims, validate_jwt};
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use serde::Deserialize;

#[derive(Deserialize)]
struct AuthQuery {
    token: Option<String>,
}

/// Accepts the hosted auth service's access token as a bearer header or `?token=` query
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|s| s.to_string());

    let token = if let Some(t) = auth_header {
        Some(t)
    } else {
        // Try query parameter
        let query = req.uri().query().unwrap_or_default();
        serde_urlencoded::from_str::<AuthQuery>(query)
            .ok()
            .and_then(|q| q.token)
    };

    if let Some(token) = token {
        match validate_jwt(&token, &state.config.jwt_secret, &state.config.jwt_audience) {
            Ok(claims) => {
                req.extensions_mut().insert(claims);
                return Ok(next.run(req).await);
            }
            Err(e) => tracing::debug!("Rejected access token: {}", e),
        }
    }

    Err(StatusCode::UNAUTHORIZED)
}

/// Vehicle catalog management is limited to the configured admin accounts
pub fn require_admin(config: &AppConfig, claims: &Claims) -> Result<(), AppError> {
    if config.is_admin(&claims.sub) {
        Ok(())
    } else {
        tracing::warn!("User {} attempted a vehicle admin action", claims.sub);
        Err(AppError::Forbidden(
            "Only administrators can manage vehicles".to_string(),
        ))
    }
}
