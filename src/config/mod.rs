use crate::models::RecordKind;
use std::env;
use std::time::Duration;

/// What closing a form does to a submit that is still uploading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseBehavior {
    /// Close returns immediately; the stale submit result is discarded when it settles
    Detach,
    /// Close waits for the in-flight submit to settle before tearing the form down
    Wait,
}

impl CloseBehavior {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "detach" => Some(Self::Detach),
            "wait" => Some(Self::Wait),
            _ => None,
        }
    }
}

/// Per-record-kind attachment limits and storage location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordLimits {
    pub max_images: usize,
    pub bucket: String,
    pub path_prefix: String,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Maximum size of a single staged image in bytes (default: 10 MB)
    pub max_image_size: usize,

    /// Documentation entries: up to 5 images in `ojt-images/ojt-documentations/`
    pub documentation: RecordLimits,

    /// Vehicle listings: a single image in `vehicle-images/vehicles/`
    pub vehicle: RecordLimits,

    /// Open forms idle for longer than this are torn down (default: 30)
    pub session_idle_minutes: u64,

    /// How often the idle-form sweeper runs, at least once a second (default: 60)
    pub sweep_interval_secs: u64,

    /// Upper bound on a single storage or record-store request (default: 30s)
    pub upstream_timeout: Duration,

    /// Close semantics for a form with a submit in flight (default: detach)
    pub close_behavior: CloseBehavior,

    /// Object storage backend: "supabase" or "s3" (default: "supabase")
    pub storage_backend: String,

    /// Record store backend: "supabase" or "memory" (default: "supabase")
    pub record_store_backend: String,

    pub supabase_url: Option<String>,
    pub supabase_service_key: Option<String>,

    pub s3_endpoint: Option<String>,
    pub s3_access_key: Option<String>,
    pub s3_secret_key: Option<String>,
    pub s3_region: String,
    /// Base URL that public object links are built from
    pub s3_public_url: Option<String>,

    /// Secret the hosted auth service signs access tokens with (Required)
    pub jwt_secret: String,
    pub jwt_audience: String,

    /// Users allowed to manage the vehicle catalog
    pub admin_user_ids: Vec<String>,

    /// Allowed CORS Origins (comma separated)
    pub allowed_origins: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_image_size: 10 * 1024 * 1024, // 10 MB
            documentation: RecordLimits {
                max_images: 5,
                bucket: "ojt-images".to_string(),
                path_prefix: "ojt-documentations".to_string(),
            },
            vehicle: RecordLimits {
                max_images: 1,
                bucket: "vehicle-images".to_string(),
                path_prefix: "vehicles".to_string(),
            },
            session_idle_minutes: 30,
            sweep_interval_secs: 60,
            upstream_timeout: Duration::from_secs(30),
            close_behavior: CloseBehavior::Detach,
            storage_backend: "supabase".to_string(),
            record_store_backend: "supabase".to_string(),
            supabase_url: None,
            supabase_service_key: None,
            s3_endpoint: None,
            s3_access_key: None,
            s3_secret_key: None,
            s3_region: "us-east-1".to_string(),
            s3_public_url: None,
            jwt_secret: "secret".to_string(),
            jwt_audience: "authenticated".to_string(),
            admin_user_ids: Vec::new(),
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(), // Vite default
                "http://127.0.0.1:5173".to_string(),
            ],
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            max_image_size: env::var("MAX_IMAGE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_image_size),

            documentation: RecordLimits {
                max_images: env::var("DOCUMENTATION_MAX_IMAGES")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(default.documentation.max_images),
                bucket: env::var("DOCUMENTATION_BUCKET").unwrap_or(default.documentation.bucket),
                path_prefix: env::var("DOCUMENTATION_PATH_PREFIX")
                    .unwrap_or(default.documentation.path_prefix),
            },

            vehicle: RecordLimits {
                max_images: env::var("VEHICLE_MAX_IMAGES")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .map(vehicle_max_images)
                    .unwrap_or(default.vehicle.max_images),
                bucket: env::var("VEHICLE_BUCKET").unwrap_or(default.vehicle.bucket),
                path_prefix: env::var("VEHICLE_PATH_PREFIX")
                    .unwrap_or(default.vehicle.path_prefix),
            },

            session_idle_minutes: env::var("SESSION_IDLE_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.session_idle_minutes),

            sweep_interval_secs: env::var("SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(|secs| secs.max(1))
                .unwrap_or(default.sweep_interval_secs),

            upstream_timeout: env::var("UPSTREAM_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(|secs| Duration::from_secs(secs.max(1)))
                .unwrap_or(default.upstream_timeout),

            close_behavior: env::var("FORM_CLOSE_BEHAVIOR")
                .ok()
                .and_then(|v| CloseBehavior::parse(&v))
                .unwrap_or(default.close_behavior),

            storage_backend: env::var("STORAGE_BACKEND").unwrap_or(default.storage_backend),
            record_store_backend: env::var("RECORD_STORE_BACKEND")
                .unwrap_or(default.record_store_backend),

            supabase_url: env::var("SUPABASE_URL").ok(),
            supabase_service_key: env::var("SUPABASE_SERVICE_KEY").ok(),

            s3_endpoint: env::var("S3_ENDPOINT").ok(),
            s3_access_key: env::var("S3_ACCESS_KEY").ok(),
            s3_secret_key: env::var("S3_SECRET_KEY").ok(),
            s3_region: env::var("S3_REGION").unwrap_or(default.s3_region),
            s3_public_url: env::var("S3_PUBLIC_URL").ok(),

            jwt_secret: env::var("JWT_SECRET").unwrap_or(default.jwt_secret), // Dev fallback, main warns when it is used
            jwt_audience: env::var("JWT_AUDIENCE").unwrap_or(default.jwt_audience),

            admin_user_ids: env::var("ADMIN_USER_IDS")
                .map(|v| split_list(&v))
                .unwrap_or(default.admin_user_ids),

            allowed_origins: env::var("ALLOWED_ORIGINS")
                .map(|v| split_list(&v))
                .unwrap_or(default.allowed_origins),
        }
    }

    /// Create config for development (in-memory records, short idle timeout)
    pub fn development() -> Self {
        Self {
            record_store_backend: "memory".to_string(),
            session_idle_minutes: 5,
            sweep_interval_secs: 30,
            jwt_secret: "development-secret".to_string(),
            ..Self::default()
        }
    }

    pub fn limits_for(&self, kind: RecordKind) -> &RecordLimits {
        match kind {
            RecordKind::Documentation => &self.documentation,
            RecordKind::Vehicle => &self.vehicle,
        }
    }

    /// Configured image limit, never above what the record kind can store
    pub fn max_images_for(&self, kind: RecordKind) -> usize {
        let configured = self.limits_for(kind).max_images;
        match kind.image_cap() {
            Some(cap) => configured.min(cap),
            None => configured,
        }
    }

    pub fn is_admin(&self, user_id: &str) -> bool {
        self.admin_user_ids.iter().any(|id| id == user_id)
    }

    pub fn uses_default_secret(&self) -> bool {
        self.jwt_secret == Self::default().jwt_secret
    }
}

/// A vehicle row has a single image column
fn vehicle_max_images(parsed: usize) -> usize {
    let cap = RecordKind::Vehicle.image_cap().unwrap_or(parsed);
    if parsed > cap {
        tracing::warn!(
            "VEHICLE_MAX_IMAGES={} exceeds the single image a vehicle can hold, using {}",
            parsed,
            cap
        );
        return cap;
    }
    parsed
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
