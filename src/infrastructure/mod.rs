pub mod records;
pub mod storage;

use crate::config::AppConfig;
use crate::services::supabase::SupabaseClient;
use anyhow::{Context, Result};

/// Client for the hosted project, shared by the Supabase-backed adapters
pub fn supabase_client(config: &AppConfig) -> Result<SupabaseClient> {
    let url = config
        .supabase_url
        .as_deref()
        .context("SUPABASE_URL must be set")?;
    let key = config
        .supabase_service_key
        .as_deref()
        .context("SUPABASE_SERVICE_KEY must be set")?;
    SupabaseClient::new(url, key, config.upstream_timeout)
}
