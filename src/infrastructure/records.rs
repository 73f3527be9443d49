use crate::config::AppConfig;
use crate::infrastructure::supabase_client;
use crate::services::records::{MemoryRecordStore, RecordStore, SupabaseRecordStore};
use anyhow::{Result, bail};
use std::sync::Arc;
use tracing::{info, warn};

pub fn setup_record_store(config: &AppConfig) -> Result<Arc<dyn RecordStore>> {
    match config.record_store_backend.as_str() {
        "supabase" => {
            let client = supabase_client(config)?;
            info!("🗄️  Record store: Supabase PostgREST");
            Ok(Arc::new(SupabaseRecordStore::new(client)))
        }
        "memory" => {
            warn!("⚠️  Record store: in-memory, records are lost on restart");
            Ok(Arc::new(MemoryRecordStore::new()))
        }
        other => bail!(
            "Unknown RECORD_STORE_BACKEND '{}', expected 'supabase' or 'memory'",
            other
        ),
    }
}
