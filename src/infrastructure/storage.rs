use crate::config::AppConfig;
use crate::infrastructure::supabase_client;
use crate::services::storage::{ObjectStorage, S3Storage, SupabaseStorage};
use anyhow::{Context, Result, bail};
use aws_config::timeout::TimeoutConfig;
use aws_sdk_s3::config::Region;
use std::sync::Arc;
use tracing::info;

pub async fn setup_storage(config: &AppConfig) -> Result<Arc<dyn ObjectStorage>> {
    match config.storage_backend.as_str() {
        "supabase" => {
            let client = supabase_client(config)?;
            info!(
                "☁️  Supabase Storage (buckets: {}, {})",
                config.documentation.bucket, config.vehicle.bucket
            );
            Ok(Arc::new(SupabaseStorage::new(client)))
        }
        "s3" => setup_s3(config).await,
        other => bail!("Unknown STORAGE_BACKEND '{}', expected 'supabase' or 's3'", other),
    }
}

async fn setup_s3(config: &AppConfig) -> Result<Arc<dyn ObjectStorage>> {
    let endpoint_url = config
        .s3_endpoint
        .clone()
        .context("S3_ENDPOINT must be set")?;
    let access_key = config
        .s3_access_key
        .clone()
        .context("S3_ACCESS_KEY must be set")?;
    let secret_key = config
        .s3_secret_key
        .clone()
        .context("S3_SECRET_KEY must be set")?;
    let public_url = config
        .s3_public_url
        .clone()
        .unwrap_or_else(|| endpoint_url.clone());

    info!("☁️  S3 Storage: {} (public base: {})", endpoint_url, public_url);

    let aws_config = aws_config::from_env()
        .endpoint_url(&endpoint_url)
        .region(Region::new(config.s3_region.clone()))
        .timeout_config(
            TimeoutConfig::builder()
                .operation_timeout(config.upstream_timeout)
                .build(),
        )
        .credentials_provider(aws_sdk_s3::config::Credentials::new(
            access_key, secret_key, None, None, "static",
        ))
        .load()
        .await;

    let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
        .force_path_style(true)
        .build();

    let s3_client = aws_sdk_s3::Client::from_conf(s3_config);

    // Ensure both image buckets exist
    for bucket in [&config.documentation.bucket, &config.vehicle.bucket] {
        match s3_client.head_bucket().bucket(bucket).send().await {
            Ok(_) => info!("✅ Bucket '{}' is ready", bucket),
            Err(_) => {
                info!("🪣 Bucket '{}' not found, creating...", bucket);
                if let Err(e) = s3_client.create_bucket().bucket(bucket).send().await {
                    tracing::error!("❌ Failed to create bucket '{}': {}", bucket, e);
                } else {
                    info!("✅ Bucket '{}' created successfully", bucket);
                }
            }
        }
    }

    Ok(Arc::new(S3Storage::new(s3_client, public_url)))
}
