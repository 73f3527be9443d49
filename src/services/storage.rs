use crate::services::supabase::{SupabaseClient, ensure_success};
use anyhow::Result;
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;

/// Remote object storage the staged images end up in.
///
/// Paths are chosen by the caller; there is no server-side dedup.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn upload(&self, bucket: &str, path: &str, data: Bytes, content_type: &str)
    -> Result<()>;

    /// Public URL of an uploaded object; valid once `upload` succeeded
    fn public_url(&self, bucket: &str, path: &str) -> String;

    /// Human-readable backend name for health output
    fn backend(&self) -> &'static str;
}

/// Supabase Storage over its REST API
pub struct SupabaseStorage {
    client: SupabaseClient,
}

impl SupabaseStorage {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStorage for SupabaseStorage {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<()> {
        let url = self.client.object_url(bucket, path)?;
        let request = self
            .client
            .http()
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("x-upsert", "false")
            .body(data);

        let response = self.client.authorize(request).send().await?;
        ensure_success(response, "Storage upload").await?;
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        self.client.public_object_url(bucket, path)
    }

    fn backend(&self) -> &'static str {
        "supabase"
    }
}

/// Any S3-compatible store (MinIO, R2, AWS)
pub struct S3Storage {
    client: Client,
    public_base_url: String,
}

impl S3Storage {
    pub fn new(client: Client, public_base_url: String) -> Self {
        Self {
            client,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<()> {
        let res = self
            .client
            .put_object()
            .bucket(bucket)
            .key(path)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await;

        if let Err(e) = res {
            tracing::error!(
                "S3 put_object failed: bucket={}, key={}, error={:?}",
                bucket,
                path,
                e
            );
            return Err(e.into());
        }
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/{}/{}", self.public_base_url, bucket, path)
    }

    fn backend(&self) -> &'static str {
        "s3"
    }
}
