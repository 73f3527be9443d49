use anyhow::{Result, anyhow};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::{RequestBuilder, Response};
use std::time::Duration;
use url::Url;

/// Characters left unescaped inside one object-path segment
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Thin HTTP client for a hosted Supabase project (PostgREST + Storage)
#[derive(Clone)]
pub struct SupabaseClient {
    http: reqwest::Client,
    base: Url,
    service_key: String,
}

impl SupabaseClient {
    /// `timeout` bounds each request, so a stalled upstream fails the call instead of hanging it
    pub fn new(base_url: &str, service_key: &str, timeout: Duration) -> Result<Self> {
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            base,
            service_key: service_key.to_string(),
        })
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// `{base}/rest/v1/{table}`
    pub fn rest_url(&self, table: &str) -> Result<Url> {
        Ok(self.base.join(&format!("rest/v1/{}", table))?)
    }

    /// `{base}/storage/v1/object/{bucket}/{path}`
    pub fn object_url(&self, bucket: &str, path: &str) -> Result<Url> {
        Ok(self
            .base
            .join(&format!("storage/v1/object/{}/{}", encode_segment(bucket), encode_path(path)))?)
    }

    /// `{base}/storage/v1/object/public/{bucket}/{path}`
    pub fn public_object_url(&self, bucket: &str, path: &str) -> String {
        format!(
            "{}storage/v1/object/public/{}/{}",
            self.base,
            encode_segment(bucket),
            encode_path(path)
        )
    }

    /// Service-role credentials; row ownership is enforced by the callers' filters
    pub fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }
}

fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, PATH_SEGMENT).to_string()
}

fn encode_path(path: &str) -> String {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(encode_segment)
        .collect::<Vec<_>>()
        .join("/")
}

/// Turns a non-2xx response into an error carrying the body text
pub async fn ensure_success(response: Response, action: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(anyhow!("{} failed with status {}: {}", action, status, body))
}
