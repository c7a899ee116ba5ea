//! Template downloads and pass uploads

use anyhow::{Context, Result, anyhow};
use aws_sdk_s3::{Client, primitives::ByteStream};
use reqwest::Client as HttpClient;
use tracing::info;

use crate::batch::{ImageStore, TemplateSource};

/// Reads templates from `http(s)://` URLs or `s3://bucket/key` references
#[derive(Clone)]
pub struct TemplateFetcher {
    http: HttpClient,
    s3_client: Client,
}

impl TemplateFetcher {
    pub fn new(http: HttpClient, s3_client: Client) -> Self {
        Self { http, s3_client }
    }
}

/// Split `s3://bucket/key` into bucket and key
pub fn parse_s3_url(url: &str) -> Option<(&str, &str)> {
    let rest = url.strip_prefix("s3://")?;
    let (bucket, key) = rest.split_once('/')?;
    if bucket.is_empty() || key.is_empty() {
        return None;
    }
    Some((bucket, key))
}

impl TemplateSource for TemplateFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        info!("Fetching pass template: {}", url);

        if url.starts_with("s3://") {
            let (bucket, key) =
                parse_s3_url(url).ok_or_else(|| anyhow!("Invalid S3 template URL: {}", url))?;
            let object = self
                .s3_client
                .get_object()
                .bucket(bucket)
                .key(key)
                .send()
                .await
                .with_context(|| format!("Failed to download template {}", url))?;
            let bytes = object.body.collect().await?.into_bytes();
            return Ok(bytes.to_vec());
        }

        let response = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to download template {}", url))?
            .error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}

/// Uploads rendered passes to a bucket served under `public_url`
#[derive(Clone)]
pub struct S3ImageStore {
    s3_client: Client,
    bucket: String,
    public_url: String,
}

impl S3ImageStore {
    pub fn new(s3_client: Client, bucket: String, public_url: String) -> Self {
        Self {
            s3_client,
            bucket,
            public_url,
        }
    }

    pub fn public_url_for(&self, key: &str) -> String {
        format!("{}/{}", self.public_url.trim_end_matches('/'), key)
    }
}

impl ImageStore for S3ImageStore {
    async fn upload(&self, key: &str, png: Vec<u8>) -> Result<String> {
        info!("Uploading pass to S3: {}", key);

        self.s3_client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(png))
            .content_type("image/png")
            .send()
            .await?;

        Ok(self.public_url_for(key))
    }
}
