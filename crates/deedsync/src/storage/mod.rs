//! S3-compatible object storage

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::{
    config::{Credentials, Region},
    primitives::ByteStream,
    Client,
};
use std::path::Path;
use tracing::{debug, info, instrument};

pub mod config;

/// Write primitive the upload job needs from a remote object store.
///
/// A put is atomic per object: it either lands completely under `key` or
/// returns an error.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    fn bucket(&self) -> &str;

    async fn put_file(&self, key: &str, path: &Path) -> Result<()>;
}

#[derive(Clone)]
pub struct Storage {
    client: Client,
    bucket: String,
}

impl Storage {
    pub async fn new(config: config::StorageConfig) -> Result<Self> {
        debug!(
            bucket = %config.bucket,
            region = %config.region,
            endpoint = ?config.endpoint,
            "Initializing storage"
        );

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        if let Some((access_key, secret_key)) = config.static_credentials() {
            loader = loader.credentials_provider(Credentials::new(
                access_key,
                secret_key,
                None,
                None,
                "deedsync-storage",
            ));
        }

        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }

        let shared = loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(config.path_style)
            .build();

        info!(bucket = %config.bucket, "Storage client initialized");

        Ok(Self {
            client: Client::from_conf(s3_config),
            bucket: config.bucket,
        })
    }
}

#[async_trait]
impl ObjectStore for Storage {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn put_file(&self, key: &str, path: &Path) -> Result<()> {
        let body = ByteStream::from_path(path)
            .await
            .with_context(|| format!("Failed to open {}", path.display()))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .with_context(|| format!("Failed to upload to s3://{}/{}", self.bucket, key))?;

        debug!("Uploaded {} to s3://{}/{}", path.display(), self.bucket, key);
        Ok(())
    }
}
