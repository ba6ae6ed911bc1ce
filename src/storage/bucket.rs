use anyhow::{Context, Result};
use async_trait::async_trait;
use s3::creds::Credentials;
use s3::region::Region;
use s3::Bucket;
use tracing::debug;

use super::ObjectStore;
use crate::config::Config;

/// S3 client wrapper.
///
/// Works against AWS, MinIO, or any S3-compatible endpoint (including the
/// GCS XML interop API) via `S3_ENDPOINT`.
#[derive(Clone)]
pub struct S3Client {
    bucket: Box<Bucket>,
}

impl S3Client {
    /// Create a new S3 client from configuration.
    ///
    /// Credentials come from `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY`.
    ///
    /// # Errors
    ///
    /// Returns an error if credentials are missing or the bucket handle
    /// cannot be created.
    pub fn new(config: &Config) -> Result<Self> {
        let access_key = std::env::var("AWS_ACCESS_KEY_ID").context("AWS_ACCESS_KEY_ID not set")?;
        let secret_key =
            std::env::var("AWS_SECRET_ACCESS_KEY").context("AWS_SECRET_ACCESS_KEY not set")?;

        let credentials = Credentials::new(Some(&access_key), Some(&secret_key), None, None, None)
            .context("Failed to create S3 credentials")?;

        let region = if let Some(ref endpoint) = config.s3_endpoint {
            Region::Custom {
                region: config.s3_region.clone(),
                endpoint: endpoint.clone(),
            }
        } else {
            config.s3_region.parse().unwrap_or(Region::UsEast1)
        };

        let bucket = Bucket::new(&config.s3_bucket, region, credentials)
            .context("Failed to create S3 bucket")?;

        // Use path-style for custom endpoints (MinIO, GCS interop, etc.)
        let bucket = if config.s3_endpoint.is_some() {
            bucket.with_path_style()
        } else {
            bucket
        };

        Ok(Self { bucket })
    }

    /// Get the bucket name
    #[must_use]
    pub fn bucket_name(&self) -> String {
        self.bucket.name().to_string()
    }
}

#[async_trait]
impl ObjectStore for S3Client {
    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>> {
        debug!(key = %key, "Getting S3 object");

        match self.bucket.get_object(key).await {
            Ok(response) => match response.status_code() {
                200..=299 => Ok(Some(response.to_vec())),
                404 => Ok(None),
                status => Err(anyhow::anyhow!(
                    "S3 get object {key} failed with status {status}"
                )),
            },
            Err(s3::error::S3Error::HttpFailWithBody(404, _)) => Ok(None),
            Err(e) => Err(anyhow::anyhow!("S3 get object failed: {e}")),
        }
    }

    async fn put_object(&self, key: &str, data: &[u8], content_type: &str) -> Result<()> {
        debug!(key = %key, content_type = %content_type, size = data.len(), "Uploading bytes to S3");

        let response = self
            .bucket
            .put_object_with_content_type(key, data, content_type)
            .await
            .context("Failed to upload bytes to S3")?;

        let status = response.status_code();
        if !(200..300).contains(&status) {
            anyhow::bail!("S3 put object {key} failed with status {status}");
        }

        Ok(())
    }
}

impl std::fmt::Debug for S3Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Client")
            .field("bucket", &self.bucket.name())
            .finish()
    }
}
