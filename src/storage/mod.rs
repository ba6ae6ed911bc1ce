//! Object storage for post batches and analysis output.

mod bucket;
mod memory;

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

pub use bucket::S3Client;
pub use memory::MemoryStore;

/// Minimal object store used by the pipeline.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch an object's bytes, or `None` if the key does not exist.
    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Write an object, replacing any existing value.
    async fn put_object(&self, key: &str, data: &[u8], content_type: &str) -> Result<()>;
}

/// Download `key` and decode it as JSON, bounded by `timeout`.
///
/// # Errors
///
/// Returns an error if the object is missing, the request fails or times
/// out, or the body is not valid JSON for `T`.
pub async fn fetch_json<T: DeserializeOwned>(
    store: &dyn ObjectStore,
    key: &str,
    timeout: Duration,
) -> Result<T> {
    let bytes = tokio::time::timeout(timeout, store.get_object(key))
        .await
        .with_context(|| format!("Timed out reading {key} after {timeout:?}"))??
        .with_context(|| format!("Object {key} not found"))?;

    debug!(key = %key, size = bytes.len(), "Fetched object");

    serde_json::from_slice(&bytes).with_context(|| format!("Failed to parse JSON from {key}"))
}

/// Encode `value` as JSON and upload it to `key`, bounded by `timeout`.
///
/// # Errors
///
/// Returns an error if encoding fails, or the upload fails or times out.
pub async fn save_json<T: Serialize + ?Sized>(
    store: &dyn ObjectStore,
    key: &str,
    value: &T,
    timeout: Duration,
) -> Result<()> {
    let body = serde_json::to_vec(value).context("Failed to encode JSON")?;

    tokio::time::timeout(timeout, store.put_object(key, &body, "application/json"))
        .await
        .with_context(|| format!("Timed out writing {key} after {timeout:?}"))??;

    debug!(key = %key, size = body.len(), "Saved object");
    Ok(())
}
