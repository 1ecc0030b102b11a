use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

pub mod s3;

/// Remote object store the pipeline reads sources from and publishes into.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Returns a URL that allows an unauthenticated GET of `key` for `ttl`.
    async fn presign_get(&self, key: &str, ttl: Duration) -> Result<String>;

    /// Uploads the local file at `path` to `key`.
    async fn put_file(&self, key: &str, path: &Path, content_type: &str) -> Result<()>;
}
