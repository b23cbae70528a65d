//! ObjectStore port - state blob の取得

use async_trait::async_trait;

use crate::domain::ObjectStoreError;

/// Downloads objects into memory.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch the whole object at `bucket`/`key`.
    async fn download(&self, bucket: &str, key: &str) -> Result<Vec<u8>, ObjectStoreError>;
}
