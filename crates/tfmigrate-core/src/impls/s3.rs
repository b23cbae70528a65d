//! S3ObjectStore - aws-sdk-s3 による ObjectStore 実装
//!
//! 認証情報とリージョンは AWS の標準チェーン（環境変数、プロファイル）から読みます。

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::DisplayErrorContext;

use crate::domain::ObjectStoreError;
use crate::ports::ObjectStore;

#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from the standard AWS environment.
    pub async fn from_env() -> Self {
        let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        Self::new(Client::new(&config))
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn download(&self, bucket: &str, key: &str) -> Result<Vec<u8>, ObjectStoreError> {
        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    ObjectStoreError::NotFound
                } else {
                    ObjectStoreError::Remote(DisplayErrorContext(&e).to_string())
                }
            })?;

        let body = response
            .body
            .collect()
            .await
            .map_err(|e| ObjectStoreError::Remote(format!("failed to read object body: {e}")))?;

        let bytes = body.into_bytes().to_vec();
        tracing::debug!(bucket, key, size = bytes.len(), "downloaded state object");
        Ok(bytes)
    }
}
