//! MigrationConfig - 1 回の run の設定
//!
//! 起動時に 1 度だけ作り、`Arc` で全ワーカーから読み取り専用で共有します。

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::input::RecordLayout;

/// Number of concurrent workers when none is configured.
pub const DEFAULT_WORKERS: usize = 10;

/// Backend hostname used when no custom API address is configured.
pub const DEFAULT_HOSTNAME: &str = "app.terraform.io";

pub const DEFAULT_COMMIT_MESSAGE: &str = "Backend configuration updated by migration tool";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Organization that receives the new workspaces.
    pub organization: String,

    /// Hostname written into rewritten backend blocks.
    pub hostname: String,

    pub workers: usize,

    /// Queue bound. `None` sizes the queue to the whole batch.
    pub queue_capacity: Option<usize>,

    /// Deadline for each network-bound stage.
    pub stage_timeout: Option<Duration>,

    /// Rewrite the backend block in source control after uploading.
    pub update_backend: bool,

    pub commit_message: String,
}

/// ConfigError は設定値の検証エラー
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("organization must not be empty")]
    EmptyOrganization,

    #[error("hostname must not be empty")]
    EmptyHostname,

    #[error("worker count must be at least 1")]
    NoWorkers,

    #[error("queue capacity must be at least 1")]
    ZeroQueueCapacity,
}

impl MigrationConfig {
    pub fn new(organization: impl Into<String>) -> Self {
        Self {
            organization: organization.into(),
            hostname: DEFAULT_HOSTNAME.to_string(),
            workers: DEFAULT_WORKERS,
            queue_capacity: None,
            stage_timeout: None,
            update_backend: false,
            commit_message: DEFAULT_COMMIT_MESSAGE.to_string(),
        }
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = Some(timeout);
        self
    }

    pub fn with_backend_update(mut self, enabled: bool) -> Self {
        self.update_backend = enabled;
        self
    }

    pub fn with_commit_message(mut self, message: impl Into<String>) -> Self {
        self.commit_message = message.into();
        self
    }

    /// Which input record layout this configuration expects.
    pub fn record_layout(&self) -> RecordLayout {
        if self.update_backend {
            RecordLayout::WithBackend
        } else {
            RecordLayout::StateOnly
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.organization.trim().is_empty() {
            return Err(ConfigError::EmptyOrganization);
        }
        if self.hostname.trim().is_empty() {
            return Err(ConfigError::EmptyHostname);
        }
        if self.workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if self.queue_capacity == Some(0) {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        Ok(())
    }
}
