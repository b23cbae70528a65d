//! OrchestratorBuilder - collaborator のワイヤリング
//!
//! # Fail-fast 設計
//! - build() 時に設定値を検証
//! - 必須の collaborator（ObjectStore, WorkspaceApi）が無ければ BuildError
//! - update_backend が有効なのに SourceControl が無ければ BuildError
//!
//! タスクを 1 つも実行する前に、構成の誤りをここで止めます。

use std::sync::Arc;

use super::config::{ConfigError, MigrationConfig};
use super::migrator::Migrator;
use super::orchestrator::Orchestrator;
use crate::ports::{
    Clock, IdGenerator, ObjectStore, SourceControl, SystemClock, UlidGenerator, WorkspaceApi,
};

/// # 使用例
/// ```ignore
/// let orchestrator = OrchestratorBuilder::new(config)
///     .object_store(Arc::new(S3ObjectStore::from_env().await))
///     .workspace_api(Arc::new(TfeClient::new(address, token)))
///     .build()?;
/// ```
pub struct OrchestratorBuilder {
    config: MigrationConfig,
    objects: Option<Arc<dyn ObjectStore>>,
    workspaces: Option<Arc<dyn WorkspaceApi>>,
    source_control: Option<Arc<dyn SourceControl>>,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
}

/// BuildError は構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("missing collaborator: {0}")]
    MissingCollaborator(&'static str),

    #[error("backend update is enabled but no source-control client was configured")]
    SourceControlRequired,
}

impl OrchestratorBuilder {
    pub fn new(config: MigrationConfig) -> Self {
        Self {
            config,
            objects: None,
            workspaces: None,
            source_control: None,
            clock: None,
            ids: None,
        }
    }

    pub fn object_store(mut self, objects: Arc<dyn ObjectStore>) -> Self {
        self.objects = Some(objects);
        self
    }

    pub fn workspace_api(mut self, workspaces: Arc<dyn WorkspaceApi>) -> Self {
        self.workspaces = Some(workspaces);
        self
    }

    pub fn source_control(mut self, source_control: Arc<dyn SourceControl>) -> Self {
        self.source_control = Some(source_control);
        self
    }

    /// Defaults to the system clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Defaults to ULIDs stamped with the system clock.
    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn build(self) -> Result<Orchestrator, BuildError> {
        self.config.validate()?;

        let objects = self
            .objects
            .ok_or(BuildError::MissingCollaborator("object store"))?;
        let workspaces = self
            .workspaces
            .ok_or(BuildError::MissingCollaborator("workspace API"))?;
        if self.config.update_backend && self.source_control.is_none() {
            return Err(BuildError::SourceControlRequired);
        }

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(SystemClock)));

        let config = Arc::new(self.config);
        let migrator = Migrator::new(
            Arc::clone(&config),
            objects,
            workspaces,
            self.source_control,
            Arc::clone(&clock),
        );

        Ok(Orchestrator {
            config,
            migrator: Arc::new(migrator),
            clock,
            ids,
        })
    }
}
