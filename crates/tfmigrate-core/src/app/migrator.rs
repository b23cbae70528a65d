//! Migrator - 1 タスク分の stage 実行
//!
//! # フロー
//! 1. Download: オブジェクトストレージから state を取得し、メタデータを寛容にパース
//! 2. Validate: lineage と terraform_version が空でないことを確認
//! 3. CreateWorkspace: state の terraform_version で workspace を作成
//! 4. UploadState: MD5 と base64 を付けて state version を作成
//! 5. UpdateBackend（有効時のみ）: 設定ファイルの terraform ブロックを書き換えてコミット
//!
//! どの stage でも失敗したら残りは実行せず `Failed` になります。ロールバックはしません。
//! ネットワーク呼び出しは全てキャンセルトークンと stage deadline に対して競合させます。

use std::future::Future;
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use md5::{Digest, Md5};
use tokio_util::sync::CancellationToken;

use super::config::MigrationConfig;
use crate::backend::{BackendTarget, rewrite_backend};
use crate::domain::{
    BackendUpdateError, MigrationError, MigrationTask, OutcomeKind, Stage, TaskOutcome, TaskState,
    try_parse_metadata, validate_metadata,
};
use crate::ports::{
    Clock, ObjectStore, SourceControl, StateVersionRequest, WorkspaceApi, WorkspaceHandle,
};

/// Runs tasks through the stage sequence against the configured collaborators.
///
/// Shared read-only by every worker.
pub struct Migrator {
    config: Arc<MigrationConfig>,
    objects: Arc<dyn ObjectStore>,
    workspaces: Arc<dyn WorkspaceApi>,
    source_control: Option<Arc<dyn SourceControl>>,
    clock: Arc<dyn Clock>,
}

impl Migrator {
    pub fn new(
        config: Arc<MigrationConfig>,
        objects: Arc<dyn ObjectStore>,
        workspaces: Arc<dyn WorkspaceApi>,
        source_control: Option<Arc<dyn SourceControl>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            objects,
            workspaces,
            source_control,
            clock,
        }
    }

    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// Run every stage of `task` and report how far it got.
    pub async fn migrate(
        &self,
        mut task: MigrationTask,
        cancel: &CancellationToken,
    ) -> TaskOutcome {
        let started_at = self.clock.now();
        let mut workspace = None;

        let result = self.run_stages(&mut task, &mut workspace, cancel).await;
        if result.is_err() {
            task.advance(TaskState::Failed);
        }

        let outcome = TaskOutcome {
            task_id: task.id(),
            seq: task.seq(),
            workspace: task.workspace().to_string(),
            kind: OutcomeKind::Migrated,
            final_state: task.state(),
            failed_stage: None,
            error: None,
            workspace_id: workspace.map(|w: WorkspaceHandle| w.id),
            started_at,
            finished_at: self.clock.now(),
        };

        match result {
            Ok(()) => outcome,
            Err(err) => outcome.with_error(&err),
        }
    }

    async fn run_stages(
        &self,
        task: &mut MigrationTask,
        workspace: &mut Option<WorkspaceHandle>,
        cancel: &CancellationToken,
    ) -> Result<(), MigrationError> {
        self.download(task, cancel).await?;
        self.validate(task)?;

        let created = self.create_workspace(task, cancel).await?;
        let created = workspace.insert(created);

        self.upload_state(task, created, cancel).await?;
        task.release_state();

        if self.config.update_backend {
            self.update_backend(task, cancel).await?;
        }

        self.complete(task, TaskState::Done);
        Ok(())
    }

    async fn download(
        &self,
        task: &mut MigrationTask,
        cancel: &CancellationToken,
    ) -> Result<(), MigrationError> {
        let locator = task.source().clone();
        let bytes = self
            .guarded(Stage::Download, cancel, async {
                self.objects
                    .download(&locator.bucket, &locator.key)
                    .await
                    .map_err(|source| MigrationError::Download {
                        locator: locator.clone(),
                        source,
                    })
            })
            .await?;

        task.meta = try_parse_metadata(&bytes);
        task.raw_state = bytes;
        self.complete(task, Stage::Download.completes_to());
        Ok(())
    }

    fn validate(&self, task: &mut MigrationTask) -> Result<(), MigrationError> {
        validate_metadata(task.meta())?;
        self.complete(task, Stage::Validate.completes_to());
        Ok(())
    }

    async fn create_workspace(
        &self,
        task: &mut MigrationTask,
        cancel: &CancellationToken,
    ) -> Result<WorkspaceHandle, MigrationError> {
        let name = task.workspace().to_string();
        let version = task.meta().terraform_version.clone();
        let handle = self
            .guarded(Stage::CreateWorkspace, cancel, async {
                self.workspaces
                    .create_workspace(&self.config.organization, &name, &version)
                    .await
                    .map_err(|source| MigrationError::WorkspaceCreationFailed {
                        workspace: name.clone(),
                        source,
                    })
            })
            .await?;

        self.complete(task, Stage::CreateWorkspace.completes_to());
        Ok(handle)
    }

    async fn upload_state(
        &self,
        task: &mut MigrationTask,
        workspace: &WorkspaceHandle,
        cancel: &CancellationToken,
    ) -> Result<(), MigrationError> {
        let request = state_version_request(task);
        let name = task.workspace().to_string();
        self.guarded(Stage::UploadState, cancel, async {
            self.workspaces
                .create_state_version(workspace, &request)
                .await
                .map_err(|source| MigrationError::StateUploadFailed {
                    workspace: name.clone(),
                    source,
                })
        })
        .await?;

        self.complete(task, Stage::UploadState.completes_to());
        Ok(())
    }

    async fn update_backend(
        &self,
        task: &mut MigrationTask,
        cancel: &CancellationToken,
    ) -> Result<(), MigrationError> {
        let config_file = task
            .repo()
            .map(|r| r.config_file.clone())
            .unwrap_or_default();
        let failed = |source: BackendUpdateError| MigrationError::BackendUpdateFailed {
            config_file: config_file.clone(),
            source,
        };

        let (Some(repo), Some(scm)) = (task.repo().cloned(), self.source_control.as_ref()) else {
            return Err(failed(BackendUpdateError::MissingCoordinates));
        };

        let target = BackendTarget {
            hostname: self.config.hostname.clone(),
            organization: self.config.organization.clone(),
            workspace: task.workspace().to_string(),
        };

        // read → rewrite → revision → write は 1 つの stage deadline を共有する
        self.guarded(Stage::UpdateBackend, cancel, async {
            let content = scm
                .read_file(&repo.project, &repo.repo, &repo.config_file, &repo.branch)
                .await
                .map_err(|e| failed(BackendUpdateError::ReadFailed(e)))?;

            let updated = rewrite_backend(&content, &target).map_err(|e| failed(e.into()))?;

            let revision = scm
                .latest_revision(&repo.project, &repo.repo)
                .await
                .map_err(|e| failed(BackendUpdateError::RevisionLookupFailed(e)))?;

            scm.write_file(
                &repo.project,
                &repo.repo,
                &repo.config_file,
                &repo.branch,
                &revision,
                &self.config.commit_message,
                &updated,
            )
            .await
            .map_err(|e| failed(BackendUpdateError::WriteFailed(e)))
        })
        .await?;

        self.complete(task, Stage::UpdateBackend.completes_to());
        Ok(())
    }

    fn complete(&self, task: &mut MigrationTask, next: TaskState) {
        let from = task.state();
        if task.advance(next) {
            tracing::debug!(
                task_id = %task.id(),
                workspace = %task.workspace(),
                from = ?from,
                to = ?next,
                "task state advanced"
            );
        } else {
            tracing::warn!(
                task_id = %task.id(),
                from = ?from,
                to = ?next,
                "ignoring invalid task state transition"
            );
        }
    }

    /// Run one collaborator call under the cancellation token and the
    /// configured stage deadline.
    async fn guarded<T, F>(
        &self,
        stage: Stage,
        cancel: &CancellationToken,
        call: F,
    ) -> Result<T, MigrationError>
    where
        F: Future<Output = Result<T, MigrationError>>,
    {
        if cancel.is_cancelled() {
            return Err(MigrationError::Cancelled { stage });
        }

        let timeout = self.config.stage_timeout;
        let bounded = async move {
            match timeout {
                Some(after) => match tokio::time::timeout(after, call).await {
                    Ok(result) => result,
                    Err(_) => Err(MigrationError::StageTimedOut { stage, after }),
                },
                None => call.await,
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(MigrationError::Cancelled { stage }),
            result = bounded => result,
        }
    }
}

/// Checksum and encode the raw state for upload.
pub fn state_version_request(task: &MigrationTask) -> StateVersionRequest {
    let raw = task.raw_state();
    StateVersionRequest {
        lineage: task.meta().lineage.clone(),
        serial: task.meta().serial,
        md5: format!("{:x}", Md5::digest(raw)),
        state: BASE64.encode(raw),
    }
}
