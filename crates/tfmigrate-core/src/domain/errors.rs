//! Errors - エラー型と分類
//!
//! - collaborator ごとのエラー（`ObjectStoreError`, `WorkspaceApiError`, `SourceControlError`）
//! - タスク単位の失敗（`MigrationError`）: ワーカーで捕まえてログに出し、バッチは続行
//!
//! 入力リストのエラーは `app::input::InputFormatError` にあり、こちらは run 全体を止めます。

use std::time::Duration;

use thiserror::Error;

use super::metadata::IncompleteMetadata;
use super::state::Stage;
use super::task::StorageLocator;
use crate::backend::NoBlockFound;

/// Failure reported by an object store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ObjectStoreError {
    #[error("object not found")]
    NotFound,

    #[error("{0}")]
    Remote(String),
}

/// Failure reported by the workspace/state-version API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkspaceApiError {
    /// The API answered with an error status; `message` is the remote text.
    #[error("{message} (status {status})")]
    Rejected { status: u16, message: String },

    #[error("request failed: {0}")]
    Transport(String),

    #[error("unexpected response: {0}")]
    Decode(String),
}

/// Failure reported by the source-control API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceControlError {
    #[error("{0} not found")]
    NotFound(String),

    /// The branch moved underneath us (optimistic concurrency failure).
    #[error("write conflict: {0}")]
    Conflict(String),

    #[error("{message} (status {status})")]
    Remote { status: u16, message: String },

    #[error("request failed: {0}")]
    Transport(String),

    #[error("error decoding response: {0}")]
    Decode(String),
}

/// Why the backend-configuration stage failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendUpdateError {
    #[error("task has no source-control coordinates")]
    MissingCoordinates,

    #[error("failed to read file: {0}")]
    ReadFailed(#[source] SourceControlError),

    #[error(transparent)]
    NoBlockFound(#[from] NoBlockFound),

    #[error("failed to look up latest revision: {0}")]
    RevisionLookupFailed(#[source] SourceControlError),

    #[error("failed to write file: {0}")]
    WriteFailed(#[source] SourceControlError),
}

/// A terminal failure of one migration task.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("failed to download state from {locator}: {source}")]
    Download {
        locator: StorageLocator,
        source: ObjectStoreError,
    },

    #[error(transparent)]
    IncompleteStateMetadata(#[from] IncompleteMetadata),

    #[error("failed to create workspace {workspace:?}: {source}")]
    WorkspaceCreationFailed {
        workspace: String,
        source: WorkspaceApiError,
    },

    #[error("failed to upload state to workspace {workspace:?}: {source}")]
    StateUploadFailed {
        workspace: String,
        source: WorkspaceApiError,
    },

    #[error("failed to update backend configuration in {config_file:?}: {source}")]
    BackendUpdateFailed {
        config_file: String,
        source: BackendUpdateError,
    },

    #[error("stage {stage} timed out after {after:?}")]
    StageTimedOut { stage: Stage, after: Duration },

    #[error("cancelled during stage {stage}")]
    Cancelled { stage: Stage },
}

impl MigrationError {
    /// The stage that produced this error.
    pub fn stage(&self) -> Stage {
        match self {
            MigrationError::Download { .. } => Stage::Download,
            MigrationError::IncompleteStateMetadata(_) => Stage::Validate,
            MigrationError::WorkspaceCreationFailed { .. } => Stage::CreateWorkspace,
            MigrationError::StateUploadFailed { .. } => Stage::UploadState,
            MigrationError::BackendUpdateFailed { .. } => Stage::UpdateBackend,
            MigrationError::StageTimedOut { stage, .. } | MigrationError::Cancelled { stage } => {
                *stage
            }
        }
    }

    /// Workspace and state already exist remotely when this error occurs.
    pub fn leaves_partial_migration(&self) -> bool {
        self.stage() == Stage::UpdateBackend
    }
}
