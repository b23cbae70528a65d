//! State - タスクの状態と stage
//!
//! # 状態遷移
//! ```text
//! Pending -> Downloaded -> Validated -> WorkspaceCreated -> Uploaded
//!         -> (BackendUpdated) -> Done
//! 任意の非終端状態 -> Failed
//! ```
//! 後戻りはありません。リトライもしません。

use std::fmt;

use serde::{Deserialize, Serialize};

/// TaskState はタスクの状態を表現
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    Downloaded,
    Validated,
    WorkspaceCreated,
    Uploaded,
    BackendUpdated,
    Done,
    Failed,
}

impl TaskState {
    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Done | TaskState::Failed)
    }

    pub fn can_transition_to(self, next: TaskState) -> bool {
        use TaskState::*;
        match (self, next) {
            (s, Failed) => !s.is_terminal(),
            (Pending, Downloaded)
            | (Downloaded, Validated)
            | (Validated, WorkspaceCreated)
            | (WorkspaceCreated, Uploaded)
            | (Uploaded, BackendUpdated)
            | (Uploaded, Done)
            | (BackendUpdated, Done) => true,
            _ => false,
        }
    }
}

/// One step of the per-task sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Download,
    Validate,
    CreateWorkspace,
    UploadState,
    UpdateBackend,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Download => "download",
            Stage::Validate => "validate",
            Stage::CreateWorkspace => "create_workspace",
            Stage::UploadState => "upload_state",
            Stage::UpdateBackend => "update_backend",
        }
    }

    /// State reached when this stage completes.
    pub fn completes_to(self) -> TaskState {
        match self {
            Stage::Download => TaskState::Downloaded,
            Stage::Validate => TaskState::Validated,
            Stage::CreateWorkspace => TaskState::WorkspaceCreated,
            Stage::UploadState => TaskState::Uploaded,
            Stage::UpdateBackend => TaskState::BackendUpdated,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
