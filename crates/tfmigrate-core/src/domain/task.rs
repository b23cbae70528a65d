//! MigrationTask - 1 レコード分の移行単位
//!
//! 入力の 1 行から作られ、ちょうど 1 つのワーカーに所有されて処理されます。
//! 識別子フィールドは生成後に変更されず、ダウンロードした state と
//! パース済みメタデータだけが stage の進行に合わせて埋まっていきます。

use std::fmt;

use serde::{Deserialize, Serialize};

use super::ids::TaskId;
use super::metadata::StateMeta;
use super::state::TaskState;

/// Where the source state blob lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageLocator {
    pub bucket: String,
    pub key: String,
}

impl fmt::Display for StorageLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

/// Source-control coordinates of the configuration file to rewrite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoCoordinates {
    pub project: String,
    pub repo: String,
    pub branch: String,
    pub config_file: String,
}

/// A single migration task.
///
/// # 所有権
/// - `state` (raw bytes) はアップロードが終わるまでこのタスクだけが持つ
/// - タスク自体は `TaskQueue` から取り出したワーカーが move で受け取る
#[derive(Debug, Clone)]
pub struct MigrationTask {
    id: TaskId,
    seq: usize,
    source: StorageLocator,
    workspace: String,
    repo: Option<RepoCoordinates>,

    pub(crate) state: TaskState,
    pub(crate) raw_state: Vec<u8>,
    pub(crate) meta: StateMeta,
}

impl MigrationTask {
    pub fn new(
        id: TaskId,
        seq: usize,
        source: StorageLocator,
        workspace: impl Into<String>,
        repo: Option<RepoCoordinates>,
    ) -> Self {
        Self {
            id,
            seq,
            source,
            workspace: workspace.into(),
            repo,
            state: TaskState::Pending,
            raw_state: Vec::new(),
            meta: StateMeta::default(),
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Position of the originating record in the input list (0-based).
    pub fn seq(&self) -> usize {
        self.seq
    }

    pub fn source(&self) -> &StorageLocator {
        &self.source
    }

    /// Name of the workspace this state is migrated into.
    pub fn workspace(&self) -> &str {
        &self.workspace
    }

    /// `None` when the run does not rewrite backend configuration.
    pub fn repo(&self) -> Option<&RepoCoordinates> {
        self.repo.as_ref()
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn meta(&self) -> &StateMeta {
        &self.meta
    }

    pub fn raw_state(&self) -> &[u8] {
        &self.raw_state
    }

    /// Advance the state machine. Transitions that skip or revisit a state are
    /// a programming error and are rejected.
    pub(crate) fn advance(&mut self, next: TaskState) -> bool {
        if self.state.can_transition_to(next) {
            self.state = next;
            true
        } else {
            false
        }
    }

    /// Release the state bytes once they are no longer needed.
    pub(crate) fn release_state(&mut self) {
        self.raw_state = Vec::new();
    }
}
