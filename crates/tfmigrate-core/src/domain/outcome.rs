//! Outcome model: what happened to each task, and to the run as a whole.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::MigrationError;
use super::ids::{RunId, TaskId};
use super::state::{Stage, TaskState};

/// Classification of a finished task.
///
/// - `MIGRATED`: every stage succeeded.
/// - `PARTIALLY_MIGRATED`: workspace and state exist, backend rewrite failed.
/// - `FAILED`: the task stopped before the state was uploaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeKind {
    Migrated,
    PartiallyMigrated,
    Failed,
}

/// Result of running one task through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub task_id: TaskId,
    pub seq: usize,
    pub workspace: String,
    pub kind: OutcomeKind,
    pub final_state: TaskState,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<Stage>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Remote id of the created workspace, if creation succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<String>,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        self.kind == OutcomeKind::Migrated
    }

    /// Attach a failure. The kind is derived from how far the task got.
    pub fn with_error(mut self, err: &MigrationError) -> Self {
        self.kind = if err.leaves_partial_migration() {
            OutcomeKind::PartiallyMigrated
        } else {
            OutcomeKind::Failed
        };
        self.final_state = TaskState::Failed;
        self.failed_stage = Some(err.stage());
        self.error = Some(err.to_string());
        self
    }
}

/// Aggregate result of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub organization: String,
    pub total: usize,
    pub migrated: usize,
    pub partially_migrated: usize,
    pub failed: usize,

    /// `true` when the run was interrupted before every task completed.
    #[serde(default)]
    pub cancelled: bool,

    pub outcomes: Vec<TaskOutcome>,
}

impl RunReport {
    pub fn new(run_id: RunId, organization: impl Into<String>, outcomes: Vec<TaskOutcome>) -> Self {
        let count = |kind| outcomes.iter().filter(|o| o.kind == kind).count();
        Self {
            run_id,
            organization: organization.into(),
            total: outcomes.len(),
            migrated: count(OutcomeKind::Migrated),
            partially_migrated: count(OutcomeKind::PartiallyMigrated),
            failed: count(OutcomeKind::Failed),
            cancelled: false,
            outcomes,
        }
    }

    pub fn all_migrated(&self) -> bool {
        self.migrated == self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::{BackendUpdateError, SourceControlError};
    use ulid::Ulid;

    fn outcome(seq: usize) -> TaskOutcome {
        let now = Utc::now();
        TaskOutcome {
            task_id: TaskId::from_ulid(Ulid::new()),
            seq,
            workspace: format!("ws-{seq}"),
            kind: OutcomeKind::Migrated,
            final_state: TaskState::Done,
            failed_stage: None,
            error: None,
            workspace_id: Some("ws-abc".into()),
            started_at: now,
            finished_at: now,
        }
    }

    #[test]
    fn backend_failure_is_a_partial_migration() {
        let err = MigrationError::BackendUpdateFailed {
            config_file: "main.tf".into(),
            source: BackendUpdateError::WriteFailed(SourceControlError::Conflict(
                "branch moved".into(),
            )),
        };
        let o = outcome(0).with_error(&err);
        assert_eq!(o.kind, OutcomeKind::PartiallyMigrated);
        assert_eq!(o.failed_stage, Some(Stage::UpdateBackend));
        assert_eq!(o.final_state, TaskState::Failed);
        assert!(o.error.unwrap().contains("branch moved"));
    }

    #[test]
    fn report_counts_kinds() {
        let err = MigrationError::Cancelled {
            stage: Stage::Download,
        };
        let outcomes = vec![outcome(0), outcome(1).with_error(&err), outcome(2)];
        let report = RunReport::new(RunId::from_ulid(Ulid::new()), "acme", outcomes);
        assert_eq!(report.total, 3);
        assert_eq!(report.migrated, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.partially_migrated, 0);
        assert!(!report.all_migrated());
    }

    #[test]
    fn outcome_kind_serializes_in_screaming_case() {
        let s = serde_json::to_string(&OutcomeKind::PartiallyMigrated).unwrap();
        assert_eq!(s, "\"PARTIALLY_MIGRATED\"");
    }
}
