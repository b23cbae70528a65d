//! Orchestrator - 入力リスト → タスク → WorkerPool → RunReport
//!
//! 入力の読み込みに失敗した場合はタスクを 1 つも実行せずにエラーを返します。
//! タスク単位の失敗は `RunReport` に集計され、run 自体は成功扱いです。

use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::config::MigrationConfig;
use super::input::{self, InputFormatError};
use super::migrator::Migrator;
use super::worker_loop::WorkerPool;
use crate::domain::{MigrationTask, RunReport};
use crate::ports::{Clock, IdGenerator};

/// Drives one batch from input list to report. Built by
/// [`OrchestratorBuilder`](super::builder::OrchestratorBuilder).
pub struct Orchestrator {
    pub(crate) config: Arc<MigrationConfig>,
    pub(crate) migrator: Arc<Migrator>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) ids: Arc<dyn IdGenerator>,
}

impl Orchestrator {
    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// Read the input list at `path` and migrate every entry.
    pub async fn run_file(
        &self,
        path: &Path,
        cancel: CancellationToken,
    ) -> Result<RunReport, InputFormatError> {
        let tasks =
            input::read_tasks_from_path(path, self.config.record_layout(), self.ids.as_ref())?;
        tracing::info!(input = %path.display(), tasks = tasks.len(), "loaded input list");
        Ok(self.run(tasks, cancel).await)
    }

    pub async fn run_reader<R: Read>(
        &self,
        reader: R,
        cancel: CancellationToken,
    ) -> Result<RunReport, InputFormatError> {
        let tasks = input::parse_tasks(reader, self.config.record_layout(), self.ids.as_ref())?;
        Ok(self.run(tasks, cancel).await)
    }

    /// Migrate `tasks` and wait for all of them to finish.
    pub async fn run(&self, tasks: Vec<MigrationTask>, cancel: CancellationToken) -> RunReport {
        let run_id = self.ids.generate_run_id();
        tracing::info!(
            %run_id,
            organization = %self.config.organization,
            tasks = tasks.len(),
            workers = self.config.workers,
            update_backend = self.config.update_backend,
            "migrating states"
        );

        let pool = WorkerPool::new(Arc::clone(&self.migrator), Arc::clone(&self.clock));
        let outcomes = pool.run(tasks, cancel.clone()).await;

        let mut report = RunReport::new(run_id, self.config.organization.clone(), outcomes);
        report.cancelled = cancel.is_cancelled();

        tracing::info!(
            %run_id,
            total = report.total,
            migrated = report.migrated,
            partially_migrated = report.partially_migrated,
            failed = report.failed,
            cancelled = report.cancelled,
            "finished migrating states"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::builder::OrchestratorBuilder;
    use crate::domain::{OutcomeKind, Stage};
    use crate::impls::inmem::{InMemoryObjectStore, InMemorySourceControl, InMemoryWorkspaceApi};
    use std::io::Cursor;

    const STATE: &str = r#"{"terraform_version":"0.13.5","serial":3,"lineage":"lin"}"#;

    fn store() -> Arc<InMemoryObjectStore> {
        let objects = Arc::new(InMemoryObjectStore::new());
        objects.put("b", "a.tfstate", STATE);
        objects.put("b", "c.tfstate", STATE);
        objects
    }

    #[tokio::test]
    async fn three_field_list_runs_every_entry_in_order() {
        let workspaces = Arc::new(InMemoryWorkspaceApi::new());
        let orchestrator = OrchestratorBuilder::new(MigrationConfig::new("acme").with_workers(2))
            .object_store(store())
            .workspace_api(workspaces.clone())
            .build()
            .unwrap();

        let input = "b,a.tfstate,alpha\nb,missing.tfstate,beta\nb,c.tfstate,gamma\n";
        let report = orchestrator
            .run_reader(Cursor::new(input), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.organization, "acme");
        assert_eq!(report.total, 3);
        assert_eq!(report.migrated, 2);
        assert_eq!(report.failed, 1);
        assert!(!report.cancelled);
        assert!(!report.all_migrated());

        let names: Vec<&str> = report.outcomes.iter().map(|o| o.workspace.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta", "gamma"]);
        assert_eq!(report.outcomes[1].failed_stage, Some(Stage::Download));
        assert_eq!(workspaces.workspaces().len(), 2);
    }

    #[tokio::test]
    async fn malformed_input_runs_nothing() {
        let objects = store();
        let orchestrator = OrchestratorBuilder::new(MigrationConfig::new("acme"))
            .object_store(objects.clone())
            .workspace_api(Arc::new(InMemoryWorkspaceApi::new()))
            .build()
            .unwrap();

        let input = "b,a.tfstate,alpha\nb,c.tfstate\n";
        let err = orchestrator
            .run_reader(Cursor::new(input), CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, InputFormatError::FieldCount { line: 2, .. }));
        assert_eq!(objects.downloads(), 0);
    }

    #[tokio::test]
    async fn seven_field_list_updates_backends() {
        let scm = Arc::new(InMemorySourceControl::new());
        scm.put_file("OPS", "net", "main", "main.tf", "terraform {\n}\n");
        let orchestrator = OrchestratorBuilder::new(
            MigrationConfig::new("acme").with_backend_update(true),
        )
        .object_store(store())
        .workspace_api(Arc::new(InMemoryWorkspaceApi::new()))
        .source_control(scm.clone())
        .build()
        .unwrap();

        let input = "b,a.tfstate,OPS,net,main,main.tf,alpha\n";
        let report = orchestrator
            .run_reader(Cursor::new(input), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.outcomes[0].kind, OutcomeKind::Migrated);
        let content = scm.file("OPS", "net", "main", "main.tf").unwrap();
        assert!(content.contains("backend \"remote\""));
        assert!(content.contains("name = \"alpha\""));
    }

    #[tokio::test]
    async fn cancelled_run_is_flagged_in_the_report() {
        let orchestrator = OrchestratorBuilder::new(MigrationConfig::new("acme"))
            .object_store(store())
            .workspace_api(Arc::new(InMemoryWorkspaceApi::new()))
            .build()
            .unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = orchestrator
            .run_reader(Cursor::new("b,a.tfstate,alpha\n"), cancel)
            .await
            .unwrap();
        assert!(report.cancelled);
        assert_eq!(report.failed, 1);
    }

    #[tokio::test]
    async fn report_serializes_to_json() {
        let orchestrator = OrchestratorBuilder::new(MigrationConfig::new("acme"))
            .object_store(store())
            .workspace_api(Arc::new(InMemoryWorkspaceApi::new()))
            .build()
            .unwrap();
        let report = orchestrator
            .run_reader(Cursor::new("b,a.tfstate,alpha\n"), CancellationToken::new())
            .await
            .unwrap();

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["migrated"], 1);
        assert_eq!(json["outcomes"][0]["kind"], "MIGRATED");
        assert_eq!(json["outcomes"][0]["workspace"], "alpha");
    }
}
