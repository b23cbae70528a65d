//! WorkerPool - 固定数のワーカーで共有キューを処理する
//!
//! # フロー
//! 1. `workers` 本のワーカーを spawn
//! 2. 全タスクを bounded queue に push してから queue を close
//! 3. 各ワーカーは lease → migrate → outcome 送信 を queue が空になるまで繰り返す
//! 4. 全ワーカーの join を待つ（完了バリア）
//!
//! タスク単位の失敗はあっても、プール全体の失敗はありません。

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::migrator::Migrator;
use super::queue::{self, QueueReceiver};
use super::status::RunCounts;
use crate::domain::{MigrationTask, OutcomeKind, TaskId, TaskOutcome, TaskState};
use crate::ports::Clock;

pub struct WorkerPool {
    migrator: Arc<Migrator>,
    clock: Arc<dyn Clock>,
    counts: Arc<RunCounts>,
}

impl WorkerPool {
    pub fn new(migrator: Arc<Migrator>, clock: Arc<dyn Clock>) -> Self {
        Self {
            migrator,
            clock,
            counts: Arc::new(RunCounts::new()),
        }
    }

    pub fn counts(&self) -> &Arc<RunCounts> {
        &self.counts
    }

    /// Process every task and return one outcome per task, in input order.
    ///
    /// Returns only after all workers have exited.
    pub async fn run(
        &self,
        tasks: Vec<MigrationTask>,
        cancel: CancellationToken,
    ) -> Vec<TaskOutcome> {
        let total = tasks.len();
        let config = self.migrator.config();
        let capacity = config.queue_capacity.unwrap_or(total);
        let workers = config.workers.max(1);

        // ワーカーが異常終了した場合に結果を補うための索引
        let index: HashMap<TaskId, (usize, String)> = tasks
            .iter()
            .map(|t| (t.id(), (t.seq(), t.workspace().to_string())))
            .collect();

        let (tx, rx) = queue::bounded(capacity);
        let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel();

        let mut joins: Vec<JoinHandle<()>> = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let worker = Worker {
                id: worker_id,
                queue: rx.clone(),
                migrator: Arc::clone(&self.migrator),
                counts: Arc::clone(&self.counts),
                outcomes: outcome_tx.clone(),
                cancel: cancel.clone(),
                total,
            };
            joins.push(tokio::spawn(worker.run()));
        }
        drop(rx);
        drop(outcome_tx);

        for task in tasks {
            self.counts.task_queued();
            if let Err(closed) = tx.push(task).await {
                tracing::error!(
                    workspace = %closed.0.workspace(),
                    "task queue closed before all tasks were queued"
                );
                break;
            }
        }
        tx.close();

        for (worker_id, join) in joins.into_iter().enumerate() {
            if let Err(e) = join.await {
                tracing::error!(worker_id, error = %e, "worker terminated abnormally");
            }
        }

        let mut outcomes = Vec::with_capacity(total);
        while let Some(outcome) = outcome_rx.recv().await {
            outcomes.push(outcome);
        }

        if outcomes.len() < total {
            let seen: Vec<TaskId> = outcomes.iter().map(|o| o.task_id).collect();
            let now = self.clock.now();
            for (task_id, (seq, workspace)) in index {
                if seen.contains(&task_id) {
                    continue;
                }
                tracing::error!(%workspace, "task produced no outcome");
                self.counts.task_finished(OutcomeKind::Failed);
                outcomes.push(TaskOutcome {
                    task_id,
                    seq,
                    workspace,
                    kind: OutcomeKind::Failed,
                    final_state: TaskState::Failed,
                    failed_stage: None,
                    error: Some("worker terminated before the task completed".to_string()),
                    workspace_id: None,
                    started_at: now,
                    finished_at: now,
                });
            }
        }

        outcomes.sort_by_key(|o| o.seq);
        outcomes
    }
}

struct Worker {
    id: usize,
    queue: QueueReceiver,
    migrator: Arc<Migrator>,
    counts: Arc<RunCounts>,
    outcomes: mpsc::UnboundedSender<TaskOutcome>,
    cancel: CancellationToken,
    total: usize,
}

impl Worker {
    async fn run(self) {
        // 1 タスクずつ最後まで処理してから次を取る
        while let Some(task) = self.queue.lease().await {
            self.counts.task_started();
            let workspace = task.workspace().to_string();

            let outcome = self.migrator.migrate(task, &self.cancel).await;
            let done = self.counts.task_finished(outcome.kind);
            report(self.id, &workspace, &outcome, done, self.total);

            if self.outcomes.send(outcome).is_err() {
                tracing::warn!(worker_id = self.id, "outcome receiver dropped");
            }
        }
        tracing::debug!(worker_id = self.id, "worker exiting, queue drained");
    }
}

/// One log line per task.
fn report(worker_id: usize, workspace: &str, outcome: &TaskOutcome, done: usize, total: usize) {
    let error = outcome.error.as_deref().unwrap_or_default();
    match outcome.kind {
        OutcomeKind::Migrated => tracing::info!(
            worker_id,
            %workspace,
            done,
            total,
            "successfully migrated state"
        ),
        OutcomeKind::PartiallyMigrated => tracing::warn!(
            worker_id,
            %workspace,
            done,
            total,
            error,
            "migrated state but failed to update backend configuration"
        ),
        OutcomeKind::Failed => tracing::error!(
            worker_id,
            %workspace,
            done,
            total,
            stage = ?outcome.failed_stage,
            error,
            "error migrating state"
        ),
    }
}
