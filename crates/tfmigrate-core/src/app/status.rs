//! Status - run の進捗カウンタ
//!
//! ワーカーが atomic に更新し、ログの進捗表示（done/total）に使います。

use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};

use crate::domain::OutcomeKind;

/// Live counters shared by all workers of a run.
#[derive(Debug, Default)]
pub struct RunCounts {
    queued: AtomicUsize,
    running: AtomicUsize,
    migrated: AtomicUsize,
    partially_migrated: AtomicUsize,
    failed: AtomicUsize,
    finished: AtomicUsize,
}

/// Point-in-time copy of [`RunCounts`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCountsSnapshot {
    pub queued: usize,
    pub running: usize,
    pub migrated: usize,
    pub partially_migrated: usize,
    pub failed: usize,
}

impl RunCountsSnapshot {
    pub fn finished(&self) -> usize {
        self.migrated + self.partially_migrated + self.failed
    }
}

impl RunCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn task_queued(&self) {
        self.queued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn task_started(&self) {
        // queued は 0 未満にならない（started は必ず queued の後）
        let _ = self
            .queued
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
        self.running.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a finished task. Returns its 1-based position in completion order.
    pub fn task_finished(&self, kind: OutcomeKind) -> usize {
        let _ = self
            .running
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
        let counter = match kind {
            OutcomeKind::Migrated => &self.migrated,
            OutcomeKind::PartiallyMigrated => &self.partially_migrated,
            OutcomeKind::Failed => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        // 並行に終わったタスク同士でも同じ値を返さない
        self.finished.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn snapshot(&self) -> RunCountsSnapshot {
        RunCountsSnapshot {
            queued: self.queued.load(Ordering::Relaxed),
            running: self.running.load(Ordering::Relaxed),
            migrated: self.migrated.load(Ordering::Relaxed),
            partially_migrated: self.partially_migrated.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}
