//! TaskQueue - bounded multi-producer / multi-consumer queue.
//!
//! # 実装詳細
//! - tokio の bounded `mpsc` を使う
//! - consumer 側は `Arc<Mutex<Receiver>>` で共有し、複数ワーカーから lease できる
//! - 全ての `QueueSender` が drop されると、残りを取り切った後に `lease()` が `None` を返す

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};

use crate::domain::MigrationTask;

/// Returned by [`QueueSender::push`] when every consumer is gone.
#[derive(Debug, thiserror::Error)]
#[error("task queue is closed")]
pub struct QueueClosed(pub MigrationTask);

/// Create a queue that holds at most `capacity` tasks (minimum 1).
pub fn bounded(capacity: usize) -> (QueueSender, QueueReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        QueueSender { tx },
        QueueReceiver {
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}

#[derive(Debug, Clone)]
pub struct QueueSender {
    tx: mpsc::Sender<MigrationTask>,
}

impl QueueSender {
    /// Enqueue a task, waiting while the queue is full.
    pub async fn push(&self, task: MigrationTask) -> Result<(), QueueClosed> {
        self.tx.send(task).await.map_err(|e| QueueClosed(e.0))
    }

    /// Signal that no more tasks will be pushed through this sender.
    pub fn close(self) {
        drop(self);
    }
}

#[derive(Debug, Clone)]
pub struct QueueReceiver {
    rx: Arc<Mutex<mpsc::Receiver<MigrationTask>>>,
}

impl QueueReceiver {
    /// Take the next task. Waits until one is available; returns `None` once
    /// the queue is closed and drained.
    pub async fn lease(&self) -> Option<MigrationTask> {
        // ロックは recv の間だけ。他のワーカーは lock 待ちになる
        let mut rx = self.rx.lock().await;
        rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{StorageLocator, TaskId};
    use std::time::Duration;
    use ulid::Ulid;

    fn task(seq: usize) -> MigrationTask {
        MigrationTask::new(
            TaskId::from_ulid(Ulid::new()),
            seq,
            StorageLocator {
                bucket: "b".into(),
                key: format!("k{seq}"),
            },
            format!("ws-{seq}"),
            None,
        )
    }

    #[tokio::test]
    async fn tasks_come_out_in_fifo_order_then_none_after_close() {
        let (tx, rx) = bounded(4);
        for seq in 0..3 {
            tx.push(task(seq)).await.unwrap();
        }
        tx.close();

        let mut seen = Vec::new();
        while let Some(t) = rx.lease().await {
            seen.push(t.seq());
        }
        assert_eq!(seen, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn push_waits_while_full() {
        let (tx, rx) = bounded(1);
        tx.push(task(0)).await.unwrap();

        let blocked = tokio::time::timeout(Duration::from_millis(50), tx.push(task(1))).await;
        assert!(blocked.is_err(), "second push should wait for capacity");

        assert_eq!(rx.lease().await.unwrap().seq(), 0);
        tx.push(task(2)).await.unwrap();
        assert_eq!(rx.lease().await.unwrap().seq(), 2);
    }

    #[tokio::test]
    async fn consumers_share_one_queue() {
        let (tx, rx) = bounded(8);
        for seq in 0..8 {
            tx.push(task(seq)).await.unwrap();
        }
        tx.close();

        let a = tokio::spawn({
            let rx = rx.clone();
            async move {
                let mut n = Vec::new();
                while let Some(t) = rx.lease().await {
                    n.push(t.seq());
                    tokio::task::yield_now().await;
                }
                n
            }
        });
        let b = tokio::spawn(async move {
            let mut n = Vec::new();
            while let Some(t) = rx.lease().await {
                n.push(t.seq());
                tokio::task::yield_now().await;
            }
            n
        });

        let mut all = a.await.unwrap();
        all.extend(b.await.unwrap());
        all.sort();
        assert_eq!(all, (0..8).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn push_fails_when_all_consumers_are_gone() {
        let (tx, rx) = bounded(2);
        drop(rx);
        let err = tx.push(task(7)).await.unwrap_err();
        assert_eq!(err.0.seq(), 7);
    }
}
