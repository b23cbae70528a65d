//! App - アプリケーション層
//!
//! ports を組み合わせて移行の流れを実装します。
//!
//! # 主要コンポーネント
//! - **OrchestratorBuilder**: collaborator のワイヤリングと起動時検証
//! - **Orchestrator**: 入力リスト → タスク → WorkerPool → RunReport
//! - **WorkerPool**: 固定数ワーカーと完了バリア
//! - **Migrator**: 1 タスク分の stage 実行
//! - **TaskQueue**: bounded MPMC キュー
//! - **RunCounts**: 進捗カウンタ

pub mod builder;
pub mod config;
pub mod input;
pub mod migrator;
pub mod orchestrator;
pub mod queue;
pub mod status;
pub mod worker_loop;

pub use self::builder::{BuildError, OrchestratorBuilder};
pub use self::config::{ConfigError, MigrationConfig};
pub use self::input::{InputFormatError, RecordLayout};
pub use self::migrator::Migrator;
pub use self::orchestrator::Orchestrator;
pub use self::status::{RunCounts, RunCountsSnapshot};
pub use self::worker_loop::WorkerPool;
