//! Ports - 抽象化レイヤー
//!
//! 外部システム（オブジェクトストレージ、TFE の workspace/state API、
//! ソース管理）へのインターフェースを trait として定義します。
//! 本番実装は `impls` の S3 / TFE / Bitbucket クライアント、
//! テストでは `impls::inmem` の in-memory 実装に差し替えます。
//!
//! 全ての trait は `Send + Sync` で、ワーカー間で `Arc<dyn _>` として共有されます。

pub mod clock;
pub mod id_generator;
pub mod object_store;
pub mod source_control;
pub mod workspace_api;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::object_store::ObjectStore;
pub use self::source_control::SourceControl;
pub use self::workspace_api::{StateVersionRequest, WorkspaceApi, WorkspaceHandle};
