//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **S3ObjectStore**: state ファイルの取得元
//! - **TfeClient**: workspace と state version の作成先
//! - **BitbucketClient**: backend 設定ファイルの読み書き
//! - **inmem**: 3 つの port の in-memory 実装（テスト用）

pub mod bitbucket;
pub mod inmem;
pub mod s3;
pub mod tfe;

pub use self::bitbucket::BitbucketClient;
pub use self::inmem::{InMemoryObjectStore, InMemorySourceControl, InMemoryWorkspaceApi};
pub use self::s3::S3ObjectStore;
pub use self::tfe::TfeClient;
