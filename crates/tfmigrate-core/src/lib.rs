//! tfmigrate-core
//!
//! Terraform の state ファイルをオブジェクトストレージから Terraform Enterprise の
//! workspace へ一括移行するためのコア部品です。
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, task, metadata, state, errors, outcome）
//! - **backend**: 設定ファイル中の `terraform { ... }` ブロックの検出と置換
//! - **ports**: 抽象化レイヤー（ObjectStore, WorkspaceApi, SourceControl, Clock, IdGenerator）
//! - **app**: アプリケーションロジック（builder, orchestrator, worker_loop, migrator, queue）
//! - **impls**: 実装（S3, TFE API, Bitbucket Server, in-memory）

pub mod app;
pub mod backend;
pub mod domain;
pub mod impls;
pub mod ports;
