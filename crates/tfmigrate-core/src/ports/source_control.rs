//! SourceControl port - 設定ファイルの読み書き
//!
//! 書き込みは楽観的並行制御です。`latest_revision` で取った revision を
//! `write_file` に渡し、その間にブランチが進んでいれば `Conflict` になります。

use async_trait::async_trait;

use crate::domain::SourceControlError;

#[async_trait]
pub trait SourceControl: Send + Sync {
    /// Read `path` at `branch` as text.
    async fn read_file(
        &self,
        project: &str,
        repo: &str,
        path: &str,
        branch: &str,
    ) -> Result<String, SourceControlError>;

    /// Id of the most recent commit of the repository.
    async fn latest_revision(&self, project: &str, repo: &str)
    -> Result<String, SourceControlError>;

    /// Commit `content` as the new version of `path` on `branch`.
    #[allow(clippy::too_many_arguments)]
    async fn write_file(
        &self,
        project: &str,
        repo: &str,
        path: &str,
        branch: &str,
        base_revision: &str,
        message: &str,
        content: &str,
    ) -> Result<(), SourceControlError>;
}
