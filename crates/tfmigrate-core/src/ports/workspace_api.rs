//! WorkspaceApi port - workspace と state version の作成

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::WorkspaceApiError;

/// A workspace created by [`WorkspaceApi::create_workspace`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceHandle {
    pub id: String,
    pub name: String,
}

/// Everything needed to attach a state to a workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateVersionRequest {
    pub lineage: String,
    pub serial: i64,
    /// Hex encoded MD5 of the raw state bytes.
    pub md5: String,
    /// Base64 (standard alphabet, padded) of the raw state bytes.
    pub state: String,
}

#[async_trait]
pub trait WorkspaceApi: Send + Sync {
    async fn create_workspace(
        &self,
        organization: &str,
        name: &str,
        terraform_version: &str,
    ) -> Result<WorkspaceHandle, WorkspaceApiError>;

    async fn create_state_version(
        &self,
        workspace: &WorkspaceHandle,
        request: &StateVersionRequest,
    ) -> Result<(), WorkspaceApiError>;
}
