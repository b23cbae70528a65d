//! In-memory collaborators - 開発・テスト用
//!
//! 3 つの port の in-memory 実装です。失敗注入（ダウンロード失敗、名前の衝突、
//! アップロード拒否、書き込み競合）と呼び出し記録ができます。

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{ObjectStoreError, SourceControlError, WorkspaceApiError};
use crate::ports::{
    ObjectStore, SourceControl, StateVersionRequest, WorkspaceApi, WorkspaceHandle,
};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ========================================
// ObjectStore
// ========================================

#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: Mutex<HashMap<(String, String), Vec<u8>>>,
    failures: Mutex<HashMap<(String, String), String>>,
    delay: Mutex<Option<Duration>>,
    downloads: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, bucket: &str, key: &str, bytes: impl AsRef<[u8]>) {
        lock(&self.objects).insert(
            (bucket.to_string(), key.to_string()),
            bytes.as_ref().to_vec(),
        );
    }

    /// Make downloads of `bucket`/`key` fail with `message`.
    pub fn fail(&self, bucket: &str, key: &str, message: &str) {
        lock(&self.failures).insert((bucket.to_string(), key.to_string()), message.to_string());
    }

    /// Hold every download for `delay` before answering.
    pub fn delay_downloads(&self, delay: Duration) {
        *lock(&self.delay) = Some(delay);
    }

    /// Number of download calls made so far.
    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    /// Highest number of downloads that were in progress at the same time.
    pub fn max_concurrent_downloads(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn download(&self, bucket: &str, key: &str) -> Result<Vec<u8>, ObjectStoreError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = *lock(&self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let id = (bucket.to_string(), key.to_string());
        if let Some(message) = lock(&self.failures).get(&id) {
            return Err(ObjectStoreError::Remote(message.clone()));
        }
        lock(&self.objects)
            .get(&id)
            .cloned()
            .ok_or(ObjectStoreError::NotFound)
    }
}

// ========================================
// WorkspaceApi
// ========================================

/// A workspace recorded by [`InMemoryWorkspaceApi`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedWorkspace {
    pub id: String,
    pub organization: String,
    pub name: String,
    pub terraform_version: String,
}

#[derive(Default)]
pub struct InMemoryWorkspaceApi {
    workspaces: Mutex<Vec<CreatedWorkspace>>,
    state_versions: Mutex<Vec<(WorkspaceHandle, StateVersionRequest)>>,
    rejected_names: Mutex<HashMap<String, String>>,
    rejected_uploads: Mutex<HashMap<String, String>>,
    create_delay: Mutex<Option<Duration>>,
}

impl InMemoryWorkspaceApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject creation of workspace `name` with `message`.
    pub fn reject_name(&self, name: &str, message: &str) {
        lock(&self.rejected_names).insert(name.to_string(), message.to_string());
    }

    /// Reject state uploads into workspace `name` with `message`.
    pub fn reject_uploads_for(&self, name: &str, message: &str) {
        lock(&self.rejected_uploads).insert(name.to_string(), message.to_string());
    }

    pub fn delay_creates(&self, delay: Duration) {
        *lock(&self.create_delay) = Some(delay);
    }

    pub fn workspaces(&self) -> Vec<CreatedWorkspace> {
        lock(&self.workspaces).clone()
    }

    pub fn state_versions(&self) -> Vec<(WorkspaceHandle, StateVersionRequest)> {
        lock(&self.state_versions).clone()
    }
}

#[async_trait]
impl WorkspaceApi for InMemoryWorkspaceApi {
    async fn create_workspace(
        &self,
        organization: &str,
        name: &str,
        terraform_version: &str,
    ) -> Result<WorkspaceHandle, WorkspaceApiError> {
        let delay = *lock(&self.create_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(message) = lock(&self.rejected_names).get(name) {
            return Err(WorkspaceApiError::Rejected {
                status: 422,
                message: message.clone(),
            });
        }

        let mut workspaces = lock(&self.workspaces);
        if workspaces
            .iter()
            .any(|w| w.organization == organization && w.name == name)
        {
            return Err(WorkspaceApiError::Rejected {
                status: 422,
                message: "Name has already been taken".to_string(),
            });
        }

        let id = format!("ws-{}", workspaces.len() + 1);
        workspaces.push(CreatedWorkspace {
            id: id.clone(),
            organization: organization.to_string(),
            name: name.to_string(),
            terraform_version: terraform_version.to_string(),
        });
        Ok(WorkspaceHandle {
            id,
            name: name.to_string(),
        })
    }

    async fn create_state_version(
        &self,
        workspace: &WorkspaceHandle,
        request: &StateVersionRequest,
    ) -> Result<(), WorkspaceApiError> {
        if let Some(message) = lock(&self.rejected_uploads).get(&workspace.name) {
            return Err(WorkspaceApiError::Rejected {
                status: 422,
                message: message.clone(),
            });
        }
        lock(&self.state_versions).push((workspace.clone(), request.clone()));
        Ok(())
    }
}

// ========================================
// SourceControl
// ========================================

/// A commit recorded by [`InMemorySourceControl`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCommit {
    pub project: String,
    pub repo: String,
    pub path: String,
    pub branch: String,
    pub base_revision: String,
    pub message: String,
    pub content: String,
}

#[derive(Default)]
struct Repository {
    /// (branch, path) -> content
    files: HashMap<(String, String), String>,
    revision: u64,
}

#[derive(Default)]
pub struct InMemorySourceControl {
    repos: Mutex<HashMap<(String, String), Repository>>,
    conflicting_paths: Mutex<HashSet<String>>,
    commits: Mutex<Vec<RecordedCommit>>,
    call_delay: Mutex<Option<Duration>>,
}

impl InMemorySourceControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_file(&self, project: &str, repo: &str, branch: &str, path: &str, content: &str) {
        let mut repos = lock(&self.repos);
        let repository = repos
            .entry((project.to_string(), repo.to_string()))
            .or_default();
        repository
            .files
            .insert((branch.to_string(), path.to_string()), content.to_string());
        repository.revision += 1;
    }

    /// Make every write to `path` fail as if the branch had moved.
    pub fn conflict_on_write(&self, path: &str) {
        lock(&self.conflicting_paths).insert(path.to_string());
    }

    /// Hold every API call for `delay` before answering.
    pub fn delay_calls(&self, delay: Duration) {
        *lock(&self.call_delay) = Some(delay);
    }

    async fn pause(&self) {
        let delay = *lock(&self.call_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    pub fn file(&self, project: &str, repo: &str, branch: &str, path: &str) -> Option<String> {
        lock(&self.repos)
            .get(&(project.to_string(), repo.to_string()))
            .and_then(|r| r.files.get(&(branch.to_string(), path.to_string())).cloned())
    }

    pub fn commits(&self) -> Vec<RecordedCommit> {
        lock(&self.commits).clone()
    }
}

fn revision_id(n: u64) -> String {
    format!("{n:040x}")
}

#[async_trait]
impl SourceControl for InMemorySourceControl {
    async fn read_file(
        &self,
        project: &str,
        repo: &str,
        path: &str,
        branch: &str,
    ) -> Result<String, SourceControlError> {
        self.pause().await;
        self.file(project, repo, branch, path)
            .ok_or_else(|| SourceControlError::NotFound(path.to_string()))
    }

    async fn latest_revision(
        &self,
        project: &str,
        repo: &str,
    ) -> Result<String, SourceControlError> {
        self.pause().await;
        lock(&self.repos)
            .get(&(project.to_string(), repo.to_string()))
            .map(|r| revision_id(r.revision))
            .ok_or_else(|| SourceControlError::NotFound(format!("{project}/{repo}")))
    }

    async fn write_file(
        &self,
        project: &str,
        repo: &str,
        path: &str,
        branch: &str,
        base_revision: &str,
        message: &str,
        content: &str,
    ) -> Result<(), SourceControlError> {
        self.pause().await;
        if lock(&self.conflicting_paths).contains(path) {
            return Err(SourceControlError::Conflict(format!(
                "{path} was changed on {branch} since {base_revision}"
            )));
        }

        let mut repos = lock(&self.repos);
        let repository = repos
            .get_mut(&(project.to_string(), repo.to_string()))
            .ok_or_else(|| SourceControlError::NotFound(format!("{project}/{repo}")))?;
        if revision_id(repository.revision) != base_revision {
            return Err(SourceControlError::Conflict(format!(
                "{base_revision} is not the latest revision"
            )));
        }
        repository
            .files
            .insert((branch.to_string(), path.to_string()), content.to_string());
        repository.revision += 1;
        drop(repos);

        lock(&self.commits).push(RecordedCommit {
            project: project.to_string(),
            repo: repo.to_string(),
            path: path.to_string(),
            branch: branch.to_string(),
            base_revision: base_revision.to_string(),
            message: message.to_string(),
            content: content.to_string(),
        });
        Ok(())
    }
}
