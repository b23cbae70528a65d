//! BitbucketClient - Bitbucket Server REST API の SourceControl 実装
//!
//! # エンドポイント
//! - read: `GET  {addr}/rest/api/latest/projects/{p}/repos/{r}/browse/{path}?at={branch}`
//! - revision: `GET {addr}/rest/api/latest/projects/{p}/repos/{r}/commits?limit=1`
//! - write: `PUT  {addr}/rest/api/latest/projects/{p}/repos/{r}/browse/{path}`（multipart）
//!
//! browse はページングされるので `isLastPage` / `nextPageStart` をたどります。
//! 書き込みは `sourceCommitId` による楽観的排他で、ブランチが進んでいれば 409 になります。

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;

use crate::domain::SourceControlError;
use crate::ports::SourceControl;

pub const DEFAULT_ADDRESS: &str = "https://bitbucket.org";

#[derive(Debug, Clone)]
pub struct BitbucketClient {
    http: Client,
    address: String,
    token: String,
}

impl BitbucketClient {
    pub fn new(address: impl Into<String>, token: impl Into<String>) -> Self {
        Self::with_client(Client::new(), address, token)
    }

    pub fn with_client(http: Client, address: impl Into<String>, token: impl Into<String>) -> Self {
        let address = address.into().trim_end_matches('/').to_string();
        Self {
            http,
            address,
            token: token.into(),
        }
    }

    fn repo_url(&self, project: &str, repo: &str) -> String {
        format!(
            "{}/rest/api/latest/projects/{project}/repos/{repo}",
            self.address
        )
    }

    fn browse_url(&self, project: &str, repo: &str, path: &str) -> String {
        format!(
            "{}/browse/{}",
            self.repo_url(project, repo),
            path.trim_start_matches('/')
        )
    }

    /// Send with auth and turn any non-200 answer into an error.
    async fn send(
        &self,
        request: RequestBuilder,
        subject: &str,
    ) -> Result<Response, SourceControlError> {
        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| SourceControlError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::OK {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(response_error(status, &body, subject))
    }
}

#[async_trait]
impl SourceControl for BitbucketClient {
    async fn read_file(
        &self,
        project: &str,
        repo: &str,
        path: &str,
        branch: &str,
    ) -> Result<String, SourceControlError> {
        let url = self.browse_url(project, repo, path);
        let mut content = String::new();
        let mut start = 0u64;

        loop {
            let request = self
                .http
                .get(&url)
                .query(&[("at", branch.to_string()), ("start", start.to_string())]);
            let page: BrowsePage = self
                .send(request, path)
                .await?
                .json()
                .await
                .map_err(|e| SourceControlError::Decode(e.to_string()))?;

            append_lines(&mut content, &page.lines);
            match page.next_start() {
                Some(next) if next > start => start = next,
                _ => break,
            }
        }

        tracing::debug!(
            project,
            repo,
            path,
            branch,
            bytes = content.len(),
            "read configuration file"
        );
        Ok(content)
    }

    async fn latest_revision(
        &self,
        project: &str,
        repo: &str,
    ) -> Result<String, SourceControlError> {
        let url = format!("{}/commits", self.repo_url(project, repo));
        let subject = format!("{project}/{repo}");
        let commits: CommitPage = self
            .send(self.http.get(&url).query(&[("limit", "1")]), &subject)
            .await?
            .json()
            .await
            .map_err(|e| SourceControlError::Decode(e.to_string()))?;

        commits
            .values
            .into_iter()
            .next()
            .map(|c| c.id)
            .ok_or_else(|| SourceControlError::NotFound(format!("latest commit of {subject}")))
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
        let url = self.browse_url(project, repo, path);
        let form = Form::new()
            .text("branch", format!("refs/heads/{branch}"))
            .text("sourceCommitId", base_revision.to_string())
            .text("message", message.to_string())
            .part("content", Part::text(content.to_string()).file_name("blob"));

        self.send(self.http.put(&url).multipart(form), path).await?;
        tracing::debug!(project, repo, path, branch, base_revision, "committed configuration file");
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BrowsePage {
    #[serde(default)]
    lines: Vec<Line>,
    #[serde(default = "last_page")]
    is_last_page: bool,
    #[serde(default)]
    next_page_start: Option<u64>,
}

fn last_page() -> bool {
    true
}

impl BrowsePage {
    fn next_start(&self) -> Option<u64> {
        if self.is_last_page {
            None
        } else {
            self.next_page_start
        }
    }
}

#[derive(Debug, Deserialize)]
struct Line {
    text: String,
}

#[derive(Debug, Deserialize)]
struct CommitPage {
    #[serde(default)]
    values: Vec<Commit>,
}

#[derive(Debug, Deserialize)]
struct Commit {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ErrorDocument {
    #[serde(default)]
    errors: Vec<ErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct ErrorEntry {
    message: String,
}

/// Every line is followed by a newline, including the last one.
fn append_lines(content: &mut String, lines: &[Line]) {
    for line in lines {
        content.push_str(&line.text);
        content.push('\n');
    }
}

fn response_error(status: StatusCode, body: &str, subject: &str) -> SourceControlError {
    match status {
        StatusCode::NOT_FOUND => return SourceControlError::NotFound(subject.to_string()),
        StatusCode::CONFLICT => {
            let message = serde_json::from_str::<ErrorDocument>(body)
                .ok()
                .and_then(|d| d.errors.into_iter().next())
                .map(|e| e.message)
                .unwrap_or_else(|| status.to_string());
            return SourceControlError::Conflict(message);
        }
        _ => {}
    }

    match serde_json::from_str::<ErrorDocument>(body) {
        Err(e) => SourceControlError::Decode(e.to_string()),
        Ok(doc) => match doc.errors.into_iter().next() {
            Some(first) => SourceControlError::Remote {
                status: status.as_u16(),
                message: first.message,
            },
            None => SourceControlError::Remote {
                status: status.as_u16(),
                message: format!("unexpected response: {status}"),
            },
        },
    }
}
