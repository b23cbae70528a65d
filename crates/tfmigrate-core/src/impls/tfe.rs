//! TfeClient - Terraform Enterprise / Cloud API (JSON:API) の WorkspaceApi 実装
//!
//! - `POST /api/v2/organizations/{org}/workspaces`
//! - `POST /api/v2/workspaces/{id}/state-versions`
//!
//! path の各要素は percent-encode して URL に入れます。
//! エラー応答は `errors[].detail`（無ければ `title`）を連結してメッセージにします。

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url, header};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::domain::WorkspaceApiError;
use crate::ports::{StateVersionRequest, WorkspaceApi, WorkspaceHandle};

pub const DEFAULT_ADDRESS: &str = "https://app.terraform.io";
const JSON_API: &str = "application/vnd.api+json";

#[derive(Debug, Clone)]
pub struct TfeClient {
    http: Client,
    address: String,
    token: String,
}

impl TfeClient {
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

    pub fn address(&self) -> &str {
        &self.address
    }

    /// `{address}/api/v2/{segments...}` with every segment encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, WorkspaceApiError> {
        let invalid =
            || WorkspaceApiError::Transport(format!("invalid address {:?}", self.address));
        let mut url = Url::parse(&self.address).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|()| invalid())?
            .pop_if_empty()
            .extend(["api", "v2"].iter().chain(segments));
        Ok(url)
    }

    async fn post(&self, segments: &[&str], body: &Value) -> Result<Response, WorkspaceApiError> {
        let url = self.endpoint(segments)?;
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .header(header::CONTENT_TYPE, JSON_API)
            .header(header::ACCEPT, JSON_API)
            .json(body)
            .send()
            .await
            .map_err(|e| WorkspaceApiError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let text = response.text().await.unwrap_or_default();
        Err(WorkspaceApiError::Rejected {
            status: status.as_u16(),
            message: error_message(status, &text),
        })
    }
}

#[async_trait]
impl WorkspaceApi for TfeClient {
    async fn create_workspace(
        &self,
        organization: &str,
        name: &str,
        terraform_version: &str,
    ) -> Result<WorkspaceHandle, WorkspaceApiError> {
        let response = self
            .post(
                &["organizations", organization, "workspaces"],
                &workspace_body(name, terraform_version),
            )
            .await?;

        let created: Document = response
            .json()
            .await
            .map_err(|e| WorkspaceApiError::Decode(e.to_string()))?;
        tracing::debug!(
            organization,
            workspace = name,
            id = %created.data.id,
            "created workspace"
        );

        Ok(WorkspaceHandle {
            id: created.data.id,
            name: name.to_string(),
        })
    }

    async fn create_state_version(
        &self,
        workspace: &WorkspaceHandle,
        request: &StateVersionRequest,
    ) -> Result<(), WorkspaceApiError> {
        self.post(
            &["workspaces", workspace.id.as_str(), "state-versions"],
            &state_version_body(request),
        )
        .await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct Document {
    data: Resource,
}

#[derive(Debug, Deserialize)]
struct Resource {
    id: String,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorDocument {
    #[serde(default)]
    errors: Vec<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    detail: Option<String>,
}

fn workspace_body(name: &str, terraform_version: &str) -> Value {
    json!({
        "data": {
            "type": "workspaces",
            "attributes": {
                "name": name,
                "terraform-version": terraform_version,
            }
        }
    })
}

fn state_version_body(request: &StateVersionRequest) -> Value {
    json!({
        "data": {
            "type": "state-versions",
            "attributes": {
                "serial": request.serial,
                "md5": request.md5,
                "lineage": request.lineage,
                "state": request.state,
            }
        }
    })
}

/// Human-readable message for an error response. Falls back to the status.
fn error_message(status: StatusCode, body: &str) -> String {
    let doc: ErrorDocument = serde_json::from_str(body).unwrap_or_default();
    let messages: Vec<String> = doc
        .errors
        .into_iter()
        .filter_map(|e| {
            e.detail
                .filter(|d| !d.is_empty())
                .or(e.title.filter(|t| !t.is_empty()))
        })
        .collect();

    if messages.is_empty() {
        status.to_string()
    } else {
        messages.join("; ")
    }
}
