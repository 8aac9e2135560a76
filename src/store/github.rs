//! GitHub-backed change-request store
//!
//! Proposals are pull requests, entries are issue comments on them.

use super::{
    ChangeRequest, ChangeRequestState, ChangeRequestStore, Entry, EntryId, ProposalId, StoreError,
};
use crate::config::GitHubConfig;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, instrument};

const PAGE_SIZE: usize = 100;

#[derive(Deserialize)]
struct GhPull {
    number: u64,
    title: String,
    body: Option<String>,
    state: String,
    merged_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    head: GhHead,
}

#[derive(Deserialize)]
struct GhHead {
    #[serde(rename = "ref")]
    name: String,
}

#[derive(Deserialize)]
struct GhComment {
    id: u64,
    body: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct GhRef {
    object: GhObject,
}

#[derive(Deserialize)]
struct GhObject {
    sha: String,
}

#[derive(Deserialize)]
struct GhMessage {
    message: String,
}

impl From<GhPull> for ChangeRequest {
    fn from(pull: GhPull) -> Self {
        let state = if pull.merged_at.is_some() {
            ChangeRequestState::Merged
        } else if pull.state == "open" {
            ChangeRequestState::Open
        } else {
            ChangeRequestState::Closed
        };
        Self {
            id: pull.number,
            title: pull.title,
            body: pull.body.unwrap_or_default(),
            branch: pull.head.name,
            state,
            created_at: pull.created_at,
            updated_at: pull.updated_at,
        }
    }
}

impl From<GhComment> for Entry {
    fn from(comment: GhComment) -> Self {
        Self {
            id: comment.id,
            body: comment.body.unwrap_or_default(),
            created_at: comment.created_at,
        }
    }
}

/// REST v3 client scoped to one repository
pub struct GitHubStore {
    client: Client,
    repo_url: String,
}

impl GitHubStore {
    pub fn new(config: &GitHubConfig) -> Result<Self, StoreError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            HeaderValue::from_static("2022-11-28"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static("dao-ballot"));
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.token)).map_err(|e| {
            StoreError::Transport {
                operation: "configure",
                message: format!("invalid token header: {}", e),
            }
        })?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| StoreError::Transport {
                operation: "configure",
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            repo_url: format!(
                "{}/repos/{}/{}",
                config.api_url.trim_end_matches('/'),
                config.owner,
                config.repo
            ),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.repo_url, path)
    }

    /// Send and turn any non-2xx answer into a typed failure
    async fn send(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<reqwest::Response, StoreError> {
        let response = request
            .send()
            .await
            .map_err(|e| StoreError::Transport {
                operation,
                message: e.to_string(),
            })?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let raw = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<GhMessage>(&raw)
            .map(|m| m.message)
            .unwrap_or(raw);
        Err(StoreError::Status {
            operation,
            status: status.as_u16(),
            message,
        })
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<T, StoreError> {
        self.send(operation, request)
            .await?
            .json::<T>()
            .await
            .map_err(|e| StoreError::Decode {
                operation,
                message: e.to_string(),
            })
    }

    async fn paginate<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, StoreError> {
        let mut items = Vec::new();
        let mut page = 1usize;
        loop {
            let request = self
                .client
                .get(url)
                .query(query)
                .query(&[("per_page", PAGE_SIZE), ("page", page)]);
            let batch: Vec<T> = self.send_json(operation, request).await?;
            let done = batch.len() < PAGE_SIZE;
            items.extend(batch);
            if done {
                break;
            }
            page += 1;
        }
        debug!(operation, pages = page, count = items.len(), "Fetched all pages");
        Ok(items)
    }
}

#[async_trait]
impl ChangeRequestStore for GitHubStore {
    #[instrument(name = "store_create_branch", skip(self))]
    async fn create_branch(&self, branch: &str, from: &str) -> Result<(), StoreError> {
        let base: GhRef = self
            .send_json(
                "create_branch",
                self.client.get(self.url(&format!("git/ref/heads/{}", from))),
            )
            .await?;
        self.send(
            "create_branch",
            self.client.post(self.url("git/refs")).json(&json!({
                "ref": format!("refs/heads/{}", branch),
                "sha": base.object.sha,
            })),
        )
        .await?;
        Ok(())
    }

    #[instrument(name = "store_put_file", skip(self, content))]
    async fn put_file(
        &self,
        branch: &str,
        path: &str,
        content: &str,
        message: &str,
    ) -> Result<(), StoreError> {
        self.send(
            "put_file",
            self.client
                .put(self.url(&format!("contents/{}", path)))
                .json(&json!({
                    "message": message,
                    "content": STANDARD.encode(content.as_bytes()),
                    "branch": branch,
                })),
        )
        .await?;
        Ok(())
    }

    #[instrument(name = "store_open_change_request", skip(self, body))]
    async fn open_change_request(
        &self,
        head: &str,
        base: &str,
        title: &str,
        body: &str,
    ) -> Result<ChangeRequest, StoreError> {
        let pull: GhPull = self
            .send_json(
                "open_change_request",
                self.client.post(self.url("pulls")).json(&json!({
                    "title": title,
                    "body": body,
                    "head": head,
                    "base": base,
                })),
            )
            .await?;
        Ok(pull.into())
    }

    #[instrument(name = "store_list_open", skip(self))]
    async fn list_open(&self) -> Result<Vec<ChangeRequest>, StoreError> {
        let pulls: Vec<GhPull> = self
            .paginate("list_open", &self.url("pulls"), &[("state", "open")])
            .await?;
        Ok(pulls.into_iter().map(ChangeRequest::from).collect())
    }

    #[instrument(name = "store_get", skip(self))]
    async fn get(&self, id: ProposalId) -> Result<ChangeRequest, StoreError> {
        let pull: GhPull = self
            .send_json("get", self.client.get(self.url(&format!("pulls/{}", id))))
            .await
            .map_err(|e| match e {
                StoreError::Status { status: 404, .. } => {
                    StoreError::NotFound(format!("proposal #{}", id))
                }
                other => other,
            })?;
        Ok(pull.into())
    }

    #[instrument(name = "store_list_entries", skip(self))]
    async fn list_entries(&self, id: ProposalId) -> Result<Vec<Entry>, StoreError> {
        let comments: Vec<GhComment> = self
            .paginate(
                "list_entries",
                &self.url(&format!("issues/{}/comments", id)),
                &[],
            )
            .await?;
        Ok(comments.into_iter().map(Entry::from).collect())
    }

    #[instrument(name = "store_append_entry", skip(self, body))]
    async fn append_entry(&self, id: ProposalId, body: &str) -> Result<Entry, StoreError> {
        let comment: GhComment = self
            .send_json(
                "append_entry",
                self.client
                    .post(self.url(&format!("issues/{}/comments", id)))
                    .json(&json!({ "body": body })),
            )
            .await?;
        Ok(comment.into())
    }

    #[instrument(name = "store_update_entry", skip(self, body))]
    async fn update_entry(
        &self,
        id: ProposalId,
        entry_id: EntryId,
        body: &str,
    ) -> Result<Entry, StoreError> {
        let comment: GhComment = self
            .send_json(
                "update_entry",
                self.client
                    .patch(self.url(&format!("issues/comments/{}", entry_id)))
                    .json(&json!({ "body": body })),
            )
            .await?;
        Ok(comment.into())
    }

    #[instrument(name = "store_merge", skip(self))]
    async fn merge(&self, id: ProposalId, commit_title: &str) -> Result<(), StoreError> {
        self.send(
            "merge",
            self.client
                .put(self.url(&format!("pulls/{}/merge", id)))
                .json(&json!({
                    "commit_title": commit_title,
                    "merge_method": "merge",
                })),
        )
        .await?;
        Ok(())
    }

    #[instrument(name = "store_close_without_merge", skip(self))]
    async fn close_without_merge(&self, id: ProposalId) -> Result<(), StoreError> {
        self.send(
            "close_without_merge",
            self.client
                .patch(self.url(&format!("pulls/{}", id)))
                .json(&json!({ "state": "closed" })),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pull(state: &str, merged: bool) -> GhPull {
        let now = Utc::now();
        GhPull {
            number: 7,
            title: "Fund X".to_string(),
            body: None,
            state: state.to_string(),
            merged_at: merged.then_some(now),
            created_at: now,
            updated_at: now,
            head: GhHead {
                name: "proposal-fund-x".to_string(),
            },
        }
    }

    #[test]
    fn test_pull_state_mapping() {
        assert_eq!(ChangeRequest::from(pull("open", false)).state, ChangeRequestState::Open);
        assert_eq!(ChangeRequest::from(pull("closed", true)).state, ChangeRequestState::Merged);
        assert_eq!(ChangeRequest::from(pull("closed", false)).state, ChangeRequestState::Closed);
    }

    #[test]
    fn test_pull_without_body_maps_to_empty_text() {
        let request = ChangeRequest::from(pull("open", false));
        assert_eq!(request.body, "");
        assert_eq!(request.branch, "proposal-fund-x");
    }

    #[test]
    fn test_repo_url_is_scoped_to_repository() {
        let config = GitHubConfig {
            api_url: "https://api.github.com/".to_string(),
            owner: "acme".to_string(),
            repo: "proposals".to_string(),
            token: "t0ken".to_string(),
        };
        let store = GitHubStore::new(&config).unwrap();
        assert_eq!(
            store.url("pulls/3"),
            "https://api.github.com/repos/acme/proposals/pulls/3"
        );
    }
}
