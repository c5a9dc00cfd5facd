//! GitHub REST v3 client implementing the workflow's repository and approval handles.
//!
//! One client carries one credential. The restart workflow uses two instances when a separate
//! reviewer token is configured: one as the author, one as the approver.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use relaunch_core::workflow::{
    ChangeApprover, FileContents, FileUpdate, MergeReceipt, MergeRequest, NewPullRequest,
    PullRequest, RemoteRepository, RepositoryError,
};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::remote::RepositorySlug;

const USER_AGENT: &str = "relaunch-agent";
const ACCEPT: &str = "application/vnd.github+json";
const API_VERSION: &str = "2022-11-28";

#[derive(Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    api_base_url: String,
    slug: RepositorySlug,
    token: SecretString,
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("api_base_url", &self.api_base_url)
            .field("slug", &self.slug)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct ContentResponse {
    content: String,
    sha: String,
}

#[derive(Deserialize)]
struct RefResponse {
    object: RefObject,
}

#[derive(Deserialize)]
struct RefObject {
    sha: String,
}

#[derive(Deserialize)]
struct UpdateResponse {
    commit: RefObject,
}

#[derive(Deserialize)]
struct MergeResponse {
    sha: String,
}

impl GitHubClient {
    pub fn new(api_base_url: impl Into<String>, slug: RepositorySlug, token: SecretString) -> Self {
        Self::with_http(reqwest::Client::new(), api_base_url, slug, token)
    }

    pub fn with_http(
        http: reqwest::Client,
        api_base_url: impl Into<String>,
        slug: RepositorySlug,
        token: SecretString,
    ) -> Self {
        let api_base_url = api_base_url.into().trim_end_matches('/').to_string();
        Self { http, api_base_url, slug, token }
    }

    fn repo_url(&self, suffix: &str) -> String {
        format!("{}/repos/{}/{}/{suffix}", self.api_base_url, self.slug.owner, self.slug.name)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .bearer_auth(self.token.expose_secret())
            .header(reqwest::header::ACCEPT, ACCEPT)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .header("X-GitHub-Api-Version", API_VERSION)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        resource: &str,
    ) -> Result<T, RepositoryError> {
        let response =
            request.send().await.map_err(|error| RepositoryError::Transport(error.to_string()))?;
        let response = check_status(response, resource).await?;
        response.json::<T>().await.map_err(|error| RepositoryError::Decode(error.to_string()))
    }
}

async fn check_status(response: Response, resource: &str) -> Result<Response, RepositoryError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|value| value.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or(body);

    debug!(
        event_name = "github.request.failed",
        status = status.as_u16(),
        resource,
        message = %message,
        "github request failed"
    );

    Err(match status {
        StatusCode::NOT_FOUND => RepositoryError::NotFound(resource.to_string()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RepositoryError::Unauthorized(message),
        StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
            RepositoryError::Rejected(message)
        }
        other => RepositoryError::Api { status: other.as_u16(), message },
    })
}

fn decode_content(encoded: &str) -> Result<String, RepositoryError> {
    let compact =
        encoded.chars().filter(|character| !character.is_whitespace()).collect::<String>();
    let bytes =
        STANDARD.decode(compact).map_err(|error| RepositoryError::Decode(error.to_string()))?;
    String::from_utf8(bytes).map_err(|error| RepositoryError::Decode(error.to_string()))
}

#[async_trait]
impl RemoteRepository for GitHubClient {
    async fn read_file(&self, path: &str, branch: &str) -> Result<FileContents, RepositoryError> {
        let url = self.repo_url(&format!("contents/{path}"));
        let response: ContentResponse =
            self.send(self.request(Method::GET, &url).query(&[("ref", branch)]), path).await?;

        Ok(FileContents { content: decode_content(&response.content)?, sha: response.sha })
    }

    async fn branch_head(&self, branch: &str) -> Result<String, RepositoryError> {
        let url = self.repo_url(&format!("git/ref/heads/{branch}"));
        let response: RefResponse = self.send(self.request(Method::GET, &url), branch).await?;
        Ok(response.object.sha)
    }

    async fn create_branch(&self, name: &str, from_sha: &str) -> Result<(), RepositoryError> {
        let url = self.repo_url("git/refs");
        let body = json!({ "ref": format!("refs/heads/{name}"), "sha": from_sha });
        let _: Value = self.send(self.request(Method::POST, &url).json(&body), name).await?;
        Ok(())
    }

    async fn update_file(&self, update: &FileUpdate) -> Result<String, RepositoryError> {
        let url = self.repo_url(&format!("contents/{}", update.path));
        let body = json!({
            "message": update.message,
            "content": STANDARD.encode(update.content.as_bytes()),
            "sha": update.expected_sha,
            "branch": update.branch,
        });
        let response: UpdateResponse =
            self.send(self.request(Method::PUT, &url).json(&body), &update.path).await?;
        Ok(response.commit.sha)
    }

    async fn open_pull_request(
        &self,
        request: &NewPullRequest,
    ) -> Result<PullRequest, RepositoryError> {
        let url = self.repo_url("pulls");
        let body = json!({
            "title": request.title,
            "body": request.body,
            "head": request.head,
            "base": request.base,
        });
        self.send(self.request(Method::POST, &url).json(&body), &request.head).await
    }

    async fn merge_pull_request(
        &self,
        request: &MergeRequest,
    ) -> Result<MergeReceipt, RepositoryError> {
        let url = self.repo_url(&format!("pulls/{}/merge", request.number));
        let body = json!({
            "commit_title": request.commit_title,
            "commit_message": request.commit_message,
            "merge_method": request.strategy.as_str(),
        });
        let resource = format!("pull request #{}", request.number);
        let response: MergeResponse =
            self.send(self.request(Method::PUT, &url).json(&body), &resource).await?;
        Ok(MergeReceipt { sha: response.sha })
    }
}

#[async_trait]
impl ChangeApprover for GitHubClient {
    async fn approve(&self, pull_request: u64, body: &str) -> Result<(), RepositoryError> {
        let url = self.repo_url(&format!("pulls/{pull_request}/reviews"));
        let payload = json!({ "event": "APPROVE", "body": body });
        let resource = format!("pull request #{pull_request}");
        let _: Value = self.send(self.request(Method::POST, &url).json(&payload), &resource).await?;
        Ok(())
    }
}
