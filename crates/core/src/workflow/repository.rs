//! Capability handles for the remote versioned repository.
//!
//! Authoring (reads, branches, commits, pull requests, merges) and approval are separate traits
//! so they can carry different credentials. The workflow only ever sees these handles.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("`{0}` was not found")]
    NotFound(String),
    #[error("request was rejected: {0}")]
    Rejected(String),
    #[error("credentials were refused: {0}")]
    Unauthorized(String),
    #[error("remote responded with status {status}: {message}")]
    Api { status: u16, message: String },
    #[error("remote could not be reached: {0}")]
    Transport(String),
    #[error("remote response could not be decoded: {0}")]
    Decode(String),
}

/// A file as stored on a branch, with the blob hash needed to update it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileContents {
    pub content: String,
    pub sha: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileUpdate {
    pub path: String,
    pub branch: String,
    pub message: String,
    pub content: String,
    /// Hash of the content being replaced.
    pub expected_sha: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewPullRequest {
    pub title: String,
    pub body: String,
    pub head: String,
    pub base: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub html_url: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    Squash,
    Merge,
    Rebase,
}

impl MergeStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Squash => "squash",
            Self::Merge => "merge",
            Self::Rebase => "rebase",
        }
    }
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MergeStrategy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "squash" => Ok(Self::Squash),
            "merge" => Ok(Self::Merge),
            "rebase" => Ok(Self::Rebase),
            other => Err(format!("unknown merge strategy `{other}`")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeRequest {
    pub number: u64,
    pub strategy: MergeStrategy,
    pub commit_title: String,
    pub commit_message: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeReceipt {
    pub sha: String,
}

#[async_trait]
pub trait RemoteRepository: Send + Sync {
    async fn read_file(&self, path: &str, branch: &str) -> Result<FileContents, RepositoryError>;

    /// Commit hash at the tip of `branch`.
    async fn branch_head(&self, branch: &str) -> Result<String, RepositoryError>;

    /// Fails rather than moving an existing branch.
    async fn create_branch(&self, name: &str, from_sha: &str) -> Result<(), RepositoryError>;

    /// Returns the new commit hash.
    async fn update_file(&self, update: &FileUpdate) -> Result<String, RepositoryError>;

    async fn open_pull_request(
        &self,
        request: &NewPullRequest,
    ) -> Result<PullRequest, RepositoryError>;

    async fn merge_pull_request(
        &self,
        request: &MergeRequest,
    ) -> Result<MergeReceipt, RepositoryError>;
}

#[async_trait]
pub trait ChangeApprover: Send + Sync {
    async fn approve(&self, pull_request: u64, body: &str) -> Result<(), RepositoryError>;
}
