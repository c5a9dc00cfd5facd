//! GitHub REST adapter for the restart workflow's repository capabilities.

pub mod client;
pub mod remote;

pub use client::GitHubClient;
pub use remote::{RemoteUrlError, RepositorySlug};
