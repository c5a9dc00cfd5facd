use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RemoteUrlError {
    #[error("repository url is empty")]
    Empty,
    #[error("`{0}` is not a GitHub repository (expected https://github.com/owner/repo or owner/repo)")]
    Unrecognized(String),
}

/// `owner/name` of a GitHub repository.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RepositorySlug {
    pub owner: String,
    pub name: String,
}

impl RepositorySlug {
    pub fn parse(url: &str) -> Result<Self, RemoteUrlError> {
        let normalized = url.trim().trim_end_matches('/').trim_end_matches(".git");
        if normalized.is_empty() {
            return Err(RemoteUrlError::Empty);
        }

        let prefixes = [
            "https://github.com/",
            "http://github.com/",
            "ssh://git@github.com/",
            "git@github.com:",
        ];
        let path = prefixes
            .iter()
            .find_map(|prefix| normalized.strip_prefix(prefix))
            .unwrap_or(normalized);

        // Bare `owner/repo` only; anything else with a scheme is a different host.
        if path.contains("://") || path.contains('@') {
            return Err(RemoteUrlError::Unrecognized(url.to_string()));
        }

        let mut parts = path.split('/');
        let owner = parts.next().map(str::trim).unwrap_or_default();
        let name = parts.next().map(str::trim).unwrap_or_default();
        if owner.is_empty() || name.is_empty() || parts.next().is_some() {
            return Err(RemoteUrlError::Unrecognized(url.to_string()));
        }

        Ok(Self { owner: owner.to_string(), name: name.to_string() })
    }
}

impl FromStr for RepositorySlug {
    type Err = RemoteUrlError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl fmt::Display for RepositorySlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::{RemoteUrlError, RepositorySlug};

    #[test]
    fn accepts_common_remote_forms() {
        for url in [
            "https://github.com/acme/deployments",
            "https://github.com/acme/deployments/",
            "https://github.com/acme/deployments.git",
            "git@github.com:acme/deployments.git",
            "acme/deployments",
        ] {
            let slug = RepositorySlug::parse(url).expect(url);
            assert_eq!(slug.to_string(), "acme/deployments", "{url}");
        }
    }

    #[test]
    fn rejects_other_hosts_and_partial_paths() {
        assert_eq!(RepositorySlug::parse("  "), Err(RemoteUrlError::Empty));
        assert!(RepositorySlug::parse("https://gitlab.com/acme/deployments").is_err());
        assert!(RepositorySlug::parse("https://github.com/acme").is_err());
        assert!(RepositorySlug::parse("acme/deployments/tree/main").is_err());
    }
}
