use std::time::Duration;

use base64::Engine as _;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{RemoteBlob, RemoteStore, SyncError};
use crate::config::RemoteConfig;

/// `owner/name` of a GitHub repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSlug {
    pub owner: String,
    pub repo: String,
}

impl RepoSlug {
    /// # Errors
    ///
    /// Returns [`SyncError::Misconfigured`] unless `raw` is `<owner>/<repo>`.
    pub fn parse(raw: &str) -> Result<Self, SyncError> {
        let trimmed = raw.trim();
        let invalid = || {
            SyncError::Misconfigured(format!(
                "invalid repo slug '{trimmed}': expected <owner>/<repo>"
            ))
        };
        let (owner, repo) = trimmed.split_once('/').ok_or_else(invalid)?;
        if owner.is_empty() || repo.is_empty() || repo.contains('/') {
            return Err(invalid());
        }
        Ok(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
        })
    }

    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

#[derive(Debug, Deserialize)]
struct ContentsEntry {
    sha: String,
}

/// Repository contents API: one file per reviewer, `sha` as the revision.
pub struct GitHubStore {
    agent: ureq::Agent,
    api_base: String,
    repo: RepoSlug,
    branch: String,
    token: String,
}

impl std::fmt::Debug for GitHubStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubStore")
            .field("api_base", &self.api_base)
            .field("repo", &self.repo)
            .field("branch", &self.branch)
            .finish_non_exhaustive()
    }
}

impl GitHubStore {
    #[must_use]
    pub fn new(
        api_base: &str,
        repo: RepoSlug,
        branch: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
            api_base: api_base.trim_end_matches('/').to_string(),
            repo,
            branch: branch.into(),
            token: token.into(),
        }
    }

    /// Build from `[remote]`, reading the token from `remote.token_env`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Misconfigured`] if the repo is missing or
    /// malformed, or the token variable is unset.
    pub fn from_config(config: &RemoteConfig) -> Result<Self, SyncError> {
        let raw = config.repo.as_deref().ok_or_else(|| {
            SyncError::Misconfigured("remote.repo is required for kind = \"github\"".into())
        })?;
        let repo = RepoSlug::parse(raw)?;
        let token = std::env::var(&config.token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                SyncError::Misconfigured(format!(
                    "environment variable {} is not set",
                    config.token_env
                ))
            })?;
        Ok(Self::new(
            &config.api_base,
            repo,
            config.branch.clone(),
            token,
            config.timeout(),
        ))
    }

    fn contents_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/contents/{}",
            self.api_base,
            self.repo.owner,
            self.repo.repo,
            path.trim_start_matches('/')
        )
    }

    fn request(&self, method: &str, url: &str) -> ureq::Request {
        self.agent
            .request(method, url)
            .set("Accept", "application/vnd.github+json")
            .set("User-Agent", "verdict-cli")
            .set("Authorization", &format!("Bearer {}", self.token))
    }

    fn put(
        &self,
        path: &str,
        content: &[u8],
        sha: Option<&str>,
        message: &str,
    ) -> Result<(), SyncError> {
        let mut body = json!({
            "message": message,
            "content": base64::engine::general_purpose::STANDARD.encode(content),
            "branch": self.branch,
        });
        if let Some(sha) = sha {
            body["sha"] = json!(sha);
        }
        let url = self.contents_url(path);
        self.request("PUT", &url).send_json(body).map_err(map_error)?;
        debug!(url, bytes = content.len(), "contents written");
        Ok(())
    }
}

fn map_error(err: ureq::Error) -> SyncError {
    match err {
        ureq::Error::Status(status, response) => {
            let body = response.into_string().unwrap_or_default();
            let message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
                .unwrap_or(body);
            SyncError::Rejected { status, message }
        }
        ureq::Error::Transport(transport) => SyncError::Unavailable(transport.to_string()),
    }
}

impl RemoteStore for GitHubStore {
    fn describe(&self) -> String {
        format!("github:{}@{}", self.repo.full_name(), self.branch)
    }

    fn fetch(&self, path: &str) -> Result<Option<RemoteBlob>, SyncError> {
        let url = self.contents_url(path);
        let response = match self.request("GET", &url).query("ref", &self.branch).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(404, _)) => return Ok(None),
            Err(err) => return Err(map_error(err)),
        };
        let entry: ContentsEntry = response
            .into_json()
            .map_err(|err| {
                SyncError::Unavailable(format!("undecodable contents response: {err}"))
            })?;
        Ok(Some(RemoteBlob {
            revision: entry.sha,
        }))
    }

    fn create(&self, path: &str, content: &[u8], message: &str) -> Result<(), SyncError> {
        self.put(path, content, None, message)
    }

    fn update(
        &self,
        path: &str,
        content: &[u8],
        revision: &str,
        message: &str,
    ) -> Result<(), SyncError> {
        self.put(path, content, Some(revision), message)
    }
}
