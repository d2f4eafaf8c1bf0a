//! GitHub API integration
//!
//! The engine's only source-control collaborator. Everything the game needs
//! from a repository - file content + revision sha, write-back of the
//! stressed file, the fix commit's per-file patches, branch listing - goes
//! through the [`SourceControl`] trait; [`GitHubClient`] is the REST
//! implementation.

use crate::analyzer::CommitFile;
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const API_TIMEOUT_SECS: u64 = 60;

/// Maximum length for error body content in error messages
const MAX_ERROR_BODY_LEN: usize = 200;

#[derive(Debug, Error)]
pub enum SourceControlError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("GitHub API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid payload: {0}")]
    Payload(String),
}

impl From<reqwest::Error> for SourceControlError {
    fn from(err: reqwest::Error) -> Self {
        SourceControlError::Network(err.to_string())
    }
}

/// A file as fetched from the repository: decoded content plus the revision
/// marker needed for a later write.
#[derive(Debug, Clone)]
pub struct RemoteFile {
    pub content: String,
    pub sha: String,
}

/// Read/write access to one repository on one host.
#[async_trait]
pub trait SourceControl: Send + Sync {
    /// Fetch a file's current content and revision sha on a branch.
    async fn fetch_file(&self, path: &str, branch: &str)
        -> Result<RemoteFile, SourceControlError>;

    /// Replace a file's content on a branch. `sha` must be the revision
    /// returned by a prior fetch.
    async fn write_file(
        &self,
        path: &str,
        branch: &str,
        content: &str,
        sha: &str,
        message: &str,
    ) -> Result<(), SourceControlError>;

    /// Resolve a commit into its per-file patches.
    async fn commit_files(&self, sha: &str) -> Result<Vec<CommitFile>, SourceControlError>;

    /// List branch names.
    async fn list_branches(&self) -> Result<Vec<String>, SourceControlError>;
}

/// Sanitize an API error body to prevent credential leakage.
/// Truncates long responses and redacts potential secrets.
fn sanitize_error_body(body: &str) -> String {
    const SECRET_PATTERNS: &[&str] = &[
        "token",
        "secret",
        "password",
        "credential",
        "bearer",
        "ghp_",
        "gho_",
        "github_pat_",
    ];

    let truncated = if body.len() > MAX_ERROR_BODY_LEN {
        // Back off to a char boundary so multibyte bodies cannot panic the
        // error-reporting path.
        let mut end = MAX_ERROR_BODY_LEN;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated)", &body[..end])
    } else {
        body.to_string()
    };

    let lower = truncated.to_lowercase();
    for pattern in SECRET_PATTERNS {
        if lower.contains(pattern) {
            return "(error details redacted - may contain sensitive data)".to_string();
        }
    }

    truncated
}

/// Decode a GitHub contents-API payload (base64 with embedded newlines).
fn decode_contents(encoded: &str) -> Result<String, SourceControlError> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| SourceControlError::Payload(format!("base64 decode failed: {}", e)))?;
    String::from_utf8(bytes)
        .map_err(|e| SourceControlError::Payload(format!("file is not valid UTF-8: {}", e)))
}

// ============================================================================
// GitHub REST client
// ============================================================================

pub struct GitHubClient {
    owner: String,
    repo: String,
    token: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct ContentsResponse {
    content: String,
    sha: String,
}

#[derive(Serialize)]
struct UpdateFileRequest {
    message: String,
    content: String,
    sha: String,
    branch: String,
}

#[derive(Deserialize)]
struct CommitResponse {
    #[serde(default)]
    files: Vec<CommitFile>,
}

#[derive(Deserialize)]
struct BranchEntry {
    name: String,
}

impl GitHubClient {
    pub fn new(owner: &str, repo: &str, token: &str) -> Result<Self, SourceControlError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(API_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            token: token.to_string(),
            client,
        })
    }

    /// Build an API URL from path segments, percent-encoding each one.
    /// Paths with spaces or `#`/`?` must address the right resource instead
    /// of silently truncating at the query or fragment.
    fn api_url<'a>(
        &self,
        segments: impl IntoIterator<Item = &'a str>,
    ) -> Result<url::Url, SourceControlError> {
        let mut url = url::Url::parse("https://api.github.com")
            .map_err(|e| SourceControlError::Payload(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| SourceControlError::Payload("invalid API base URL".to_string()))?
            .push("repos")
            .push(&self.owner)
            .push(&self.repo)
            .extend(segments);
        Ok(url)
    }

    fn contents_url(&self, path: &str) -> Result<url::Url, SourceControlError> {
        self.api_url(
            std::iter::once("contents").chain(path.split('/').filter(|s| !s.is_empty())),
        )
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("Accept", "application/vnd.github+json")
            .header("Authorization", format!("Bearer {}", self.token))
            .header("User-Agent", "bugdrill")
            .header("X-GitHub-Api-Version", "2022-11-28")
    }

    async fn check(
        &self,
        response: reqwest::Response,
        what: &str,
    ) -> Result<reqwest::Response, SourceControlError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        if status.as_u16() == 404 {
            return Err(SourceControlError::NotFound(what.to_string()));
        }
        Err(SourceControlError::Api {
            status: status.as_u16(),
            message: sanitize_error_body(&body),
        })
    }
}

#[async_trait]
impl SourceControl for GitHubClient {
    async fn fetch_file(
        &self,
        path: &str,
        branch: &str,
    ) -> Result<RemoteFile, SourceControlError> {
        let mut url = self.contents_url(path)?;
        url.query_pairs_mut().append_pair("ref", branch);
        let response = self.request(reqwest::Method::GET, url.as_str()).send().await?;
        let response = self.check(response, path).await?;
        let contents: ContentsResponse = response
            .json()
            .await
            .map_err(|e| SourceControlError::Payload(e.to_string()))?;
        Ok(RemoteFile {
            content: decode_contents(&contents.content)?,
            sha: contents.sha,
        })
    }

    async fn write_file(
        &self,
        path: &str,
        branch: &str,
        content: &str,
        sha: &str,
        message: &str,
    ) -> Result<(), SourceControlError> {
        let url = self.contents_url(path)?;
        let request = UpdateFileRequest {
            message: message.to_string(),
            content: base64::engine::general_purpose::STANDARD.encode(content),
            sha: sha.to_string(),
            branch: branch.to_string(),
        };
        let response = self
            .request(reqwest::Method::PUT, url.as_str())
            .json(&request)
            .send()
            .await?;
        self.check(response, path).await?;
        Ok(())
    }

    async fn commit_files(&self, sha: &str) -> Result<Vec<CommitFile>, SourceControlError> {
        let url = self.api_url(["commits", sha])?;
        let response = self.request(reqwest::Method::GET, url.as_str()).send().await?;
        let response = self.check(response, sha).await?;
        let commit: CommitResponse = response
            .json()
            .await
            .map_err(|e| SourceControlError::Payload(e.to_string()))?;
        Ok(commit.files)
    }

    async fn list_branches(&self) -> Result<Vec<String>, SourceControlError> {
        let mut url = self.api_url(["branches"])?;
        url.query_pairs_mut().append_pair("per_page", "100");
        let response = self.request(reqwest::Method::GET, url.as_str()).send().await?;
        let response = self.check(response, "branches").await?;
        let branches: Vec<BranchEntry> = response
            .json()
            .await
            .map_err(|e| SourceControlError::Payload(e.to_string()))?;
        Ok(branches.into_iter().map(|b| b.name).collect())
    }
}
