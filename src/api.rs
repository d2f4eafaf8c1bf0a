//! Request boundary
//!
//! Validates incoming stress and review requests, orchestrates the selector,
//! generation adapter, and analyzer, and maps failures onto the error
//! taxonomy callers see. Upstream generation trouble never appears here: the
//! adapter already degraded to the planner before control returns.

use crate::analyzer::{self, Analysis};
use crate::generate::{GenerationAdapter, StressGenerator, MAX_CONTEXT_CHARS};
use crate::github::{SourceControl, SourceControlError};
use crate::policy::StressLevel;
use crate::selector;
use crate::util::{dedup_preserving_order, truncate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Commit message used when writing the stressed file back. Deliberately
/// bland so the commit history gives nothing away.
const STRESS_COMMIT_MESSAGE: &str = "Routine update";

/// Errors surfaced to the caller, with their HTTP-style status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("authentication error: {0}")]
    Auth(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> u16 {
        match self {
            ApiError::Validation(_) => 400,
            ApiError::Auth(_) => 401,
            ApiError::NotFound(_) => 404,
            ApiError::Internal(_) => 500,
        }
    }
}

/// Resolve a credential before any network call is made. Absent or blank
/// tokens are a 401, never a downstream API error.
pub fn require_credential(token: Option<String>, what: &str) -> Result<String, ApiError> {
    match token {
        Some(token) if !token.trim().is_empty() => Ok(token),
        _ => Err(ApiError::Auth(format!("missing {} credential", what))),
    }
}

// ============================================================================
// Stress round
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StressRequest {
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub files: Vec<String>,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub target_bug_count: Option<usize>,
}

/// Per-file outcome of a stress round. At most one entry has `success: true`.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub file: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changes: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symptoms: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileReport {
    fn skipped(file: String, reason: String) -> Self {
        Self {
            file,
            success: false,
            changes: None,
            symptoms: None,
            error: Some(reason),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StressResponse {
    pub message: String,
    pub results: Vec<FileReport>,
    /// Symptoms across all processed files, deduplicated in insertion order.
    pub symptoms: Vec<String>,
}

fn require_field(value: &str, name: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::Validation(format!("missing required field: {}", name)));
    }
    Ok(())
}

fn validate_stress(request: &StressRequest) -> Result<(), ApiError> {
    require_field(&request.owner, "owner")?;
    require_field(&request.repo, "repo")?;
    require_field(&request.branch, "branch")?;
    if request.files.is_empty() {
        return Err(ApiError::Validation(
            "missing required field: files (at least one path)".to_string(),
        ));
    }
    Ok(())
}

/// Run one stress round: select a file, mutate it, write it back.
///
/// Per-file trouble (skip reasons, fetch failures, a failed write) lands in
/// that file's `results` entry instead of aborting the round.
pub async fn run_stress<G: StressGenerator>(
    source: &dyn SourceControl,
    adapter: &GenerationAdapter<G>,
    request: &StressRequest,
    rng: &mut fastrand::Rng,
) -> Result<StressResponse, ApiError> {
    validate_stress(request)?;

    let level = request
        .difficulty
        .as_deref()
        .map(StressLevel::parse)
        .unwrap_or_default();
    let context = request
        .context
        .as_deref()
        .map(|c| truncate(c, MAX_CONTEXT_CHARS));

    let selection = selector::select(source, &request.files, &request.branch, rng).await;

    let mut results = Vec::new();
    let mut symptoms = Vec::new();

    let message = match selection.chosen {
        None => "No processable files found".to_string(),
        Some(chosen) => {
            let stress = adapter
                .generate(
                    &chosen.content,
                    &chosen.path,
                    context.as_deref(),
                    level,
                    request.target_bug_count,
                    rng,
                )
                .await;

            let write = source
                .write_file(
                    &chosen.path,
                    &request.branch,
                    &stress.content,
                    &chosen.sha,
                    STRESS_COMMIT_MESSAGE,
                )
                .await;

            match write {
                Ok(()) => {
                    tracing::info!(
                        file = %chosen.path,
                        bugs = stress.changes.len(),
                        level = level.as_str(),
                        "stress round deployed"
                    );
                    symptoms.extend(stress.symptoms.iter().cloned());
                    results.push(FileReport {
                        file: chosen.path,
                        success: true,
                        changes: Some(stress.changes),
                        symptoms: Some(stress.symptoms),
                        error: None,
                    });
                    "Stress test deployed".to_string()
                }
                Err(err) => {
                    tracing::warn!(file = %chosen.path, error = %err, "write-back failed");
                    results.push(FileReport::skipped(
                        chosen.path,
                        format!("Write failed: {}", err),
                    ));
                    "Stress test could not be deployed".to_string()
                }
            }
        }
    };

    for path in selection.passed_over {
        results.push(FileReport::skipped(
            path,
            "Not selected for stress testing".to_string(),
        ));
    }
    for skip in selection.skipped {
        results.push(FileReport::skipped(skip.path, skip.reason));
    }

    Ok(StressResponse {
        message,
        results,
        symptoms: dedup_preserving_order(symptoms),
    })
}

// ============================================================================
// Fix review
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewRequest {
    pub owner: String,
    pub repo: String,
    pub sha: String,
}

fn validate_review(request: &ReviewRequest) -> Result<(), ApiError> {
    require_field(&request.owner, "owner")?;
    require_field(&request.repo, "repo")?;
    require_field(&request.sha, "sha")?;
    Ok(())
}

/// Resolve the fix commit and analyze its patches.
pub async fn run_review(
    source: &dyn SourceControl,
    request: &ReviewRequest,
) -> Result<Analysis, ApiError> {
    validate_review(request)?;

    let files = source.commit_files(&request.sha).await.map_err(|err| match err {
        SourceControlError::NotFound(_) => {
            ApiError::NotFound(format!("commit {} not found", request.sha))
        }
        other => ApiError::Internal(other.to_string()),
    })?;

    Ok(analyzer::analyze_commit(&files))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::CommitFile;
    use crate::generate::NullGenerator;
    use crate::github::RemoteFile;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FakeRepo {
        files: HashMap<String, String>,
        commits: HashMap<String, Vec<CommitFile>>,
        fail_writes: bool,
        writes: Mutex<Vec<(String, String)>>,
    }

    impl FakeRepo {
        fn with_files(files: &[(&str, &str)]) -> Self {
            Self {
                files: files
                    .iter()
                    .map(|(p, c)| (p.to_string(), c.to_string()))
                    .collect(),
                commits: HashMap::new(),
                fail_writes: false,
                writes: Mutex::new(Vec::new()),
            }
        }

        fn with_commit(sha: &str, files: Vec<CommitFile>) -> Self {
            let mut repo = Self::with_files(&[]);
            repo.commits.insert(sha.to_string(), files);
            repo
        }
    }

    #[async_trait]
    impl SourceControl for FakeRepo {
        async fn fetch_file(
            &self,
            path: &str,
            _branch: &str,
        ) -> Result<RemoteFile, SourceControlError> {
            self.files
                .get(path)
                .map(|content| RemoteFile {
                    content: content.clone(),
                    sha: format!("sha-{}", path),
                })
                .ok_or_else(|| SourceControlError::NotFound(path.to_string()))
        }

        async fn write_file(
            &self,
            path: &str,
            _branch: &str,
            content: &str,
            _sha: &str,
            _message: &str,
        ) -> Result<(), SourceControlError> {
            if self.fail_writes {
                return Err(SourceControlError::Api {
                    status: 409,
                    message: "sha mismatch".to_string(),
                });
            }
            self.writes
                .lock()
                .unwrap()
                .push((path.to_string(), content.to_string()));
            Ok(())
        }

        async fn commit_files(&self, sha: &str) -> Result<Vec<CommitFile>, SourceControlError> {
            self.commits
                .get(sha)
                .cloned()
                .ok_or_else(|| SourceControlError::NotFound(sha.to_string()))
        }

        async fn list_branches(&self) -> Result<Vec<String>, SourceControlError> {
            Ok(vec!["main".to_string()])
        }
    }

    const SAMPLE_JS: &str = r#"
async function loadScores() {
  const response = await fetch("/api/scores/latest");
  const payload = response.data;
  const rows = payload.rows.sort((a, b) => a.rank - b.rank);
  const labels = rows.map((row) => row.label);
  let total = 0;
  for (let i = 0; i <= rows.length - 1; i++) {
    total = total + rows[i].points;
  }
  return { labels, total, complete: true };
}
"#;

    fn stress_request(files: &[&str]) -> StressRequest {
        StressRequest {
            owner: "acme".to_string(),
            repo: "scoreboard".to_string(),
            branch: "main".to_string(),
            files: files.iter().map(|f| f.to_string()).collect(),
            context: None,
            difficulty: Some("low".to_string()),
            target_bug_count: None,
        }
    }

    #[test]
    fn test_require_credential() {
        assert!(require_credential(Some("ghp_x".to_string()), "GitHub").is_ok());
        let err = require_credential(None, "GitHub").unwrap_err();
        assert_eq!(err.status(), 401);
        let err = require_credential(Some("   ".to_string()), "GitHub").unwrap_err();
        assert_eq!(err.status(), 401);
    }

    #[tokio::test]
    async fn test_missing_fields_are_rejected_with_field_name() {
        let repo = FakeRepo::with_files(&[]);
        let adapter = GenerationAdapter::new(NullGenerator);
        let mut request = stress_request(&["a.js"]);
        request.owner = String::new();

        let mut rng = fastrand::Rng::with_seed(1);
        let err = run_stress(&repo, &adapter, &request, &mut rng)
            .await
            .unwrap_err();
        assert_eq!(err.status(), 400);
        assert!(err.to_string().contains("owner"));
    }

    #[tokio::test]
    async fn test_empty_file_list_is_rejected() {
        let repo = FakeRepo::with_files(&[]);
        let adapter = GenerationAdapter::new(NullGenerator);
        let request = stress_request(&[]);

        let mut rng = fastrand::Rng::with_seed(1);
        let err = run_stress(&repo, &adapter, &request, &mut rng)
            .await
            .unwrap_err();
        assert_eq!(err.status(), 400);
        assert!(err.to_string().contains("files"));
    }

    #[tokio::test]
    async fn test_low_with_override_one_plants_exactly_one_bug() {
        let repo = FakeRepo::with_files(&[("scores.js", SAMPLE_JS)]);
        let adapter = GenerationAdapter::new(NullGenerator);
        let mut request = stress_request(&["scores.js"]);
        request.target_bug_count = Some(1);

        let mut rng = fastrand::Rng::with_seed(5);
        let response = run_stress(&repo, &adapter, &request, &mut rng)
            .await
            .unwrap();

        let report = &response.results[0];
        assert!(report.success);
        assert_eq!(report.changes.as_ref().unwrap().len(), 1);
        // The mutated content was written back under the bland commit message
        let writes = repo.writes.lock().unwrap();
        assert_eq!(writes.len(), 1);
        assert_ne!(writes[0].1, SAMPLE_JS);
    }

    #[tokio::test]
    async fn test_no_code_files_yields_empty_round() {
        let repo = FakeRepo::with_files(&[]);
        let adapter = GenerationAdapter::new(NullGenerator);
        let request = stress_request(&["a.md", "b.png"]);

        let mut rng = fastrand::Rng::with_seed(1);
        let response = run_stress(&repo, &adapter, &request, &mut rng)
            .await
            .unwrap();

        assert_eq!(response.message, "No processable files found");
        assert_eq!(response.results.len(), 2);
        for report in &response.results {
            assert!(!report.success);
            assert_eq!(report.error.as_deref(), Some("Skipped: non-code file"));
        }
        assert!(response.symptoms.is_empty());
        assert!(repo.writes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_at_most_one_success_entry() {
        let repo = FakeRepo::with_files(&[
            ("a.js", SAMPLE_JS),
            ("b.js", SAMPLE_JS),
            ("c.js", SAMPLE_JS),
        ]);
        let adapter = GenerationAdapter::new(NullGenerator);
        let request = stress_request(&["a.js", "b.js", "c.js"]);

        for seed in 0..10 {
            let mut rng = fastrand::Rng::with_seed(seed);
            let response = run_stress(&repo, &adapter, &request, &mut rng)
                .await
                .unwrap();
            let successes = response.results.iter().filter(|r| r.success).count();
            assert_eq!(successes, 1);
            assert_eq!(response.results.len(), 3);
        }
    }

    #[tokio::test]
    async fn test_passed_over_files_are_reported_not_mutated() {
        let repo = FakeRepo::with_files(&[("a.js", SAMPLE_JS), ("b.js", SAMPLE_JS)]);
        let adapter = GenerationAdapter::new(NullGenerator);
        let request = stress_request(&["a.js", "b.js"]);

        let mut rng = fastrand::Rng::with_seed(3);
        let response = run_stress(&repo, &adapter, &request, &mut rng)
            .await
            .unwrap();

        let not_selected: Vec<_> = response
            .results
            .iter()
            .filter(|r| r.error.as_deref() == Some("Not selected for stress testing"))
            .collect();
        assert_eq!(not_selected.len(), 1);
        assert_eq!(repo.writes.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_write_failure_is_captured_per_file() {
        let mut repo = FakeRepo::with_files(&[("a.js", SAMPLE_JS)]);
        repo.fail_writes = true;
        let adapter = GenerationAdapter::new(NullGenerator);
        let request = stress_request(&["a.js"]);

        let mut rng = fastrand::Rng::with_seed(2);
        let response = run_stress(&repo, &adapter, &request, &mut rng)
            .await
            .unwrap();

        assert_eq!(response.message, "Stress test could not be deployed");
        assert!(!response.results[0].success);
        assert!(response.results[0]
            .error
            .as_deref()
            .unwrap()
            .starts_with("Write failed"));
    }

    #[tokio::test]
    async fn test_symptoms_are_deduplicated() {
        let repo = FakeRepo::with_files(&[("a.js", SAMPLE_JS)]);
        let adapter = GenerationAdapter::new(NullGenerator);
        let request = stress_request(&["a.js"]);

        let mut rng = fastrand::Rng::with_seed(11);
        let response = run_stress(&repo, &adapter, &request, &mut rng)
            .await
            .unwrap();

        let mut seen = std::collections::HashSet::new();
        for symptom in &response.symptoms {
            assert!(seen.insert(symptom.clone()));
        }
    }

    #[tokio::test]
    async fn test_review_unknown_commit_is_404() {
        let repo = FakeRepo::with_files(&[]);
        let request = ReviewRequest {
            owner: "acme".to_string(),
            repo: "scoreboard".to_string(),
            sha: "deadbeef".to_string(),
        };
        let err = run_review(&repo, &request).await.unwrap_err();
        assert_eq!(err.status(), 404);
    }

    #[tokio::test]
    async fn test_review_clean_commit_is_perfect() {
        let repo = FakeRepo::with_commit(
            "abc123",
            vec![CommitFile {
                filename: "scores.js".to_string(),
                patch: Some("@@ -1 +1 @@\n-const total = rows[0].points;\n+const total = sum(rows);".to_string()),
            }],
        );
        let request = ReviewRequest {
            owner: "acme".to_string(),
            repo: "scoreboard".to_string(),
            sha: "abc123".to_string(),
        };
        let analysis = run_review(&repo, &request).await.unwrap();
        assert!(analysis.is_perfect);
    }

    #[tokio::test]
    async fn test_review_missing_sha_is_400() {
        let repo = FakeRepo::with_files(&[]);
        let request = ReviewRequest {
            owner: "acme".to_string(),
            repo: "scoreboard".to_string(),
            sha: "  ".to_string(),
        };
        let err = run_review(&repo, &request).await.unwrap_err();
        assert_eq!(err.status(), 400);
        assert!(err.to_string().contains("sha"));
    }
}
