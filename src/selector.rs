//! Candidate file selection
//!
//! Filters a caller-supplied list of paths down to the files eligible for
//! mutation, then picks exactly one at random. Only ever a read path: the
//! write-back of the chosen file's mutated content happens at the boundary.

use crate::github::{SourceControl, SourceControlError};

/// Extensions the game will mutate. Config, markup, and binary files carry
/// too little executable surface to plant a believable bug in.
const CODE_EXTENSIONS: &[&str] = &[
    "js", "jsx", "ts", "tsx", "mjs", "cjs", "vue", "svelte", "py", "rb", "go", "rs", "java",
    "php", "cs",
];

/// Line ceiling applied to every candidate. Exactly one file is mutated per
/// round, so the single-file ceiling is always the one that applies.
pub const MAX_LINES_SINGLE_FILE: usize = 500;

/// Line ceiling for a future mode that stresses several files in one round.
/// Unreachable under the current single-selection policy; kept as named
/// configuration rather than deleted so the intended split stays visible.
#[allow(dead_code)]
pub const MAX_LINES_MULTI_FILE: usize = 200;

/// Skip reason recorded verbatim in the per-file results.
pub const SKIP_NON_CODE: &str = "Skipped: non-code file";

/// An eligible candidate, alive only for the duration of one round.
#[derive(Debug, Clone)]
pub struct CandidateFile {
    pub path: String,
    pub content: String,
    pub sha: String,
    pub line_count: usize,
}

/// A candidate that was filtered out, with the reason the caller reports.
#[derive(Debug, Clone)]
pub struct SkippedFile {
    pub path: String,
    pub reason: String,
}

/// Outcome of one selection pass.
#[derive(Debug, Clone)]
pub struct Selection {
    /// The single file that will be mutated, if any candidate survived.
    pub chosen: Option<CandidateFile>,
    /// Eligible files that lost the draw. Fetched once, never mutated.
    pub passed_over: Vec<String>,
    pub skipped: Vec<SkippedFile>,
}

fn is_code_file(path: &str) -> bool {
    let ext = match path.rsplit_once('.') {
        Some((_, ext)) => ext.to_lowercase(),
        None => return false,
    };
    CODE_EXTENSIONS.contains(&ext.as_str())
}

/// Filter `paths` and choose exactly one eligible file uniformly at random.
///
/// Fetch failures are captured per file and never abort the pass. An empty
/// eligible set is not an error: the caller reports zero processed files.
pub async fn select(
    source: &dyn SourceControl,
    paths: &[String],
    branch: &str,
    rng: &mut fastrand::Rng,
) -> Selection {
    let mut eligible: Vec<CandidateFile> = Vec::new();
    let mut skipped = Vec::new();

    for path in paths {
        if !is_code_file(path) {
            skipped.push(SkippedFile {
                path: path.clone(),
                reason: SKIP_NON_CODE.to_string(),
            });
            continue;
        }

        let remote = match source.fetch_file(path, branch).await {
            Ok(remote) => remote,
            Err(SourceControlError::NotFound(_)) => {
                skipped.push(SkippedFile {
                    path: path.clone(),
                    reason: "File not found on branch".to_string(),
                });
                continue;
            }
            Err(err) => {
                skipped.push(SkippedFile {
                    path: path.clone(),
                    reason: format!("Fetch failed: {}", err),
                });
                continue;
            }
        };

        let line_count = remote.content.split('\n').count();
        if line_count > MAX_LINES_SINGLE_FILE {
            skipped.push(SkippedFile {
                path: path.clone(),
                reason: format!("Skipped: file too large ({} lines)", line_count),
            });
            continue;
        }

        eligible.push(CandidateFile {
            path: path.clone(),
            content: remote.content,
            sha: remote.sha,
            line_count,
        });
    }

    if eligible.is_empty() {
        return Selection {
            chosen: None,
            passed_over: Vec::new(),
            skipped,
        };
    }

    let index = rng.usize(..eligible.len());
    let chosen = eligible.remove(index);
    let passed_over = eligible.into_iter().map(|c| c.path).collect();
    tracing::debug!(file = %chosen.path, "selected candidate for stress round");

    Selection {
        chosen: Some(chosen),
        passed_over,
        skipped,
    }
}
