//! Fix review: diff anti-pattern analysis
//!
//! Inspects the patches of the player's fix commit for residual anti-patterns
//! and renders an aggregate verdict. Pure line/regex analysis over unified
//! diff text - no parsing of the underlying language.

use regex::Regex;
use serde::{Deserialize, Serialize};

/// One file of a commit as supplied by the source-control collaborator.
/// An absent patch means "no signal, skip".
#[derive(Debug, Clone, Deserialize)]
pub struct CommitFile {
    pub filename: String,
    pub patch: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackKind {
    Success,
    Warning,
    Info,
    Hint,
}

/// One structured observation from the analyzer. Outbound only; the single
/// inbound type is [`CommitFile`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Feedback {
    #[serde(rename = "type")]
    pub kind: FeedbackKind,
    pub title: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

/// Aggregate review of one commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub feedback: Vec<Feedback>,
    pub summary: String,
    pub is_perfect: bool,
}

/// Analyze every patched file in a commit and render the verdict.
///
/// A pure function of the patch text: identical input always yields identical
/// feedback and verdict.
pub fn analyze_commit(files: &[CommitFile]) -> Analysis {
    let detectors = Detectors::new();
    let mut feedback = Vec::new();

    for file in files {
        let Some(patch) = &file.patch else {
            continue;
        };
        detectors.analyze_patch(patch, &file.filename, &mut feedback);
    }

    let has_warnings = feedback.iter().any(|f| f.kind == FeedbackKind::Warning);
    let has_hints = feedback.iter().any(|f| f.kind == FeedbackKind::Hint);
    let is_perfect = !has_warnings && !has_hints;

    let summary = if is_perfect && feedback.is_empty() {
        "Excellent work! Your fix looks clean and complete."
    } else if is_perfect {
        "Your fix passes every check. The notes below are informational only."
    } else if has_warnings {
        "Your fix has some issues worth addressing before it ships."
    } else {
        "Almost there - review the hints below and tidy up the leftovers."
    }
    .to_string();

    if is_perfect {
        feedback.insert(
            0,
            Feedback {
                kind: FeedbackKind::Success,
                title: "Clean fix!".to_string(),
                message: "No anti-patterns detected in your changes.".to_string(),
                file: None,
            },
        );
    }

    Analysis {
        feedback,
        summary,
        is_perfect,
    }
}

struct Detectors {
    pass_through_fn: Regex,
    pass_through_arrow_expr: Regex,
    pass_through_arrow_block: Regex,
    empty_fn: Regex,
    empty_arrow: Regex,
    removed_fn: Regex,
    removed_arrow: Regex,
    console_call: Regex,
    todo_marker: Regex,
    commented_code: Regex,
}

impl Detectors {
    fn new() -> Self {
        Self {
            // function identity(x) { return x; }
            pass_through_fn: Regex::new(
                r"function\s+(\w+)\s*\(\s*(\w+)\s*\)\s*\{\s*return\s+(\w+)\s*;?\s*\}",
            )
            .unwrap(),
            // const identity = (x) => x
            // Anchored to line end so `(a) => a.name` is not a false positive.
            pass_through_arrow_expr: Regex::new(
                r"(?m)(?:const|let|var)\s+(\w+)\s*=\s*\(?(\w+)\)?\s*=>\s*(\w+)\s*;?\s*$",
            )
            .unwrap(),
            // const identity = (x) => { return x; }
            pass_through_arrow_block: Regex::new(
                r"(?:const|let|var)\s+(\w+)\s*=\s*\(?(\w+)\)?\s*=>\s*\{\s*return\s+(\w+)\s*;?\s*\}",
            )
            .unwrap(),
            empty_fn: Regex::new(r"function\s+(\w+)\s*\([^)]*\)\s*\{\s*\}").unwrap(),
            empty_arrow: Regex::new(r"(?:const|let|var)\s+(\w+)\s*=\s*\([^)]*\)\s*=>\s*\{\s*\}")
                .unwrap(),
            removed_fn: Regex::new(r"function\s+(\w+)").unwrap(),
            removed_arrow: Regex::new(r"(?:const|let|var)\s+(\w+)\s*=\s*(?:async\s+)?\(").unwrap(),
            console_call: Regex::new(r"console\.(log|debug|info|warn|error)\s*\(").unwrap(),
            todo_marker: Regex::new(r"\b(TODO|FIXME)\b").unwrap(),
            commented_code: Regex::new(r"//\s*(const |let |var |function |return |if ?\(|for ?\(|while ?\()")
                .unwrap(),
        }
    }

    /// Run all detectors, in order, over one file's patch.
    fn analyze_patch(&self, patch: &str, filename: &str, feedback: &mut Vec<Feedback>) {
        let mut added = Vec::new();
        let mut removed = Vec::new();
        for line in patch.lines() {
            if let Some(rest) = line.strip_prefix('+') {
                if !line.starts_with("+++") {
                    added.push(rest);
                }
            } else if let Some(rest) = line.strip_prefix('-') {
                if !line.starts_with("---") {
                    removed.push(rest);
                }
            }
        }
        let added_text = added.join("\n");
        let removed_text = removed.join("\n");

        let push = |feedback: &mut Vec<Feedback>, kind, title: &str, message: String| {
            feedback.push(Feedback {
                kind,
                title: title.to_string(),
                message,
                file: Some(filename.to_string()),
            });
        };

        // 1. Pass-through functions: the body just returns its own parameter
        for caps in self.pass_through_fn.captures_iter(&added_text) {
            if caps[2] == caps[3] {
                push(
                    feedback,
                    FeedbackKind::Warning,
                    "Pass-through function detected",
                    format!(
                        "`{}` only returns its own argument. Did you mean to remove it entirely?",
                        &caps[1]
                    ),
                );
            }
        }
        for pattern in [&self.pass_through_arrow_expr, &self.pass_through_arrow_block] {
            for caps in pattern.captures_iter(&added_text) {
                if caps[2] == caps[3] {
                    push(
                        feedback,
                        FeedbackKind::Warning,
                        "Pass-through function detected",
                        format!(
                            "`{}` only returns its own argument. Did you mean to remove it entirely?",
                            &caps[1]
                        ),
                    );
                }
            }
        }

        // 2. Empty function bodies
        for caps in self.empty_fn.captures_iter(&added_text) {
            push(
                feedback,
                FeedbackKind::Warning,
                "Empty function body",
                format!("`{}` has an empty body. Leftover scaffolding?", &caps[1]),
            );
        }
        for caps in self.empty_arrow.captures_iter(&added_text) {
            push(
                feedback,
                FeedbackKind::Warning,
                "Empty function body",
                format!("`{}` has an empty body. Leftover scaffolding?", &caps[1]),
            );
        }

        // 3. Removed functions that are still being called
        let mut removed_names = Vec::new();
        for caps in self.removed_fn.captures_iter(&removed_text) {
            removed_names.push(caps[1].to_string());
        }
        for caps in self.removed_arrow.captures_iter(&removed_text) {
            removed_names.push(caps[1].to_string());
        }
        for name in removed_names {
            if added_text.contains(&format!("{}(", name)) {
                push(
                    feedback,
                    FeedbackKind::Hint,
                    "Removed function still called",
                    format!(
                        "You removed `{}` but something still calls it. Double-check the call sites.",
                        name
                    ),
                );
            }
        }

        // 4. Debug statements left behind
        if self.console_call.is_match(&added_text) {
            push(
                feedback,
                FeedbackKind::Info,
                "Debug statement left behind",
                "A console logging call was added. Consider removing it before shipping."
                    .to_string(),
            );
        }

        // 5. TODO/FIXME markers
        if self.todo_marker.is_match(&added_text) {
            push(
                feedback,
                FeedbackKind::Info,
                "Unfinished marker",
                "A TODO or FIXME marker was added with this fix.".to_string(),
            );
        }

        // 6. Commented-out statements
        if self.commented_code.is_match(&added_text) {
            push(
                feedback,
                FeedbackKind::Hint,
                "Commented-out code",
                "Commented-out statements were added. Delete dead code instead of hiding it."
                    .to_string(),
            );
        }
    }
}
