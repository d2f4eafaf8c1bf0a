//! Mutation planner
//!
//! The deterministic, dependency-free path for producing a stressed file.
//! Greedy and order-randomized: applicable rules are shuffled, then applied
//! one at a time with applicability re-checked against the current text,
//! until the target count is reached or the pool runs out. Applied rules are
//! never rolled back, and exhausting the pool short of the target is not an
//! error.

use crate::catalog::{catalog, MutationRule};
use crate::symptoms;

/// Change string emitted when no catalog rule matched the file at all.
pub const NO_MUTATION_SENTINEL: &str =
    "No automatic mutation was applicable to this file";

/// A stressed file: mutated content, the technical change log, and the
/// player-facing symptom reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedStress {
    pub content: String,
    pub changes: Vec<String>,
    pub symptoms: Vec<String>,
}

/// Mutate `content` toward `target_count` bugs using the fixed catalog.
pub fn plan(content: &str, target_count: usize, rng: &mut fastrand::Rng) -> GeneratedStress {
    plan_with_rules(content, target_count, &catalog(), rng)
}

/// Catalog-injectable variant of [`plan`], used directly by tests.
pub fn plan_with_rules(
    content: &str,
    target_count: usize,
    rules: &[Box<dyn MutationRule>],
    rng: &mut fastrand::Rng,
) -> GeneratedStress {
    let mut candidates: Vec<&dyn MutationRule> = rules
        .iter()
        .map(|rule| rule.as_ref())
        .filter(|rule| rule.is_applicable(content))
        .collect();
    rng.shuffle(&mut candidates);

    let mut current = content.to_string();
    let mut changes = Vec::new();

    for rule in candidates {
        if changes.len() >= target_count {
            break;
        }
        // Earlier applications may have consumed this rule's match.
        if !rule.is_applicable(&current) {
            continue;
        }
        current = rule.apply(&current);
        tracing::debug!(rule = rule.name(), "applied mutation rule");
        changes.push(rule.description().to_string());
    }

    if changes.is_empty() {
        return GeneratedStress {
            content: content.to_string(),
            changes: vec![NO_MUTATION_SENTINEL.to_string()],
            symptoms: Vec::new(),
        };
    }

    let symptoms = symptoms::synthesize(&changes, rng);
    GeneratedStress {
        content: current,
        changes,
        symptoms,
    }
}
