//! Stress generation via an external text-generation service
//!
//! The primary path asks an LLM (through OpenRouter) to plant the bugs; the
//! deterministic planner is the fallback for every failure mode: no
//! credential, network error, non-JSON reply, missing fields. Callers never
//! see the difference - `GenerationAdapter::generate` always produces a
//! usable `GeneratedStress`.

use crate::planner::{self, GeneratedStress};
use crate::policy::StressLevel;
use crate::symptoms;
use crate::util::truncate;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Model used for bug generation.
const GENERATION_MODEL: &str = "anthropic/claude-sonnet-4";

/// Hard deadline on the single upstream call. A hung generation service must
/// degrade to the planner, not stall the round.
const GENERATION_TIMEOUT_SECS: u64 = 90;

const MAX_TOKENS: u32 = 8192;

/// Focus context supplied by the caller is clipped to this many characters
/// before it reaches the prompt.
pub const MAX_CONTEXT_CHARS: usize = 200;

// ============================================================================
// Generator capability
// ============================================================================

/// An external text-generation capability. Exactly one call is made per
/// stress round.
#[async_trait]
pub trait StressGenerator: Send + Sync {
    /// Whether the capability is worth calling at all.
    fn is_available(&self) -> bool;

    /// Send a system + user prompt, return the raw model reply.
    async fn complete(&self, system: &str, user: &str) -> anyhow::Result<String>;
}

/// Live OpenRouter-backed generator.
pub struct OpenRouterGenerator {
    api_key: String,
}

impl OpenRouterGenerator {
    pub fn new(api_key: String) -> Self {
        Self { api_key }
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: u32,
    stream: bool,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Deserialize)]
struct MessageContent {
    content: String,
}

#[async_trait]
impl StressGenerator for OpenRouterGenerator {
    fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn complete(&self, system: &str, user: &str) -> anyhow::Result<String> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(GENERATION_TIMEOUT_SECS))
            .build()?;

        let request = ChatRequest {
            model: GENERATION_MODEL.to_string(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            max_tokens: MAX_TOKENS,
            stream: false,
        };

        let response = client
            .post(OPENROUTER_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("HTTP-Referer", "https://github.com/bugdrill/bugdrill")
            .header("X-Title", "bugdrill")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("generation API error {}: {}", status, truncate(&text, 200));
        }

        let chat: ChatResponse = response.json().await?;
        chat.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| anyhow::anyhow!("generation API returned no choices"))
    }
}

/// Absent capability: always signals "unavailable" so the adapter takes the
/// deterministic path. Used when no API key is configured, and by tests that
/// exercise the fallback branch directly.
pub struct NullGenerator;

#[async_trait]
impl StressGenerator for NullGenerator {
    fn is_available(&self) -> bool {
        false
    }

    async fn complete(&self, _system: &str, _user: &str) -> anyhow::Result<String> {
        anyhow::bail!("no generation capability configured")
    }
}

// ============================================================================
// Prompts
// ============================================================================

const GENERATION_SYSTEM: &str = r#"You are a QA engineer planting practice bugs in a source file for a debugging exercise.

OUTPUT FORMAT (a single JSON object, nothing else):
{
  "content": "the complete modified source file",
  "changes": ["technical description of each change"],
  "symptoms": ["user-facing bug report for each observable effect"]
}

RULES FOR THE BUGS:
- Plant EXACTLY the requested number of bugs, no more, no fewer
- Every bug must belong to a DISTINCT mechanism. Never plant two bugs from the same pattern family
- Every bug must be deterministic: it reproduces on every run with the same input. No timing, race, or randomness dependent defects
- Do not disclose the bugs: no comments, variable names, or formatting that hints at what changed or where
- Keep the file syntactically valid and plausible - it should look like code a colleague committed

RULES FOR THE SYMPTOMS:
- Write each symptom as a detailed, reproducible tester report: what action was taken, what was expected, what actually happened, and any context
- Never name variables, functions, files, or line numbers
- Describe only behavior observable from outside the program"#;

/// Extra requirement injected for medium/high difficulty.
const DATA_LAYER_REQUIREMENT: &str = "\
STRUCTURAL REQUIREMENT:
- Introduce between 1 and 4 chained data-transformation functions that the \
data must flow through before it is used, and hide one bug inside one of the \
stages. The chain should read like accumulated legacy abstraction, so that \
finding the defect requires tracing data through the pipeline.";

fn build_user_prompt(
    content: &str,
    filename: &str,
    context: Option<&str>,
    level: StressLevel,
    bug_count: usize,
) -> String {
    let cfg = level.config();
    let mut prompt = format!(
        "File: {}\n\nDifficulty: {} ({} bugs expected).\nGuidance: {}\n\nNumber of bugs to plant: {}\n",
        filename,
        cfg.subtlety,
        bug_count,
        cfg.narrative_guidance,
        bug_count,
    );

    if matches!(level, StressLevel::Medium | StressLevel::High) {
        prompt.push('\n');
        prompt.push_str(DATA_LAYER_REQUIREMENT);
        prompt.push('\n');
    }

    if let Some(context) = context {
        let context = truncate(context, MAX_CONTEXT_CHARS);
        if !context.is_empty() {
            prompt.push_str(&format!("\nFocus area suggested by the host: {}\n", context));
        }
    }

    prompt.push_str(&format!(
        "\nSource file content:\n```\n{}\n```\n\nReturn the JSON object now:",
        content
    ));
    prompt
}

// ============================================================================
// Reply parsing
// ============================================================================

/// Strip markdown code fences from a reply.
fn strip_markdown_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let clean = if trimmed.starts_with("```json") {
        trimmed.strip_prefix("```json").unwrap_or(trimmed)
    } else if trimmed.starts_with("```") {
        trimmed.strip_prefix("```").unwrap_or(trimmed)
    } else {
        trimmed
    };
    let clean = if clean.ends_with("```") {
        clean.strip_suffix("```").unwrap_or(clean)
    } else {
        clean
    };
    clean.trim()
}

/// Extract the first well-formed JSON object substring, tolerating
/// surrounding prose.
fn extract_json_object(text: &str) -> Option<&str> {
    let clean = strip_markdown_fences(text);
    let start = clean.find('{')?;
    let end = clean.rfind('}')?;
    if start <= end {
        Some(&clean[start..=end])
    } else {
        None
    }
}

#[derive(Deserialize)]
struct GeneratedReply {
    content: String,
    changes: Vec<String>,
    #[serde(default)]
    symptoms: Vec<String>,
}

/// Parse and validate a raw generator reply against the original file.
pub fn parse_generated_reply(raw: &str, original: &str) -> anyhow::Result<GeneratedStress> {
    let json_str = extract_json_object(raw)
        .ok_or_else(|| anyhow::anyhow!("no JSON object found in generation reply"))?;

    let reply: GeneratedReply = serde_json::from_str(json_str)
        .map_err(|e| anyhow::anyhow!("generation reply missing required fields: {}", e))?;

    if reply.content.trim().is_empty() {
        anyhow::bail!("generation reply has empty content");
    }
    if !reply.changes.is_empty() && reply.content == original {
        anyhow::bail!("generation reply lists changes but content is unmodified");
    }

    Ok(GeneratedStress {
        content: reply.content,
        changes: reply.changes,
        symptoms: reply.symptoms,
    })
}

// ============================================================================
// Adapter
// ============================================================================

/// Front door for stress generation. Prefers the injected generator and
/// silently degrades to the deterministic planner.
pub struct GenerationAdapter<G: StressGenerator> {
    generator: G,
}

impl<G: StressGenerator> GenerationAdapter<G> {
    pub fn new(generator: G) -> Self {
        Self { generator }
    }

    /// Produce a stressed version of `content`. Never fails: any upstream
    /// problem falls back to the planner with the same file, level, and
    /// target count.
    pub async fn generate(
        &self,
        content: &str,
        filename: &str,
        context: Option<&str>,
        level: StressLevel,
        target_override: Option<usize>,
        rng: &mut fastrand::Rng,
    ) -> GeneratedStress {
        let bug_count = level.resolve_bug_count(target_override, rng);

        if !self.generator.is_available() {
            tracing::debug!("generation capability unavailable, using planner");
            return planner::plan(content, bug_count, rng);
        }

        let system = GENERATION_SYSTEM;
        let user = build_user_prompt(content, filename, context, level, bug_count);

        let mut stress = match self.generator.complete(system, &user).await {
            Ok(raw) => match parse_generated_reply(&raw, content) {
                Ok(stress) => stress,
                Err(err) => {
                    tracing::warn!(error = %err, "generation reply invalid, using planner");
                    return planner::plan(content, bug_count, rng);
                }
            },
            Err(err) => {
                tracing::warn!(error = %err, "generation call failed, using planner");
                return planner::plan(content, bug_count, rng);
            }
        };

        if stress.symptoms.is_empty() {
            stress.symptoms = symptoms::synthesize(&stress.changes, rng);
        }
        stress
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::NO_MUTATION_SENTINEL;

    const SAMPLE: &str = r#"
function tally(items) {
  let total = 0;
  for (let i = 0; i <= items.length - 1; i++) {
    total = total + items[i].value;
  }
  return total;
}
"#;

    struct CannedGenerator {
        reply: String,
    }

    #[async_trait]
    impl StressGenerator for CannedGenerator {
        fn is_available(&self) -> bool {
            true
        }

        async fn complete(&self, _system: &str, _user: &str) -> anyhow::Result<String> {
            Ok(self.reply.clone())
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl StressGenerator for FailingGenerator {
        fn is_available(&self) -> bool {
            true
        }

        async fn complete(&self, _system: &str, _user: &str) -> anyhow::Result<String> {
            anyhow::bail!("connection reset")
        }
    }

    // ------------------------------------------------------------------
    // Reply parsing
    // ------------------------------------------------------------------

    #[test]
    fn test_parse_reply_with_surrounding_prose() {
        let raw = r#"Sure! Here is the result:
{"content": "let x = 2;", "changes": ["changed constant"], "symptoms": ["The total shown is wrong."]}
Hope that helps."#;
        let stress = parse_generated_reply(raw, "let x = 1;").unwrap();
        assert_eq!(stress.content, "let x = 2;");
        assert_eq!(stress.changes.len(), 1);
        assert_eq!(stress.symptoms.len(), 1);
    }

    #[test]
    fn test_parse_reply_with_markdown_fences() {
        let raw = "```json\n{\"content\": \"let x = 2;\", \"changes\": [\"c\"], \"symptoms\": []}\n```";
        let stress = parse_generated_reply(raw, "let x = 1;").unwrap();
        assert_eq!(stress.content, "let x = 2;");
        assert!(stress.symptoms.is_empty());
    }

    #[test]
    fn test_parse_reply_without_json_fails() {
        assert!(parse_generated_reply("I could not do that.", "x").is_err());
    }

    #[test]
    fn test_parse_reply_missing_required_field_fails() {
        let raw = r#"{"changes": ["c"], "symptoms": []}"#;
        assert!(parse_generated_reply(raw, "x").is_err());
    }

    #[test]
    fn test_parse_reply_unmodified_content_with_changes_fails() {
        let raw = r#"{"content": "let x = 1;", "changes": ["supposedly changed"], "symptoms": []}"#;
        assert!(parse_generated_reply(raw, "let x = 1;").is_err());
    }

    #[test]
    fn test_parse_reply_symptoms_default_to_empty() {
        let raw = r#"{"content": "let x = 2;", "changes": ["c"]}"#;
        let stress = parse_generated_reply(raw, "let x = 1;").unwrap();
        assert!(stress.symptoms.is_empty());
    }

    // ------------------------------------------------------------------
    // Prompt construction
    // ------------------------------------------------------------------

    #[test]
    fn test_system_prompt_carries_constraints() {
        assert!(GENERATION_SYSTEM.contains("DISTINCT mechanism"));
        assert!(GENERATION_SYSTEM.contains("deterministic"));
        assert!(GENERATION_SYSTEM.contains("Do not disclose"));
        assert!(GENERATION_SYSTEM.contains("Never name variables"));
    }

    #[test]
    fn test_user_prompt_includes_guidance_and_count() {
        let prompt = build_user_prompt("code", "app.js", None, StressLevel::Low, 2);
        assert!(prompt.contains("app.js"));
        assert!(prompt.contains("Number of bugs to plant: 2"));
        assert!(prompt.contains(StressLevel::Low.config().narrative_guidance));
        // Data-layer chaining is a medium/high requirement only
        assert!(!prompt.contains("data-transformation"));
    }

    #[test]
    fn test_user_prompt_adds_data_layer_stages_for_hard_levels() {
        for level in [StressLevel::Medium, StressLevel::High] {
            let prompt = build_user_prompt("code", "app.js", None, level, 3);
            assert!(prompt.contains("data-transformation"));
            assert!(prompt.contains("legacy abstraction"));
        }
    }

    #[test]
    fn test_user_prompt_clips_context() {
        let long_context = "x".repeat(500);
        let prompt = build_user_prompt("code", "app.js", Some(&long_context), StressLevel::Low, 1);
        assert!(!prompt.contains(&long_context));
        assert!(prompt.contains(&"x".repeat(MAX_CONTEXT_CHARS - 3)));
    }

    // ------------------------------------------------------------------
    // Degradation
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_unavailable_generator_matches_planner_exactly() {
        let adapter = GenerationAdapter::new(NullGenerator);
        let mut rng = fastrand::Rng::with_seed(31);
        let from_adapter = adapter
            .generate(SAMPLE, "tally.js", None, StressLevel::Low, Some(2), &mut rng)
            .await;

        let mut rng = fastrand::Rng::with_seed(31);
        let from_planner = planner::plan(SAMPLE, 2, &mut rng);

        assert_eq!(from_adapter, from_planner);
    }

    #[tokio::test]
    async fn test_failing_call_degrades_to_planner() {
        let adapter = GenerationAdapter::new(FailingGenerator);
        let mut rng = fastrand::Rng::with_seed(8);
        let stress = adapter
            .generate(SAMPLE, "tally.js", None, StressLevel::Low, Some(1), &mut rng)
            .await;
        assert_eq!(stress.changes.len(), 1);
        assert_ne!(stress.content, SAMPLE);
        assert_ne!(stress.changes[0], NO_MUTATION_SENTINEL);
    }

    #[tokio::test]
    async fn test_garbage_reply_degrades_to_planner() {
        let adapter = GenerationAdapter::new(CannedGenerator {
            reply: "the dog ate my JSON".to_string(),
        });
        let mut rng = fastrand::Rng::with_seed(8);
        let stress = adapter
            .generate(SAMPLE, "tally.js", None, StressLevel::Low, Some(1), &mut rng)
            .await;
        assert_eq!(stress.changes.len(), 1);
        assert_ne!(stress.content, SAMPLE);
    }

    #[tokio::test]
    async fn test_valid_reply_is_used_and_symptoms_filled() {
        let adapter = GenerationAdapter::new(CannedGenerator {
            reply: r#"{"content": "function tally() { return 0; }", "changes": ["a", "b"]}"#
                .to_string(),
        });
        let mut rng = fastrand::Rng::with_seed(8);
        let stress = adapter
            .generate(SAMPLE, "tally.js", None, StressLevel::Medium, Some(2), &mut rng)
            .await;
        assert_eq!(stress.content, "function tally() { return 0; }");
        assert_eq!(stress.changes, vec!["a".to_string(), "b".to_string()]);
        // Missing symptoms were filled from the fallback bank
        assert_eq!(stress.symptoms.len(), 2);
    }

    #[tokio::test]
    async fn test_reply_symptoms_are_kept_verbatim() {
        let adapter = GenerationAdapter::new(CannedGenerator {
            reply: r#"{"content": "x", "changes": ["a"], "symptoms": ["The page shows stale data."]}"#
                .to_string(),
        });
        let mut rng = fastrand::Rng::with_seed(8);
        let stress = adapter
            .generate(SAMPLE, "tally.js", None, StressLevel::Low, Some(1), &mut rng)
            .await;
        assert_eq!(stress.symptoms, vec!["The page shows stale data.".to_string()]);
    }
}
