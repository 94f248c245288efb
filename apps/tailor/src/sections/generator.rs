//! Section Generator: the per-section unit the executor fans out over.
//!
//! One implementation per section kind. The executor holds
//! `Arc<dyn SectionGenerator>` handles and never branches on section name.

use std::time::Instant;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::errors::GenerationError;
use crate::llm_client::{strip_json_fences, CompletionRequest, GenerationBackend};
use crate::models::{SourceData, TargetContext};
use crate::sections::prompts::GROUNDING_INSTRUCTION;
use crate::sections::result::{ContentOrigin, SectionResult};
use crate::sections::spec::{SectionContent, SectionSpec};

#[async_trait]
pub trait SectionGenerator: Send + Sync {
    fn spec(&self) -> &SectionSpec;

    /// Stable name recorded in cache entries, e.g. `summary/llm-v1`.
    fn identity(&self) -> &str;

    /// AI path: call the generation backend and validate the reply.
    /// Constraint violations come back as `GenerationError::Validation`.
    async fn produce(
        &self,
        source: &SourceData,
        target: &TargetContext,
    ) -> Result<SectionContent, GenerationError>;

    /// Deterministic non-AI transform of the source data. Fails only on
    /// missing or malformed source data, never on content quality.
    fn direct(
        &self,
        source: &SourceData,
        target: &TargetContext,
    ) -> Result<SectionContent, GenerationError>;

    /// Runs one attempt and captures the outcome as a `SectionResult`.
    async fn generate(
        &self,
        source: &SourceData,
        target: &TargetContext,
        attempt: u32,
    ) -> SectionResult {
        let started = Instant::now();
        let spec = self.spec();
        let outcome = if spec.uses_generation {
            self.produce(source, target).await
        } else {
            self.direct(source, target)
        };

        match outcome {
            Ok(content) => SectionResult::success(
                &spec.name,
                self.identity(),
                content,
                ContentOrigin::Generated,
                attempt,
                started.elapsed(),
            ),
            Err(err) => {
                SectionResult::failure(&spec.name, self.identity(), err, attempt, started.elapsed())
            }
        }
    }
}

/// Sends a request and parses the reply as JSON of shape `T`.
/// A reply that does not parse is a validation failure, not a transport one.
pub(crate) async fn complete_json<T: DeserializeOwned>(
    backend: &dyn GenerationBackend,
    request: &CompletionRequest,
) -> Result<T, GenerationError> {
    let text = backend.complete(request).await?;
    serde_json::from_str(strip_json_fences(&text))
        .map_err(|e| GenerationError::Validation(format!("Unparseable output: {e}")))
}

/// Candidate facts as pretty JSON for prompt templates.
pub(crate) fn facts_json(source: &SourceData) -> Result<String, GenerationError> {
    serde_json::to_string_pretty(source)
        .map_err(|e| GenerationError::MalformedSource(format!("Failed to serialize source: {e}")))
}

/// Targeting signal as pretty JSON for prompt templates.
pub(crate) fn job_json(target: &TargetContext) -> Result<String, GenerationError> {
    serde_json::to_string_pretty(&json!({
        "job_title": target.job_title,
        "company": target.company,
        "keywords": target.keywords,
        "description": target.description,
    }))
    .map_err(|e| GenerationError::MalformedSource(format!("Failed to serialize target: {e}")))
}

/// Fills the shared placeholders of a section template plus any extra ones.
pub(crate) fn render_prompt(
    template: &str,
    source: &SourceData,
    target: &TargetContext,
    extra: &[(&str, String)],
) -> Result<String, GenerationError> {
    let mut prompt = template
        .replace("{grounding_instruction}", GROUNDING_INSTRUCTION)
        .replace("{facts_json}", &facts_json(source)?)
        .replace("{job_json}", &job_json(target)?);
    for (key, value) in extra {
        prompt = prompt.replace(&format!("{{{key}}}"), value);
    }
    Ok(prompt)
}

/// Cuts `text` to at most `max` characters on a word boundary, or mid-word
/// when not even the first word fits.
pub(crate) fn truncate_words(text: &str, max: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out = String::new();
    for word in text.split_whitespace() {
        let extra = if out.is_empty() { 0 } else { 1 };
        if out.chars().count() + extra + word.chars().count() > max {
            break;
        }
        if extra == 1 {
            out.push(' ');
        }
        out.push_str(word);
    }
    if out.is_empty() {
        // First word alone is longer than `max`.
        return text.chars().take(max).collect();
    }
    out
}
