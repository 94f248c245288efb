//! Summary: a short tailored pitch held to a fixed character band.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::errors::GenerationError;
use crate::llm_client::{CompletionRequest, GenerationBackend};
use crate::models::{SourceData, TargetContext};
use crate::sections::generator::{complete_json, render_prompt, truncate_words, SectionGenerator};
use crate::sections::prompts::{SECTION_SYSTEM, SUMMARY_PROMPT_TEMPLATE};
use crate::sections::spec::{SectionConstraints, SectionContent, SectionSpec};
use crate::sections::SUMMARY;

const MIN_CHARS: usize = 150;
const MAX_CHARS: usize = 600;

#[derive(Debug, Deserialize)]
struct SummaryReply {
    summary: String,
}

pub struct SummaryGenerator {
    spec: SectionSpec,
    backend: Arc<dyn GenerationBackend>,
}

impl SummaryGenerator {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self {
            spec: SectionSpec::generated(SUMMARY, SectionConstraints::char_band(MIN_CHARS, MAX_CHARS)),
            backend,
        }
    }
}

#[async_trait]
impl SectionGenerator for SummaryGenerator {
    fn spec(&self) -> &SectionSpec {
        &self.spec
    }

    fn identity(&self) -> &str {
        "summary/llm-v1"
    }

    async fn produce(
        &self,
        source: &SourceData,
        target: &TargetContext,
    ) -> Result<SectionContent, GenerationError> {
        let prompt = render_prompt(
            SUMMARY_PROMPT_TEMPLATE,
            source,
            target,
            &[
                ("min_chars", MIN_CHARS.to_string()),
                ("max_chars", MAX_CHARS.to_string()),
            ],
        )?;
        let reply: SummaryReply = complete_json(
            self.backend.as_ref(),
            &CompletionRequest {
                system: SECTION_SYSTEM.to_string(),
                prompt,
                max_tokens: 512,
            },
        )
        .await?;

        self.spec.constraints.check_text("summary", &reply.summary)?;
        Ok(SectionContent::new().with("text", reply.summary.trim()))
    }

    fn direct(
        &self,
        source: &SourceData,
        _target: &TargetContext,
    ) -> Result<SectionContent, GenerationError> {
        if let Some(summary) = source.summary.as_deref().filter(|s| !s.trim().is_empty()) {
            return Ok(SectionContent::new().with("text", truncate_words(summary, MAX_CHARS)));
        }

        // No written summary: compose one from the most recent role and top skills.
        let latest = source.experience.first().ok_or_else(|| {
            GenerationError::SourceDataMissing("no summary and no experience to derive one".to_string())
        })?;
        let mut text = format!("{} at {}.", latest.title.trim(), latest.company.trim());
        if !source.skills.is_empty() {
            let top: Vec<&str> = source.skills.iter().take(5).map(|s| s.trim()).collect();
            text.push_str(&format!(" Experienced in {}.", top.join(", ")));
        }
        Ok(SectionContent::new().with("text", truncate_words(&text, MAX_CHARS)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sample_source, sample_target, ScriptedBackend};

    fn reply_with(chars: usize) -> String {
        serde_json::json!({ "summary": "a".repeat(chars) }).to_string()
    }

    #[tokio::test]
    async fn test_summary_in_band_is_accepted() {
        let generator = SummaryGenerator::new(Arc::new(ScriptedBackend::always(&reply_with(300))));
        let content = generator
            .produce(&sample_source(), &sample_target())
            .await
            .unwrap();
        assert_eq!(content.get("text").unwrap().as_str().unwrap().len(), 300);
    }

    #[tokio::test]
    async fn test_summary_outside_band_is_validation_failure() {
        for chars in [MIN_CHARS - 1, MAX_CHARS + 1] {
            let generator =
                SummaryGenerator::new(Arc::new(ScriptedBackend::always(&reply_with(chars))));
            let err = generator
                .produce(&sample_source(), &sample_target())
                .await
                .unwrap_err();
            assert!(matches!(err, GenerationError::Validation(_)), "{chars} chars");
        }
    }

    #[tokio::test]
    async fn test_prompt_carries_band_and_job() {
        let backend = Arc::new(ScriptedBackend::always(&reply_with(200)));
        let generator = SummaryGenerator::new(backend.clone());
        generator
            .produce(&sample_source(), &sample_target())
            .await
            .unwrap();

        let prompt = backend.last_prompt().unwrap();
        assert!(prompt.contains("Between 150 and 600 characters"));
        assert!(prompt.contains("Staff Rust Engineer"));
        assert!(!prompt.contains("{facts_json}"));
    }

    #[test]
    fn test_direct_uses_written_summary() {
        let generator = SummaryGenerator::new(Arc::new(ScriptedBackend::always("")));
        let content = generator.direct(&sample_source(), &sample_target()).unwrap();
        assert!(content
            .get("text")
            .unwrap()
            .as_str()
            .unwrap()
            .starts_with("Systems engineer"));
    }

    #[test]
    fn test_direct_derives_from_latest_role() {
        let mut source = sample_source();
        source.summary = None;
        let generator = SummaryGenerator::new(Arc::new(ScriptedBackend::always("")));
        let content = generator.direct(&source, &sample_target()).unwrap();
        assert_eq!(
            content.get("text").unwrap(),
            "Senior Engineer at Analytical Engines. Experienced in Rust, Tokio, PostgreSQL, Kubernetes, Go."
        );
    }

    #[test]
    fn test_direct_never_empties_an_unbroken_summary() {
        let mut source = sample_source();
        source.summary = Some("k".repeat(MAX_CHARS + 50));
        let generator = SummaryGenerator::new(Arc::new(ScriptedBackend::always("")));
        let content = generator.direct(&source, &sample_target()).unwrap();
        let text = content.get("text").unwrap().as_str().unwrap();
        assert_eq!(text.chars().count(), MAX_CHARS);
    }

    #[test]
    fn test_direct_without_material_is_missing() {
        let source = SourceData::default();
        let generator = SummaryGenerator::new(Arc::new(ScriptedBackend::always("")));
        let err = generator.direct(&source, &sample_target()).unwrap_err();
        assert!(matches!(err, GenerationError::SourceDataMissing(_)));
    }
}
