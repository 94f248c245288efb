//! Experience: every source role, in order, with bullets rewritten for the job.
//!
//! Company, title and period always come from the source; only the bullets
//! are generated. A reply that drops, reorders or renames a role is rejected.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::errors::GenerationError;
use crate::llm_client::{CompletionRequest, GenerationBackend};
use crate::models::{ExperienceEntry, SourceData, TargetContext};
use crate::sections::generator::{complete_json, render_prompt, SectionGenerator};
use crate::sections::prompts::{EXPERIENCE_PROMPT_TEMPLATE, SECTION_SYSTEM};
use crate::sections::spec::{SectionConstraints, SectionContent, SectionSpec};
use crate::sections::EXPERIENCE;

const MIN_BULLETS: usize = 2;
const MAX_BULLETS: usize = 5;
const MAX_BULLET_CHARS: usize = 220;

#[derive(Debug, Deserialize)]
struct ExperienceReply {
    entries: Vec<ReplyEntry>,
}

#[derive(Debug, Deserialize)]
struct ReplyEntry {
    company: String,
    bullets: Vec<String>,
}

pub struct ExperienceGenerator {
    spec: SectionSpec,
    backend: Arc<dyn GenerationBackend>,
}

impl ExperienceGenerator {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self {
            spec: SectionSpec::generated(
                EXPERIENCE,
                SectionConstraints {
                    min_items: Some(MIN_BULLETS),
                    max_items: Some(MAX_BULLETS),
                    max_item_chars: Some(MAX_BULLET_CHARS),
                    ..Default::default()
                },
            ),
            backend,
        }
    }
}

fn entry_json(entry: &ExperienceEntry, bullets: &[String]) -> serde_json::Value {
    json!({
        "title": entry.title.trim(),
        "company": entry.company.trim(),
        "period": entry.period(),
        "bullets": bullets,
    })
}

#[async_trait]
impl SectionGenerator for ExperienceGenerator {
    fn spec(&self) -> &SectionSpec {
        &self.spec
    }

    fn identity(&self) -> &str {
        "experience/llm-v1"
    }

    async fn produce(
        &self,
        source: &SourceData,
        target: &TargetContext,
    ) -> Result<SectionContent, GenerationError> {
        if source.experience.is_empty() {
            return Err(GenerationError::SourceDataMissing(
                "no experience entries".to_string(),
            ));
        }

        let prompt = render_prompt(
            EXPERIENCE_PROMPT_TEMPLATE,
            source,
            target,
            &[
                ("entry_count", source.experience.len().to_string()),
                ("min_bullets", MIN_BULLETS.to_string()),
                ("max_bullets", MAX_BULLETS.to_string()),
                ("max_bullet_chars", MAX_BULLET_CHARS.to_string()),
            ],
        )?;
        let reply: ExperienceReply = complete_json(
            self.backend.as_ref(),
            &CompletionRequest {
                system: SECTION_SYSTEM.to_string(),
                prompt,
                max_tokens: 2048,
            },
        )
        .await?;

        if reply.entries.len() != source.experience.len() {
            return Err(GenerationError::Validation(format!(
                "experience has {} entries, source has {}",
                reply.entries.len(),
                source.experience.len()
            )));
        }

        let mut entries = Vec::with_capacity(reply.entries.len());
        for (generated, original) in reply.entries.iter().zip(&source.experience) {
            if !generated
                .company
                .trim()
                .eq_ignore_ascii_case(original.company.trim())
            {
                return Err(GenerationError::Validation(format!(
                    "experience entry for '{}' came back as '{}'",
                    original.company, generated.company
                )));
            }
            let bullets: Vec<String> = generated.bullets.iter().map(|b| b.trim().to_string()).collect();
            self.spec
                .constraints
                .check_items(&format!("experience bullets for {}", original.company), &bullets)?;
            entries.push(entry_json(original, &bullets));
        }

        Ok(SectionContent::new().with("entries", entries))
    }

    fn direct(
        &self,
        source: &SourceData,
        _target: &TargetContext,
    ) -> Result<SectionContent, GenerationError> {
        if source.experience.is_empty() {
            return Err(GenerationError::SourceDataMissing(
                "no experience entries".to_string(),
            ));
        }

        let mut entries = Vec::with_capacity(source.experience.len());
        for entry in &source.experience {
            if entry.company.trim().is_empty() || entry.title.trim().is_empty() {
                return Err(GenerationError::MalformedSource(format!(
                    "experience entry starting {} lacks a company or title",
                    entry.start
                )));
            }
            let bullets: Vec<String> = entry
                .highlights
                .iter()
                .map(|h| h.trim())
                .filter(|h| !h.is_empty())
                .take(MAX_BULLETS)
                .map(str::to_string)
                .collect();
            entries.push(entry_json(entry, &bullets));
        }

        Ok(SectionContent::new().with("entries", entries))
    }
}
