//! Cover letter: body paragraphs addressed to the target role.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::errors::GenerationError;
use crate::llm_client::{CompletionRequest, GenerationBackend};
use crate::models::{SourceData, TargetContext};
use crate::sections::generator::{complete_json, render_prompt, SectionGenerator};
use crate::sections::prompts::{COVER_LETTER_PROMPT_TEMPLATE, SECTION_SYSTEM};
use crate::sections::spec::{SectionConstraints, SectionContent, SectionSpec};
use crate::sections::COVER_LETTER;

const MIN_PARAGRAPHS: usize = 3;
const MAX_PARAGRAPHS: usize = 5;
const MIN_CHARS: usize = 600;
const MAX_CHARS: usize = 3000;

#[derive(Debug, Deserialize)]
struct CoverLetterReply {
    paragraphs: Vec<String>,
}

pub struct CoverLetterGenerator {
    spec: SectionSpec,
    backend: Arc<dyn GenerationBackend>,
}

impl CoverLetterGenerator {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self {
            spec: SectionSpec::generated(
                COVER_LETTER,
                SectionConstraints {
                    min_chars: Some(MIN_CHARS),
                    max_chars: Some(MAX_CHARS),
                    min_items: Some(MIN_PARAGRAPHS),
                    max_items: Some(MAX_PARAGRAPHS),
                    max_item_chars: None,
                },
            ),
            backend,
        }
    }
}

fn letter(source: &SourceData, target: &TargetContext, paragraphs: Vec<String>) -> SectionContent {
    let addressee = if target.company.trim().is_empty() {
        "Dear Hiring Manager,".to_string()
    } else {
        format!("Dear {} Hiring Team,", target.company.trim())
    };
    SectionContent::new()
        .with("salutation", addressee)
        .with("paragraphs", paragraphs)
        .with("signature", source.candidate.name.trim())
}

#[async_trait]
impl SectionGenerator for CoverLetterGenerator {
    fn spec(&self) -> &SectionSpec {
        &self.spec
    }

    fn identity(&self) -> &str {
        "cover_letter/llm-v1"
    }

    async fn produce(
        &self,
        source: &SourceData,
        target: &TargetContext,
    ) -> Result<SectionContent, GenerationError> {
        if source.candidate.name.trim().is_empty() {
            return Err(GenerationError::SourceDataMissing(
                "candidate name is empty".to_string(),
            ));
        }

        let prompt = render_prompt(
            COVER_LETTER_PROMPT_TEMPLATE,
            source,
            target,
            &[
                ("min_paragraphs", MIN_PARAGRAPHS.to_string()),
                ("max_paragraphs", MAX_PARAGRAPHS.to_string()),
                ("min_chars", MIN_CHARS.to_string()),
                ("max_chars", MAX_CHARS.to_string()),
            ],
        )?;
        let reply: CoverLetterReply = complete_json(
            self.backend.as_ref(),
            &CompletionRequest {
                system: SECTION_SYSTEM.to_string(),
                prompt,
                max_tokens: 2048,
            },
        )
        .await?;

        let paragraphs: Vec<String> = reply.paragraphs.iter().map(|p| p.trim().to_string()).collect();
        self.spec.constraints.check_items("cover letter paragraphs", &paragraphs)?;
        self.spec
            .constraints
            .check_text("cover letter", &paragraphs.join("\n\n"))?;

        Ok(letter(source, target, paragraphs))
    }

    fn direct(
        &self,
        source: &SourceData,
        target: &TargetContext,
    ) -> Result<SectionContent, GenerationError> {
        if source.candidate.name.trim().is_empty() {
            return Err(GenerationError::SourceDataMissing(
                "candidate name is empty".to_string(),
            ));
        }

        let role = if target.job_title.trim().is_empty() {
            "the open position".to_string()
        } else {
            format!("the {} position", target.job_title.trim())
        };
        let company = if target.company.trim().is_empty() {
            "your team".to_string()
        } else {
            target.company.trim().to_string()
        };

        let mut paragraphs = Vec::new();

        let mut opening = format!("I am writing to apply for {role} at {company}.");
        if let Some(summary) = source.summary.as_deref().filter(|s| !s.trim().is_empty()) {
            opening.push(' ');
            opening.push_str(summary.trim());
        }
        paragraphs.push(opening);

        if let Some(latest) = source.experience.first() {
            let mut body = format!(
                "In my role as {} at {}, my work has included the following.",
                latest.title.trim(),
                latest.company.trim()
            );
            for highlight in latest.highlights.iter().take(3) {
                body.push(' ');
                body.push_str(highlight.trim());
                if !highlight.trim_end().ends_with('.') {
                    body.push('.');
                }
            }
            paragraphs.push(body);
        }

        let mut closing = String::new();
        if !source.skills.is_empty() {
            let top: Vec<&str> = source.skills.iter().take(6).map(|s| s.trim()).collect();
            closing.push_str(&format!("My core skills include {}. ", top.join(", ")));
        }
        closing.push_str(&format!(
            "I would welcome the chance to discuss how I can contribute to {company}."
        ));
        paragraphs.push(closing);

        Ok(letter(source, target, paragraphs))
    }
}
