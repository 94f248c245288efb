//! Skills: exactly N skills, ordered by relevance to the job.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::errors::GenerationError;
use crate::llm_client::{CompletionRequest, GenerationBackend};
use crate::models::{SourceData, TargetContext};
use crate::sections::generator::{complete_json, render_prompt, SectionGenerator};
use crate::sections::prompts::{SECTION_SYSTEM, SKILLS_PROMPT_TEMPLATE};
use crate::sections::spec::{SectionConstraints, SectionContent, SectionSpec};
use crate::sections::SKILLS;

const MAX_ITEM_CHARS: usize = 40;

#[derive(Debug, Deserialize)]
struct SkillsReply {
    skills: Vec<String>,
}

pub struct SkillsGenerator {
    spec: SectionSpec,
    count: usize,
    backend: Arc<dyn GenerationBackend>,
}

impl SkillsGenerator {
    pub fn new(backend: Arc<dyn GenerationBackend>, count: usize) -> Self {
        Self {
            spec: SectionSpec::generated(
                SKILLS,
                SectionConstraints::exact_items(count, MAX_ITEM_CHARS),
            ),
            count,
            backend,
        }
    }
}

#[async_trait]
impl SectionGenerator for SkillsGenerator {
    fn spec(&self) -> &SectionSpec {
        &self.spec
    }

    fn identity(&self) -> &str {
        "skills/llm-v1"
    }

    async fn produce(
        &self,
        source: &SourceData,
        target: &TargetContext,
    ) -> Result<SectionContent, GenerationError> {
        if source.skills.is_empty() {
            return Err(GenerationError::SourceDataMissing("no skills listed".to_string()));
        }

        let prompt = render_prompt(
            SKILLS_PROMPT_TEMPLATE,
            source,
            target,
            &[
                ("count", self.count.to_string()),
                ("max_item_chars", MAX_ITEM_CHARS.to_string()),
            ],
        )?;
        let reply: SkillsReply = complete_json(
            self.backend.as_ref(),
            &CompletionRequest {
                system: SECTION_SYSTEM.to_string(),
                prompt,
                max_tokens: 512,
            },
        )
        .await?;

        let skills: Vec<String> = reply.skills.iter().map(|s| s.trim().to_string()).collect();
        self.spec.constraints.check_items("skills", &skills)?;

        let mut seen = HashSet::new();
        if let Some(dup) = skills.iter().find(|s| !seen.insert(s.to_lowercase())) {
            return Err(GenerationError::Validation(format!(
                "skills contains a duplicate: {dup}"
            )));
        }

        Ok(SectionContent::new().with("items", skills))
    }

    /// Source skills matching a job keyword first, then the rest in source
    /// order, deduplicated and capped at N. May return fewer than N.
    fn direct(
        &self,
        source: &SourceData,
        target: &TargetContext,
    ) -> Result<SectionContent, GenerationError> {
        let keywords: HashSet<String> = target.keywords.iter().map(|k| k.to_lowercase()).collect();

        let (mut matched, rest): (Vec<&String>, Vec<&String>) = source
            .skills
            .iter()
            .filter(|s| !s.trim().is_empty())
            .partition(|s| keywords.contains(&s.trim().to_lowercase()));
        matched.extend(rest);

        let mut seen = HashSet::new();
        let items: Vec<String> = matched
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| seen.insert(s.to_lowercase()))
            .take(self.count)
            .collect();

        if items.is_empty() {
            return Err(GenerationError::SourceDataMissing("no skills listed".to_string()));
        }
        Ok(SectionContent::new().with("items", items))
    }
}
