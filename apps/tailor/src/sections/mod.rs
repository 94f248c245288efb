// Section generators: one per résumé section, each with its own constraints.
// All LLM calls go through llm_client::GenerationBackend.

pub mod cover_letter;
pub mod education;
pub mod experience;
pub mod generator;
pub mod header;
pub mod prompts;
pub mod result;
pub mod skills;
pub mod spec;
pub mod summary;

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::llm_client::GenerationBackend;

pub use generator::SectionGenerator;
pub use result::{ContentOrigin, SectionResult, SectionStatus};
pub use spec::{SectionConstraints, SectionContent, SectionSpec};

pub const HEADER: &str = "header";
pub const SUMMARY: &str = "summary";
pub const SKILLS: &str = "skills";
pub const EXPERIENCE: &str = "experience";
pub const EDUCATION: &str = "education";
pub const COVER_LETTER: &str = "cover_letter";

/// The standard résumé + cover letter section set, in document order.
pub fn default_generators(
    backend: Arc<dyn GenerationBackend>,
    config: &EngineConfig,
) -> Vec<Arc<dyn SectionGenerator>> {
    vec![
        Arc::new(header::HeaderGenerator::new()),
        Arc::new(summary::SummaryGenerator::new(backend.clone())),
        Arc::new(skills::SkillsGenerator::new(backend.clone(), config.skills_count)),
        Arc::new(experience::ExperienceGenerator::new(backend.clone())),
        Arc::new(education::EducationGenerator::new()),
        Arc::new(cover_letter::CoverLetterGenerator::new(backend)),
    ]
}
