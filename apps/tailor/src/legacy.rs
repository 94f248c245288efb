//! Legacy generation: the terminal fallback.
//!
//! One sequential pass over the whole document using each section's direct
//! transform: no backend calls, no per-section isolation, no timeouts. It
//! cannot fail on content quality; it fails only when the source data is
//! absent or malformed, and then the caller hears about it.

use std::sync::Arc;

use tracing::{info, warn};

use crate::aggregator::{AggregatedDocument, Provenance};
use crate::config::EngineConfig;
use crate::errors::{EngineError, GenerationError};
use crate::models::{SourceData, TargetContext};
use crate::progress::{ProgressSink, SectionState};
use crate::sections::SectionGenerator;

pub struct LegacyGenerator {
    omit_sections: Vec<String>,
}

impl LegacyGenerator {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            omit_sections: config.omit_sections.clone(),
        }
    }

    pub fn generate(
        &self,
        generators: &[Arc<dyn SectionGenerator>],
        source: &SourceData,
        target: &TargetContext,
        progress: &ProgressSink,
    ) -> Result<AggregatedDocument, EngineError> {
        if source.is_empty() {
            return Err(EngineError::SourceDataMissing(format!(
                "source data for job {} is empty",
                target.job_id
            )));
        }

        info!(
            "Legacy generation for job {} over {} section(s)",
            target.job_id,
            generators.len()
        );
        let mut document = AggregatedDocument::new(&target.job_id);

        for generator in generators {
            let section = generator.spec().name.as_str();
            if self.omit_sections.iter().any(|s| s == section) {
                progress.emit(section, SectionState::Omitted, 0);
                document.omit(section, format!("{section}: omitted by configuration"));
                continue;
            }

            match generator.direct(source, target) {
                Ok(content) => {
                    progress.emit(section, SectionState::ResolvedViaFallback, 0);
                    document.put(section, content, Provenance::Fallback);
                }
                Err(GenerationError::SourceDataMissing(reason)) => {
                    warn!("Legacy: section '{section}' omitted: {reason}");
                    progress.emit(section, SectionState::Omitted, 0);
                    document.omit(section, format!("{section}: {reason}"));
                }
                Err(other) => {
                    return Err(EngineError::SystemFailure(format!(
                        "section '{section}': {other}"
                    )));
                }
            }
        }

        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sections::default_generators;
    use crate::test_support::{sample_source, sample_target, ScriptedBackend};

    fn generators() -> Vec<Arc<dyn SectionGenerator>> {
        default_generators(Arc::new(ScriptedBackend::failing()), &EngineConfig::default())
    }

    #[test]
    fn test_legacy_builds_every_section_without_backend() {
        let backend = Arc::new(ScriptedBackend::failing());
        let generators = default_generators(backend.clone(), &EngineConfig::default());
        let legacy = LegacyGenerator::new(&EngineConfig::default());

        let doc = legacy
            .generate(&generators, &sample_source(), &sample_target(), &ProgressSink::disabled())
            .unwrap();

        assert_eq!(doc.sections().len(), 6);
        assert!(doc
            .provenance_map()
            .values()
            .all(|p| *p == Provenance::Fallback));
        assert_eq!(backend.calls(), 0);
    }

    #[test]
    fn test_legacy_omits_section_without_material() {
        let mut source = sample_source();
        source.education.clear();
        let doc = LegacyGenerator::new(&EngineConfig::default())
            .generate(&generators(), &source, &sample_target(), &ProgressSink::disabled())
            .unwrap();

        assert_eq!(doc.provenance("education"), Some(Provenance::Omitted));
        assert_eq!(doc.omitted_sections(), vec!["education"]);
    }

    #[test]
    fn test_legacy_fails_on_empty_source() {
        let err = LegacyGenerator::new(&EngineConfig::default())
            .generate(
                &generators(),
                &SourceData::default(),
                &sample_target(),
                &ProgressSink::disabled(),
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::SourceDataMissing(_)));
    }

    #[test]
    fn test_legacy_fails_hard_on_malformed_source() {
        let mut source = sample_source();
        source.experience[0].title = String::new();
        let err = LegacyGenerator::new(&EngineConfig::default())
            .generate(&generators(), &source, &sample_target(), &ProgressSink::disabled())
            .unwrap_err();
        assert!(matches!(err, EngineError::SystemFailure(msg) if msg.contains("experience")));
    }

    #[test]
    fn test_legacy_respects_configured_omissions() {
        let config = EngineConfig {
            omit_sections: vec!["cover_letter".to_string()],
            ..Default::default()
        };
        let doc = LegacyGenerator::new(&config)
            .generate(&generators(), &sample_source(), &sample_target(), &ProgressSink::disabled())
            .unwrap();
        assert_eq!(doc.provenance("cover_letter"), Some(Provenance::Omitted));
        assert!(doc.section("cover_letter").is_some());
    }
}
