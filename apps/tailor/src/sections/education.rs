use async_trait::async_trait;
use serde_json::json;

use crate::errors::GenerationError;
use crate::models::{SourceData, TargetContext};
use crate::sections::generator::SectionGenerator;
use crate::sections::spec::{SectionContent, SectionSpec};
use crate::sections::EDUCATION;

/// Education is never rewritten: degrees and institutions are copied verbatim.
pub struct EducationGenerator {
    spec: SectionSpec,
}

impl EducationGenerator {
    pub fn new() -> Self {
        Self {
            spec: SectionSpec::copied(EDUCATION),
        }
    }
}

impl Default for EducationGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SectionGenerator for EducationGenerator {
    fn spec(&self) -> &SectionSpec {
        &self.spec
    }

    fn identity(&self) -> &str {
        "education/copy-v1"
    }

    async fn produce(
        &self,
        source: &SourceData,
        target: &TargetContext,
    ) -> Result<SectionContent, GenerationError> {
        self.direct(source, target)
    }

    fn direct(
        &self,
        source: &SourceData,
        _target: &TargetContext,
    ) -> Result<SectionContent, GenerationError> {
        if source.education.is_empty() {
            return Err(GenerationError::SourceDataMissing(
                "no education entries".to_string(),
            ));
        }

        let mut entries = Vec::with_capacity(source.education.len());
        for entry in &source.education {
            if entry.institution.trim().is_empty() {
                return Err(GenerationError::MalformedSource(format!(
                    "education entry '{}' has no institution",
                    entry.degree
                )));
            }
            entries.push(json!({
                "degree": entry.degree.trim(),
                "institution": entry.institution.trim(),
                "year": entry.year,
            }));
        }

        Ok(SectionContent::new().with("entries", entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sample_source, sample_target};

    #[test]
    fn test_copies_entries() {
        let content = EducationGenerator::new()
            .direct(&sample_source(), &sample_target())
            .unwrap();
        let entries = content.get("entries").unwrap().as_array().unwrap();
        assert_eq!(entries[0]["institution"], "University of London");
        assert_eq!(entries[0]["year"], "2015");
    }

    #[test]
    fn test_missing_education() {
        let mut source = sample_source();
        source.education.clear();
        let err = EducationGenerator::new()
            .direct(&source, &sample_target())
            .unwrap_err();
        assert!(matches!(err, GenerationError::SourceDataMissing(_)));
    }
}
