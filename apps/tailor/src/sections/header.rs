//! Header: name and contact details, copied straight from the source.

use async_trait::async_trait;

use crate::errors::GenerationError;
use crate::models::{SourceData, TargetContext};
use crate::sections::generator::SectionGenerator;
use crate::sections::spec::{SectionContent, SectionSpec};
use crate::sections::HEADER;

pub struct HeaderGenerator {
    spec: SectionSpec,
}

impl HeaderGenerator {
    pub fn new() -> Self {
        Self {
            spec: SectionSpec::copied(HEADER),
        }
    }
}

impl Default for HeaderGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SectionGenerator for HeaderGenerator {
    fn spec(&self) -> &SectionSpec {
        &self.spec
    }

    fn identity(&self) -> &str {
        "header/copy-v1"
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
        let candidate = &source.candidate;
        let name = candidate.name.trim();
        if name.is_empty() {
            return Err(GenerationError::SourceDataMissing(
                "candidate name is empty".to_string(),
            ));
        }

        let contact: Vec<&str> = [&candidate.email, &candidate.phone, &candidate.location]
            .into_iter()
            .filter_map(|v| v.as_deref().map(str::trim))
            .filter(|v| !v.is_empty())
            .collect();

        Ok(SectionContent::new()
            .with("name", name)
            .with("contact", contact)
            .with("links", candidate.links.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sample_source, sample_target};

    #[test]
    fn test_header_copies_contact_fields() {
        let content = HeaderGenerator::new()
            .direct(&sample_source(), &sample_target())
            .unwrap();
        assert_eq!(content.get("name").unwrap(), "Ada Lovelace");
        assert_eq!(content.get("contact").unwrap().as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_header_requires_name() {
        let mut source = sample_source();
        source.candidate.name = "   ".to_string();
        let err = HeaderGenerator::new()
            .direct(&source, &sample_target())
            .unwrap_err();
        assert!(matches!(err, GenerationError::SourceDataMissing(_)));
    }

    #[test]
    fn test_header_does_not_use_generation() {
        assert!(!HeaderGenerator::new().spec().uses_generation);
    }
}
