//! Content Aggregator: folds per-section outcomes into one document.
//!
//! Successful sections are used as-is (and cached when freshly generated).
//! Anything else walks the fallback ladder after the controller has spent the
//! retry budget:
//!
//!   cached entry → direct transform of source data → omitted (recorded)
//!
//! Every section handed in comes out as a key in the document.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use tracing::{info, warn};

use crate::cache::ContentCache;
use crate::errors::GenerationError;
use crate::models::{SourceData, TargetContext};
use crate::progress::{ProgressSink, SectionState};
use crate::sections::{ContentOrigin, SectionContent, SectionGenerator, SectionResult};

/// Which strategy supplied a section's final content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Generation,
    Cache,
    Fallback,
    Omitted,
}

/// The structured output handed to the template engine. Every requested
/// section is a key in `sections`; an omitted one maps to empty content.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedDocument {
    pub(crate) job_id: String,
    pub(crate) sections: IndexMap<String, SectionContent>,
    pub(crate) provenance: IndexMap<String, Provenance>,
    pub(crate) warnings: Vec<String>,
    pub(crate) generated_at: DateTime<Utc>,
}

impl AggregatedDocument {
    pub(crate) fn new(job_id: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            sections: IndexMap::new(),
            provenance: IndexMap::new(),
            warnings: Vec::new(),
            generated_at: Utc::now(),
        }
    }

    pub(crate) fn put(&mut self, section: &str, content: SectionContent, provenance: Provenance) {
        self.sections.insert(section.to_string(), content);
        self.provenance.insert(section.to_string(), provenance);
    }

    pub(crate) fn omit(&mut self, section: &str, reason: String) {
        self.put(section, SectionContent::new(), Provenance::Omitted);
        self.warnings.push(reason);
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn sections(&self) -> &IndexMap<String, SectionContent> {
        &self.sections
    }

    pub fn section(&self, name: &str) -> Option<&SectionContent> {
        self.sections.get(name)
    }

    pub fn provenance(&self, name: &str) -> Option<Provenance> {
        self.provenance.get(name).copied()
    }

    pub fn provenance_map(&self) -> &IndexMap<String, Provenance> {
        &self.provenance
    }

    /// Human-readable notes for every omitted section; callers surface these.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn omitted_sections(&self) -> Vec<&str> {
        self.provenance
            .iter()
            .filter(|(_, p)| **p == Provenance::Omitted)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }
}

/// Final state of one section after the controller's retry loop.
pub enum SectionOutcome {
    Finished {
        generator: Arc<dyn SectionGenerator>,
        result: SectionResult,
    },
    /// Never run: the configuration says to leave it out.
    OmittedByConfig { section: String },
}

pub struct Aggregation {
    pub document: AggregatedDocument,
    /// Sections whose content came from ladder steps cache/direct/omit.
    pub laddered: Vec<String>,
}

pub struct ContentAggregator {
    cache: Option<ContentCache>,
}

impl ContentAggregator {
    pub fn new(cache: Option<ContentCache>) -> Self {
        Self { cache }
    }

    pub async fn aggregate(
        &self,
        outcomes: Vec<SectionOutcome>,
        source: &SourceData,
        target: &TargetContext,
        cache_allowed: bool,
        progress: &ProgressSink,
    ) -> Aggregation {
        let cache = if cache_allowed { self.cache.as_ref() } else { None };
        let mut document = AggregatedDocument::new(&target.job_id);
        let mut laddered = Vec::new();

        for outcome in outcomes {
            match outcome {
                SectionOutcome::OmittedByConfig { section } => {
                    info!("Section '{section}' omitted by configuration");
                    progress.emit(&section, SectionState::Omitted, 0);
                    document.omit(&section, format!("{section}: omitted by configuration"));
                }
                SectionOutcome::Finished { generator, result } => {
                    if let Some(content) = result.content.clone().filter(|_| result.is_success()) {
                        let provenance = match result.origin {
                            ContentOrigin::Cached => Provenance::Cache,
                            ContentOrigin::Generated => {
                                if let Some(cache) = cache {
                                    store(cache, &target.job_id, &result, &content).await;
                                }
                                Provenance::Generation
                            }
                        };
                        document.put(&result.section, content, provenance);
                        continue;
                    }

                    laddered.push(result.section.clone());
                    self.resolve_via_ladder(
                        generator.as_ref(),
                        &result,
                        source,
                        target,
                        cache,
                        progress,
                        &mut document,
                    )
                    .await;
                }
            }
        }

        Aggregation { document, laddered }
    }

    #[allow(clippy::too_many_arguments)]
    async fn resolve_via_ladder(
        &self,
        generator: &dyn SectionGenerator,
        result: &SectionResult,
        source: &SourceData,
        target: &TargetContext,
        cache: Option<&ContentCache>,
        progress: &ProgressSink,
        document: &mut AggregatedDocument,
    ) {
        let section = &result.section;

        if let Some(cache) = cache {
            if let Some(entry) = cache.load(&target.job_id, section).await {
                info!(
                    "Section '{section}' resolved from cache (generated {} by {})",
                    entry.generated_at, entry.generator
                );
                progress.emit(section, SectionState::ResolvedViaFallback, result.attempt);
                document.put(section, entry.content, Provenance::Cache);
                return;
            }
        }

        match generator.direct(source, target) {
            Ok(content) => {
                info!("Section '{section}' resolved by direct copy from source data");
                progress.emit(section, SectionState::ResolvedViaFallback, result.attempt);
                document.put(section, content, Provenance::Fallback);
            }
            Err(err) => {
                let reason = match &err {
                    GenerationError::SourceDataMissing(msg) => msg.clone(),
                    other => other.to_string(),
                };
                warn!("Section '{section}' omitted: {reason}");
                progress.emit(section, SectionState::Omitted, result.attempt);
                document.omit(section, format!("{section}: {reason}"));
            }
        }
    }
}

/// Cache failures are logged and dropped; they never affect the document.
async fn store(cache: &ContentCache, job_id: &str, result: &SectionResult, content: &SectionContent) {
    if let Err(e) = cache
        .save(job_id, &result.section, &result.generator, content)
        .await
    {
        warn!("Could not cache {job_id}/{}: {e}", result.section);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        sample_source, sample_target, Behavior, FailPoint, FakeGenerator, FlakyStorage,
    };
    use std::time::Duration;

    fn finished(generator: Arc<FakeGenerator>, result: SectionResult) -> SectionOutcome {
        let generator: Arc<dyn SectionGenerator> = generator;
        SectionOutcome::Finished { generator, result }
    }

    fn success(name: &str) -> SectionResult {
        SectionResult::success(
            name,
            "fake/v1",
            FakeGenerator::generated_content(name),
            ContentOrigin::Generated,
            1,
            Duration::from_millis(3),
        )
    }

    fn failed(name: &str) -> SectionResult {
        SectionResult::failure(
            name,
            "fake/v1",
            GenerationError::Validation("bad".to_string()),
            3,
            Duration::from_millis(3),
        )
    }

    #[tokio::test]
    async fn test_success_is_used_and_cached() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ContentCache::on_disk(dir.path());
        let aggregator = ContentAggregator::new(Some(cache.clone()));

        let aggregation = aggregator
            .aggregate(
                vec![finished(FakeGenerator::new("summary", Behavior::Succeed), success("summary"))],
                &sample_source(),
                &sample_target(),
                true,
                &ProgressSink::disabled(),
            )
            .await;

        let doc = aggregation.document;
        assert_eq!(doc.provenance("summary"), Some(Provenance::Generation));
        assert!(aggregation.laddered.is_empty());
        let entry = cache.load("job-42", "summary").await.unwrap();
        assert_eq!(entry.content, FakeGenerator::generated_content("summary"));
    }

    #[tokio::test]
    async fn test_failure_prefers_cache_over_direct() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ContentCache::on_disk(dir.path());
        let previous = SectionContent::new().with("text", "from an earlier run");
        cache.save("job-42", "summary", "g", &previous).await.unwrap();

        let aggregator = ContentAggregator::new(Some(cache));
        let aggregation = aggregator
            .aggregate(
                vec![finished(FakeGenerator::new("summary", Behavior::Invalid), failed("summary"))],
                &sample_source(),
                &sample_target(),
                true,
                &ProgressSink::disabled(),
            )
            .await;

        assert_eq!(aggregation.document.provenance("summary"), Some(Provenance::Cache));
        assert_eq!(aggregation.document.section("summary"), Some(&previous));
        assert_eq!(aggregation.laddered, vec!["summary".to_string()]);
    }

    #[tokio::test]
    async fn test_cache_not_allowed_goes_to_direct() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ContentCache::on_disk(dir.path());
        cache
            .save("job-42", "summary", "g", &SectionContent::new().with("text", "old"))
            .await
            .unwrap();

        let aggregator = ContentAggregator::new(Some(cache));
        let aggregation = aggregator
            .aggregate(
                vec![finished(FakeGenerator::new("summary", Behavior::Invalid), failed("summary"))],
                &sample_source(),
                &sample_target(),
                false,
                &ProgressSink::disabled(),
            )
            .await;

        assert_eq!(aggregation.document.provenance("summary"), Some(Provenance::Fallback));
        assert_eq!(
            aggregation.document.section("summary"),
            Some(&FakeGenerator::direct_content("summary"))
        );
    }

    #[tokio::test]
    async fn test_missing_source_is_omitted_with_warning() {
        let aggregator = ContentAggregator::new(None);
        let (sink, mut rx) = ProgressSink::channel();
        let aggregation = aggregator
            .aggregate(
                vec![finished(
                    FakeGenerator::without_source("education", Behavior::Fail),
                    failed("education"),
                )],
                &sample_source(),
                &sample_target(),
                true,
                &sink,
            )
            .await;

        let doc = aggregation.document;
        assert_eq!(doc.provenance("education"), Some(Provenance::Omitted));
        assert!(doc.section("education").unwrap().is_empty());
        assert_eq!(doc.omitted_sections(), vec!["education"]);
        assert_eq!(doc.warnings().len(), 1);
        assert_eq!(rx.try_recv().unwrap().state, SectionState::Omitted);
    }

    #[tokio::test]
    async fn test_configured_omission_keeps_key_and_is_not_laddered() {
        let aggregator = ContentAggregator::new(None);
        let aggregation = aggregator
            .aggregate(
                vec![
                    SectionOutcome::OmittedByConfig {
                        section: "cover_letter".to_string(),
                    },
                    finished(FakeGenerator::new("summary", Behavior::Succeed), success("summary")),
                ],
                &sample_source(),
                &sample_target(),
                true,
                &ProgressSink::disabled(),
            )
            .await;

        let keys: Vec<_> = aggregation.document.sections().keys().cloned().collect();
        assert_eq!(keys, vec!["cover_letter".to_string(), "summary".to_string()]);
        assert!(aggregation.laddered.is_empty());
    }

    #[tokio::test]
    async fn test_cache_write_failure_does_not_affect_document() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ContentCache::new(Arc::new(FlakyStorage::new(dir.path(), FailPoint::Blob)));
        let aggregator = ContentAggregator::new(Some(cache));
        let aggregation = aggregator
            .aggregate(
                vec![finished(FakeGenerator::new("skills", Behavior::Succeed), success("skills"))],
                &sample_source(),
                &sample_target(),
                true,
                &ProgressSink::disabled(),
            )
            .await;

        assert_eq!(
            aggregation.document.provenance("skills"),
            Some(Provenance::Generation)
        );
    }

    #[test]
    fn test_document_serializes_provenance_in_snake_case() {
        let mut doc = AggregatedDocument::new("job-42");
        doc.put("summary", SectionContent::new().with("text", "x"), Provenance::Fallback);
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["provenance"]["summary"], "fallback");
        assert_eq!(json["sections"]["summary"]["text"], "x");
    }
}
