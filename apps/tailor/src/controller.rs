//! Fallback/Retry Controller: the entry point for one document generation.
//!
//! Flow: parallel pass → retry failed sections (bounded) → aggregate with the
//! fallback ladder → if too many sections needed the ladder, discard the
//! result and regenerate the whole document in legacy mode.
//!
//! Per section:
//!   pending → generating → {success | validation_failed | timed_out | errored}
//!   retryable failure, budget left  → generating (next attempt)
//!   budget spent or source problem → resolved via ladder | omitted

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::aggregator::{AggregatedDocument, ContentAggregator, SectionOutcome};
use crate::cache::ContentCache;
use crate::config::EngineConfig;
use crate::errors::EngineError;
use crate::executor::{ParallelExecutor, SectionTask};
use crate::legacy::LegacyGenerator;
use crate::models::{SourceData, TargetContext};
use crate::progress::{ProgressSink, SectionState};
use crate::sections::{SectionGenerator, SectionResult, SectionStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    Parallel,
    Legacy,
}

/// What happens to a section after an attempt finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Succeeded,
    Retry { next_attempt: u32 },
    /// No retry left or none worth making; the section goes to the fallback ladder.
    Exhausted,
}

/// `result.attempt` is 1-based; a section gets at most `1 + retry_budget` attempts.
pub fn transition(result: &SectionResult, retry_budget: u32) -> Transition {
    let retryable = result.error.as_ref().map_or(true, |e| e.is_retryable());
    match result.status {
        SectionStatus::Success => Transition::Succeeded,
        _ if retryable && result.attempt <= retry_budget => Transition::Retry {
            next_attempt: result.attempt + 1,
        },
        _ => Transition::Exhausted,
    }
}

pub struct GenerationController {
    executor: ParallelExecutor,
    aggregator: ContentAggregator,
    legacy: LegacyGenerator,
    config: EngineConfig,
}

impl GenerationController {
    pub fn new(cache: Option<ContentCache>, config: EngineConfig) -> Self {
        Self {
            executor: ParallelExecutor::new(cache.clone(), &config),
            aggregator: ContentAggregator::new(cache),
            legacy: LegacyGenerator::new(&config),
            config,
        }
    }

    pub async fn generate_document(
        &self,
        generators: &[Arc<dyn SectionGenerator>],
        source: SourceData,
        target: TargetContext,
        progress: &ProgressSink,
    ) -> Result<(AggregatedDocument, GenerationMode), EngineError> {
        let generators = dedupe(generators);

        if source.is_empty() {
            warn!(
                "Source data for job {} is empty; skipping the parallel path",
                target.job_id
            );
            let document = self
                .legacy
                .generate(&generators, &source, &target, progress)?;
            return Ok((document, GenerationMode::Legacy));
        }

        let source = Arc::new(source);
        let target = Arc::new(target);

        for generator in &generators {
            progress.emit(&generator.spec().name, SectionState::Pending, 0);
        }

        let runnable: Vec<Arc<dyn SectionGenerator>> = generators
            .iter()
            .filter(|g| !self.config.is_omitted(&g.spec().name))
            .cloned()
            .collect();
        let mut finals = self.run_with_retries(&runnable, &source, &target, progress).await;

        let outcomes: Vec<SectionOutcome> = generators
            .iter()
            .map(|generator| {
                let name = &generator.spec().name;
                match finals.iter().position(|r| &r.section == name) {
                    Some(index) => SectionOutcome::Finished {
                        generator: Arc::clone(generator),
                        result: finals.swap_remove(index),
                    },
                    None => SectionOutcome::OmittedByConfig {
                        section: name.clone(),
                    },
                }
            })
            .collect();

        let aggregation = self
            .aggregator
            .aggregate(
                outcomes,
                &source,
                &target,
                self.config.cache_enabled,
                progress,
            )
            .await;

        let ratio = if runnable.is_empty() {
            0.0
        } else {
            aggregation.laddered.len() as f64 / runnable.len() as f64
        };

        if ratio > self.config.legacy_threshold {
            warn!(
                "{}/{} section(s) needed the fallback ladder ({:?}); switching job {} to legacy generation",
                aggregation.laddered.len(),
                runnable.len(),
                aggregation.laddered,
                target.job_id
            );
            let document = self
                .legacy
                .generate(&generators, &source, &target, progress)?;
            return Ok((document, GenerationMode::Legacy));
        }

        info!(
            "Document for job {} assembled in parallel mode ({} via fallback ladder)",
            target.job_id,
            aggregation.laddered.len()
        );
        Ok((aggregation.document, GenerationMode::Parallel))
    }

    /// Runs passes until every section has succeeded or spent its budget.
    /// Returns the last result of each section.
    async fn run_with_retries(
        &self,
        generators: &[Arc<dyn SectionGenerator>],
        source: &Arc<SourceData>,
        target: &Arc<TargetContext>,
        progress: &ProgressSink,
    ) -> Vec<SectionResult> {
        let mut finals: Vec<SectionResult> = Vec::with_capacity(generators.len());
        let mut pending: Vec<SectionTask> = generators
            .iter()
            .map(|g| SectionTask {
                generator: Arc::clone(g),
                attempt: 1,
            })
            .collect();

        while !pending.is_empty() {
            let results = self
                .executor
                .run(
                    pending.clone(),
                    Arc::clone(source),
                    Arc::clone(target),
                    self.config.section_timeout,
                    progress,
                )
                .await;

            let mut next = Vec::new();
            for (task, result) in pending.into_iter().zip(results) {
                match transition(&result, self.config.retry_budget) {
                    Transition::Retry { next_attempt } => {
                        info!(
                            "Retrying section '{}' (attempt {}/{})",
                            result.section,
                            next_attempt,
                            self.config.retry_budget + 1
                        );
                        next.push(SectionTask {
                            generator: task.generator,
                            attempt: next_attempt,
                        });
                    }
                    Transition::Exhausted => {
                        warn!(
                            "Section '{}' exhausted {} attempt(s); falling back",
                            result.section, task.attempt
                        );
                        finals.push(result);
                    }
                    Transition::Succeeded => finals.push(result),
                }
            }
            pending = next;
        }

        finals
    }
}

/// Section names are keys; a repeated name keeps its first generator.
fn dedupe(generators: &[Arc<dyn SectionGenerator>]) -> Vec<Arc<dyn SectionGenerator>> {
    let mut seen = HashSet::new();
    generators
        .iter()
        .filter(|g| {
            let fresh = seen.insert(g.spec().name.clone());
            if !fresh {
                warn!("Duplicate section '{}' ignored", g.spec().name);
            }
            fresh
        })
        .cloned()
        .collect()
}
