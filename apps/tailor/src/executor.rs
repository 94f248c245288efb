//! Parallel Executor: one spawned task per section, each bounded by a timeout.
//!
//! `run` is a barrier: it returns once every task is terminal. Progress events
//! go out as each task transitions, so observers see partial completion in
//! real time. A task that times out, fails or panics yields a failed
//! `SectionResult` for its own section only.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::cache::ContentCache;
use crate::config::EngineConfig;
use crate::errors::GenerationError;
use crate::models::{SourceData, TargetContext};
use crate::progress::{ProgressSink, SectionState};
use crate::sections::{ContentOrigin, SectionGenerator, SectionResult};

/// One unit of work for a pass: a generator and the attempt number it is on.
#[derive(Clone)]
pub struct SectionTask {
    pub generator: Arc<dyn SectionGenerator>,
    /// 1-based.
    pub attempt: u32,
}

pub struct ParallelExecutor {
    cache: Option<ContentCache>,
    read_cache: bool,
}

impl ParallelExecutor {
    pub fn new(cache: Option<ContentCache>, config: &EngineConfig) -> Self {
        Self {
            cache,
            read_cache: config.cache_enabled && !config.force_regenerate,
        }
    }

    pub async fn run(
        &self,
        tasks: Vec<SectionTask>,
        source: Arc<SourceData>,
        target: Arc<TargetContext>,
        per_task_timeout: Duration,
        progress: &ProgressSink,
    ) -> Vec<SectionResult> {
        info!(
            "Running {} section task(s) with a {}ms timeout",
            tasks.len(),
            per_task_timeout.as_millis()
        );
        let started = Instant::now();

        let cache = if self.read_cache { self.cache.clone() } else { None };
        let mut handles = Vec::with_capacity(tasks.len());

        for task in tasks {
            let name = task.generator.spec().name.clone();
            let identity = task.generator.identity().to_string();
            let attempt = task.attempt;

            let source = Arc::clone(&source);
            let target = Arc::clone(&target);
            let cache = cache.clone();
            let progress_task = progress.clone();

            let handle = tokio::spawn(async move {
                progress_task.emit(&task.generator.spec().name, SectionState::Generating, attempt);
                let task_started = Instant::now();

                let outcome = tokio::time::timeout(
                    per_task_timeout,
                    run_task(&task, &source, &target, cache.as_ref()),
                )
                .await;

                let result = match outcome {
                    Ok(result) => result,
                    Err(_) => SectionResult::failure(
                        &task.generator.spec().name,
                        task.generator.identity(),
                        GenerationError::Timeout(per_task_timeout),
                        attempt,
                        task_started.elapsed(),
                    ),
                };

                progress_task.emit(&result.section, result.status.as_state(), attempt);
                result
            });
            handles.push((name, identity, attempt, handle));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (name, identity, attempt, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(join_err) => {
                    warn!("Section '{name}' task aborted: {join_err}");
                    progress.emit(&name, SectionState::Errored, attempt);
                    SectionResult::failure(
                        &name,
                        &identity,
                        GenerationError::TaskPanicked(join_err.to_string()),
                        attempt,
                        Duration::ZERO,
                    )
                }
            };

            match &result.error {
                None => debug!(
                    "Section '{}' succeeded on attempt {} ({:?}, {}ms)",
                    result.section,
                    attempt,
                    result.origin,
                    result.duration.as_millis()
                ),
                Some(err) => warn!(
                    "Section '{}' attempt {} ended {:?}: {err}",
                    result.section, attempt, result.status
                ),
            }
            results.push(result);
        }

        info!(
            "Pass finished: {}/{} section(s) succeeded in {}ms",
            results.iter().filter(|r| r.is_success()).count(),
            results.len(),
            started.elapsed().as_millis()
        );
        results
    }
}

/// Cache first; on a miss, one generator attempt.
async fn run_task(
    task: &SectionTask,
    source: &SourceData,
    target: &TargetContext,
    cache: Option<&ContentCache>,
) -> SectionResult {
    let name = &task.generator.spec().name;
    if let Some(cache) = cache {
        let lookup_started = Instant::now();
        if let Some(entry) = cache.load(&target.job_id, name).await {
            debug!("Cache hit for {}/{name}", target.job_id);
            return SectionResult::success(
                name,
                &entry.generator,
                entry.content,
                ContentOrigin::Cached,
                task.attempt,
                lookup_started.elapsed(),
            );
        }
    }
    task.generator.generate(source, target, task.attempt).await
}
