use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tailor::llm_client::{self, LlmClient};
use tailor::sections::default_generators;
use tailor::{
    AggregatedDocument, Config, ContentCache, GenerationController, GenerationMode, ProgressSink,
    ProgressTracker, SourceData, TargetContext,
};

const USAGE: &str = "usage:\n  tailor <source.json> <target.json>\n  tailor clear <job_id> [section]";

#[derive(Serialize)]
struct Output<'a> {
    mode: GenerationMode,
    #[serde(flatten)]
    document: &'a AggregatedDocument,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting Tailor v{}", env!("CARGO_PKG_VERSION"));

    let args: Vec<String> = std::env::args().skip(1).collect();
    let cache = ContentCache::on_disk(config.cache_dir.clone());

    match args.as_slice() {
        [cmd, job_id, rest @ ..] if cmd == "clear" && rest.len() <= 1 => {
            let section = rest.first().map(String::as_str);
            cache
                .clear(job_id, section)
                .await
                .with_context(|| format!("failed to clear cache for job {job_id}"))?;
            info!("Cache cleared for job {job_id} ({})", section.unwrap_or("all sections"));
            Ok(())
        }
        [source_path, target_path] => generate(config, cache, source_path, target_path).await,
        _ => bail!(USAGE),
    }
}

async fn generate(
    config: Config,
    cache: ContentCache,
    source_path: &str,
    target_path: &str,
) -> Result<()> {
    let source: SourceData = read_json(source_path).await?;
    let target: TargetContext = read_json(target_path).await?;

    let llm = LlmClient::new(config.anthropic_api_key.clone())
        .context("failed to build LLM client")?;
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    let generators = default_generators(Arc::new(llm), &config.engine);
    let controller = GenerationController::new(
        config.engine.cache_enabled.then_some(cache),
        config.engine.clone(),
    );

    let (progress, rx) = ProgressSink::channel();
    let tracker = ProgressTracker::spawn(rx);

    let (document, mode) = controller
        .generate_document(&generators, source, target, &progress)
        .await
        .context("document generation failed")?;

    drop(progress);
    for (section, state) in tracker.finish().await {
        info!("Section '{section}' finished as {:?} (attempt {})", state.state, state.attempt);
    }

    info!(
        "Document for job {} generated at {} in {:?} mode",
        document.job_id(),
        document.generated_at().to_rfc3339(),
        mode
    );
    for section in document.omitted_sections() {
        warn!("Section '{section}' omitted from the document");
    }
    for warning in document.warnings() {
        warn!("{warning}");
    }

    let output = serde_json::to_string_pretty(&Output {
        mode,
        document: &document,
    })?;
    println!("{output}");
    Ok(())
}

async fn read_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}
