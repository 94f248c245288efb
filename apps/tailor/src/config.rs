use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub anthropic_api_key: String,
    pub cache_dir: PathBuf,
    pub engine: EngineConfig,
    pub rust_log: String,
}

/// Orchestration knobs. Passed explicitly into the controller, executor and
/// aggregator at construction; nothing reads these from globals.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub section_timeout: Duration,
    /// Retries per section after the first attempt.
    pub retry_budget: u32,
    /// Fraction of sections resolved via the fallback ladder above which the
    /// whole document is regenerated in legacy mode.
    pub legacy_threshold: f64,
    pub cache_enabled: bool,
    /// Skip cache reads; successful generations are still written.
    pub force_regenerate: bool,
    pub omit_sections: Vec<String>,
    pub skills_count: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            section_timeout: Duration::from_secs(30),
            retry_budget: 2,
            legacy_threshold: 0.5,
            cache_enabled: true,
            force_regenerate: false,
            omit_sections: Vec::new(),
            skills_count: 10,
        }
    }
}

impl EngineConfig {
    pub fn is_omitted(&self, section: &str) -> bool {
        self.omit_sections.iter().any(|s| s == section)
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let defaults = EngineConfig::default();
        let engine = EngineConfig {
            section_timeout: Duration::from_millis(parse_env(
                "SECTION_TIMEOUT_MS",
                defaults.section_timeout.as_millis() as u64,
            )?),
            retry_budget: parse_env("SECTION_RETRIES", defaults.retry_budget)?,
            legacy_threshold: parse_env("LEGACY_FALLBACK_THRESHOLD", defaults.legacy_threshold)?,
            cache_enabled: parse_env("CACHE_ENABLED", defaults.cache_enabled)?,
            force_regenerate: parse_env("FORCE_REGENERATE", defaults.force_regenerate)?,
            omit_sections: std::env::var("OMIT_SECTIONS")
                .map(|v| parse_list(&v))
                .unwrap_or_default(),
            skills_count: parse_env("SKILLS_COUNT", defaults.skills_count)?,
        };

        if !(0.0..=1.0).contains(&engine.legacy_threshold) {
            anyhow::bail!(
                "LEGACY_FALLBACK_THRESHOLD must be between 0 and 1, got {}",
                engine.legacy_threshold
            );
        }

        Ok(Config {
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            cache_dir: std::env::var("CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".tailor-cache")),
            engine,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value: '{raw}'")),
        Err(_) => Ok(default),
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
