//! Shared fixtures and scripted collaborators for unit tests.

use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::cache::{CacheKey, CacheStorage, FileCacheStorage};
use crate::errors::GenerationError;
use crate::llm_client::{CompletionRequest, GenerationBackend, LlmError};
use crate::models::{CandidateProfile, EducationEntry, ExperienceEntry, SourceData, TargetContext};
use crate::sections::{SectionContent, SectionGenerator, SectionSpec};

pub fn sample_source() -> SourceData {
    SourceData {
        candidate: CandidateProfile {
            name: "Ada Lovelace".to_string(),
            email: Some("ada@example.com".to_string()),
            phone: None,
            location: Some("London".to_string()),
            links: vec!["https://github.com/ada".to_string()],
        },
        summary: Some(
            "Systems engineer with eight years of Rust and distributed storage work.".to_string(),
        ),
        skills: ["Rust", "Tokio", "PostgreSQL", "Kubernetes", "Go"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        experience: vec![
            ExperienceEntry {
                title: "Senior Engineer".to_string(),
                company: "Analytical Engines".to_string(),
                start: "2021".to_string(),
                end: None,
                highlights: vec![
                    "Built the job scheduler in Rust".to_string(),
                    "Led the storage migration to PostgreSQL".to_string(),
                ],
            },
            ExperienceEntry {
                title: "Engineer".to_string(),
                company: "Difference Co".to_string(),
                start: "2017".to_string(),
                end: Some("2021".to_string()),
                highlights: vec!["Maintained Go services".to_string()],
            },
        ],
        education: vec![EducationEntry {
            institution: "University of London".to_string(),
            degree: "BSc Mathematics".to_string(),
            year: Some("2015".to_string()),
        }],
    }
}

pub fn sample_target() -> TargetContext {
    TargetContext {
        job_id: "job-42".to_string(),
        job_title: "Staff Rust Engineer".to_string(),
        company: "Babbage Labs".to_string(),
        description: "Own the storage engine. Rust and Kubernetes required.".to_string(),
        keywords: vec!["Kubernetes".to_string(), "rust".to_string()],
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Generation backend
// ────────────────────────────────────────────────────────────────────────────

enum Reply {
    Text(String),
    Fail,
}

/// Backend that returns the same canned reply to every request.
pub struct ScriptedBackend {
    reply: Reply,
    calls: AtomicU32,
    last_prompt: Mutex<Option<String>>,
}

impl ScriptedBackend {
    pub fn always(text: &str) -> Self {
        Self {
            reply: Reply::Text(text.to_string()),
            calls: AtomicU32::new(0),
            last_prompt: Mutex::new(None),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: Reply::Fail,
            calls: AtomicU32::new(0),
            last_prompt: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.last_prompt.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_prompt.lock().unwrap() = Some(request.prompt.clone());
        match &self.reply {
            Reply::Text(text) => Ok(text.clone()),
            Reply::Fail => Err(LlmError::Api {
                status: 503,
                message: "overloaded".to_string(),
            }),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Section generator
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Behavior {
    Succeed,
    /// Always returns a validation failure.
    Invalid,
    /// Always returns a transport error.
    Fail,
    /// Always reports missing source material.
    NoSource,
    /// Sleeps far past any test timeout.
    Hang,
    Panic,
    /// Validation failure for the first N attempts, then success.
    InvalidTimes(u32),
}

/// Generator whose AI path follows a fixed script and counts attempts.
pub struct FakeGenerator {
    spec: SectionSpec,
    behavior: Behavior,
    has_source: bool,
    attempts: AtomicU32,
}

impl FakeGenerator {
    pub fn new(name: &str, behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            spec: SectionSpec::generated(name, Default::default()),
            behavior,
            has_source: true,
            attempts: AtomicU32::new(0),
        })
    }

    /// Direct path reports missing source data.
    pub fn without_source(name: &str, behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            spec: SectionSpec::generated(name, Default::default()),
            behavior,
            has_source: false,
            attempts: AtomicU32::new(0),
        })
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn generated_content(name: &str) -> SectionContent {
        SectionContent::new().with("text", format!("generated {name}"))
    }

    pub fn direct_content(name: &str) -> SectionContent {
        SectionContent::new().with("text", format!("direct {name}"))
    }
}

#[async_trait]
impl SectionGenerator for FakeGenerator {
    fn spec(&self) -> &SectionSpec {
        &self.spec
    }

    fn identity(&self) -> &str {
        "fake/v1"
    }

    async fn produce(
        &self,
        _source: &SourceData,
        _target: &TargetContext,
    ) -> Result<SectionContent, GenerationError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        match self.behavior {
            Behavior::Succeed => Ok(Self::generated_content(&self.spec.name)),
            Behavior::Invalid => Err(GenerationError::Validation("always invalid".to_string())),
            Behavior::Fail => Err(GenerationError::Transport("connection reset".to_string())),
            Behavior::NoSource => Err(GenerationError::SourceDataMissing(format!(
                "no material for {}",
                self.spec.name
            ))),
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(Self::generated_content(&self.spec.name))
            }
            Behavior::Panic => panic!("generator for {} exploded", self.spec.name),
            Behavior::InvalidTimes(n) if attempt <= n => {
                Err(GenerationError::Validation(format!("invalid on attempt {attempt}")))
            }
            Behavior::InvalidTimes(_) => Ok(Self::generated_content(&self.spec.name)),
        }
    }

    fn direct(
        &self,
        _source: &SourceData,
        _target: &TargetContext,
    ) -> Result<SectionContent, GenerationError> {
        if self.has_source {
            Ok(Self::direct_content(&self.spec.name))
        } else {
            Err(GenerationError::SourceDataMissing(format!(
                "nothing for {}",
                self.spec.name
            )))
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Cache storage
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FailPoint {
    Never,
    /// Content blob writes fail before touching disk.
    Blob,
    /// Record writes fail after the blob is durable.
    Record,
}

/// File storage with an injectable write failure.
pub struct FlakyStorage {
    inner: FileCacheStorage,
    fail: Mutex<FailPoint>,
}

impl FlakyStorage {
    pub fn new(root: &Path, fail: FailPoint) -> Self {
        Self {
            inner: FileCacheStorage::new(root),
            fail: Mutex::new(fail),
        }
    }

    pub fn set_fail_point(&self, fail: FailPoint) {
        *self.fail.lock().unwrap() = fail;
    }

    fn fails_at(&self, point: FailPoint) -> bool {
        *self.fail.lock().unwrap() == point
    }
}

fn injected() -> io::Error {
    io::Error::new(io::ErrorKind::Other, "injected failure")
}

#[async_trait]
impl CacheStorage for FlakyStorage {
    async fn write_blob(&self, key: &CacheKey, blob: &str, bytes: &[u8]) -> io::Result<()> {
        if self.fails_at(FailPoint::Blob) {
            return Err(injected());
        }
        self.inner.write_blob(key, blob, bytes).await
    }

    async fn read_blob(&self, key: &CacheKey, blob: &str) -> io::Result<Vec<u8>> {
        self.inner.read_blob(key, blob).await
    }

    async fn remove_blob(&self, key: &CacheKey, blob: &str) -> io::Result<()> {
        self.inner.remove_blob(key, blob).await
    }

    async fn write_record(&self, key: &CacheKey, bytes: &[u8]) -> io::Result<()> {
        if self.fails_at(FailPoint::Record) {
            return Err(injected());
        }
        self.inner.write_record(key, bytes).await
    }

    async fn read_record(&self, key: &CacheKey) -> io::Result<Option<Vec<u8>>> {
        self.inner.read_record(key).await
    }

    async fn remove_section(&self, key: &CacheKey) -> io::Result<()> {
        self.inner.remove_section(key).await
    }

    async fn remove_job(&self, job_id: &str) -> io::Result<()> {
        self.inner.remove_job(job_id).await
    }
}
