use std::time::Duration;

use serde::Serialize;

use crate::errors::GenerationError;
use crate::progress::SectionState;
use crate::sections::spec::SectionContent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionStatus {
    Success,
    ValidationFailed,
    TimedOut,
    Errored,
}

impl SectionStatus {
    pub fn from_error(err: &GenerationError) -> Self {
        match err {
            GenerationError::Validation(_) => SectionStatus::ValidationFailed,
            GenerationError::Timeout(_) => SectionStatus::TimedOut,
            GenerationError::Transport(_)
            | GenerationError::SourceDataMissing(_)
            | GenerationError::MalformedSource(_)
            | GenerationError::TaskPanicked(_) => SectionStatus::Errored,
        }
    }

    pub fn as_state(&self) -> SectionState {
        match self {
            SectionStatus::Success => SectionState::Succeeded,
            SectionStatus::ValidationFailed => SectionState::ValidationFailed,
            SectionStatus::TimedOut => SectionState::TimedOut,
            SectionStatus::Errored => SectionState::Errored,
        }
    }
}

/// Where a successful result's content came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentOrigin {
    Generated,
    Cached,
}

/// Outcome of one attempt at one section. Built once, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionResult {
    pub section: String,
    pub status: SectionStatus,
    /// Present iff status is `Success`.
    pub content: Option<SectionContent>,
    pub origin: ContentOrigin,
    /// 1-based attempt number that produced this result.
    pub attempt: u32,
    pub duration: Duration,
    /// Present iff status is not `Success`.
    pub error: Option<GenerationError>,
    pub generator: String,
}

impl SectionResult {
    pub fn success(
        section: &str,
        generator: &str,
        content: SectionContent,
        origin: ContentOrigin,
        attempt: u32,
        duration: Duration,
    ) -> Self {
        Self {
            section: section.to_string(),
            status: SectionStatus::Success,
            content: Some(content),
            origin,
            attempt,
            duration,
            error: None,
            generator: generator.to_string(),
        }
    }

    pub fn failure(
        section: &str,
        generator: &str,
        error: GenerationError,
        attempt: u32,
        duration: Duration,
    ) -> Self {
        Self {
            section: section.to_string(),
            status: SectionStatus::from_error(&error),
            content: None,
            origin: ContentOrigin::Generated,
            attempt,
            duration,
            error: Some(error),
            generator: generator.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == SectionStatus::Success
    }
}
