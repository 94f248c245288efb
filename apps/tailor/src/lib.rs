pub mod aggregator;
pub mod cache;
pub mod config;
pub mod controller;
pub mod errors;
pub mod executor;
pub mod legacy;
pub mod llm_client;
pub mod models;
pub mod progress;
pub mod sections;

#[cfg(test)]
mod test_support;

pub use aggregator::{AggregatedDocument, Provenance};
pub use cache::{CacheEntry, ContentCache};
pub use config::{Config, EngineConfig};
pub use controller::{GenerationController, GenerationMode};
pub use errors::{CacheError, EngineError, GenerationError};
pub use models::{SourceData, TargetContext};
pub use progress::{ProgressEvent, ProgressSink, ProgressTracker, SectionState};
