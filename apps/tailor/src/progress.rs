//! Progress events: out-of-band visibility into a generation run.
//!
//! The executor and aggregator push `ProgressEvent`s into an unbounded channel;
//! the `ProgressTracker` drains it and keeps the latest state per section for
//! polling observers. The channel is unbounded so a slow observer can never
//! cause a terminal transition to be dropped.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionState {
    Pending,
    Generating,
    Succeeded,
    ValidationFailed,
    TimedOut,
    Errored,
    ResolvedViaFallback,
    Omitted,
}

impl SectionState {
    /// No further transitions happen for the section once it is here.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            SectionState::Succeeded | SectionState::ResolvedViaFallback | SectionState::Omitted
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub section: String,
    pub state: SectionState,
    pub attempt: u32,
    pub at: DateTime<Utc>,
}

/// Sending half handed to the executor. Cheap to clone, one per task.
#[derive(Debug, Clone)]
pub struct ProgressSink {
    tx: Option<mpsc::UnboundedSender<ProgressEvent>>,
}

impl ProgressSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A sink that discards every event.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn emit(&self, section: &str, state: SectionState, attempt: u32) {
        if let Some(tx) = &self.tx {
            // A closed receiver means nobody is watching; generation carries on.
            let _ = tx.send(ProgressEvent {
                section: section.to_string(),
                state,
                attempt,
                at: Utc::now(),
            });
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionProgress {
    pub state: SectionState,
    pub attempt: u32,
    pub updated_at: DateTime<Utc>,
}

/// Folds the event stream into a per-section snapshot for polling.
pub struct ProgressTracker {
    states: Arc<Mutex<IndexMap<String, SectionProgress>>>,
    handle: JoinHandle<()>,
}

impl ProgressTracker {
    pub fn spawn(mut rx: mpsc::UnboundedReceiver<ProgressEvent>) -> Self {
        let states: Arc<Mutex<IndexMap<String, SectionProgress>>> = Arc::default();
        let sink = Arc::clone(&states);

        let handle = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                debug!(
                    "Section '{}' → {:?} (attempt {})",
                    event.section, event.state, event.attempt
                );
                let mut guard = sink.lock().unwrap_or_else(|e| e.into_inner());
                guard.insert(
                    event.section,
                    SectionProgress {
                        state: event.state,
                        attempt: event.attempt,
                        updated_at: event.at,
                    },
                );
            }
        });

        Self { states, handle }
    }

    /// Latest known state of every section seen so far.
    pub fn snapshot(&self) -> IndexMap<String, SectionProgress> {
        self.states
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Waits for every sender to be dropped, then returns the final snapshot.
    pub async fn finish(self) -> IndexMap<String, SectionProgress> {
        let Self { states, handle } = self;
        let _ = handle.await;
        let snapshot = states.lock().unwrap_or_else(|e| e.into_inner()).clone();
        snapshot
    }
}
