//! Transcript analysis
//!
//! This module provides:
//! - The structured `AnalysisReport` returned to clients
//! - The `AnalysisProvider` trait over the external text-analysis call
//! - The `AnalysisTrigger` that decides when to launch a call and enforces
//!   the at-most-one-in-flight invariant
//!
//! Analysis is best-effort: failures are logged, never surfaced as client
//! control flow, and the analyzed high-water mark is only advanced after a
//! successful call is delivered.

pub mod gemini;

pub use gemini::GeminiAnalyst;

use crate::transcript::TranscriptAccumulator;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{info, warn};

/// Default number of new finalized characters that triggers an analysis call
pub const DEFAULT_ANALYSIS_THRESHOLD: usize = 300;

/// One identified symptom
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Symptom {
    pub description: String,
    pub is_primary: bool,
}

/// Clinical severity assessment with rationale
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Severity {
    pub level: String,
    pub rationale: String,
}

/// One potential differential diagnosis
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Diagnosis {
    pub name: String,
    pub confidence: String,
    pub rationale: String,
}

/// Structured analysis of a transcript chunk
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisReport {
    pub symptoms: Vec<Symptom>,
    pub suggestions: Vec<String>,
    pub severity: Severity,
    pub diagnoses: Vec<Diagnosis>,
}

/// Errors from the analysis provider boundary
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("analysis credential is missing")]
    MissingCredential,

    #[error("analysis request failed: {0}")]
    Request(String),

    #[error("analysis provider returned status {0}")]
    Status(u16),

    #[error("analysis response was malformed: {0}")]
    Malformed(String),
}

/// External text-analysis collaborator: one block of text in, one structured
/// report out
#[async_trait::async_trait]
pub trait AnalysisProvider: Send + Sync {
    async fn analyze(&self, transcript: &str) -> Result<AnalysisReport, AnalysisError>;
}

/// Completion report from an analysis task, delivered to the session's event
/// loop
#[derive(Debug)]
pub struct AnalysisOutcome {
    /// Length of the finalized text snapshot the task analyzed
    pub input_len: usize,

    /// The provider result
    pub result: Result<AnalysisReport, AnalysisError>,
}

/// Decides when to launch an analysis call and enforces single-flight.
///
/// All methods are called from the session's event loop only; the
/// check-and-set on the in-flight slot never races because that loop is the
/// single writer.
pub struct AnalysisTrigger {
    threshold: usize,
    provider: Arc<dyn AnalysisProvider>,
    results_tx: mpsc::Sender<AnalysisOutcome>,
    in_flight: Option<JoinHandle<()>>,
}

impl AnalysisTrigger {
    pub fn new(
        threshold: usize,
        provider: Arc<dyn AnalysisProvider>,
        results_tx: mpsc::Sender<AnalysisOutcome>,
    ) -> Self {
        Self {
            threshold,
            provider,
            results_tx,
            in_flight: None,
        }
    }

    /// Whether a task is currently in flight
    pub fn is_running(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Launch a task iff enough new text accumulated and none is running.
    ///
    /// Non-blocking check, never queues. Returns whether a task was launched.
    pub fn maybe_trigger(&mut self, transcript: &TranscriptAccumulator) -> bool {
        if self.in_flight.is_some() || transcript.unanalyzed_len() < self.threshold {
            return false;
        }
        info!(
            "Analysis threshold reached ({} >= {}), launching analysis task",
            transcript.unanalyzed_len(),
            self.threshold
        );
        self.launch(transcript.finalized_text().to_string());
        true
    }

    /// Launch a task regardless of the threshold iff any unanalyzed text
    /// exists and none is running.
    ///
    /// Used when the stream signals a natural pause.
    pub fn force_trigger(&mut self, transcript: &TranscriptAccumulator) -> bool {
        if self.in_flight.is_some() || transcript.unanalyzed_len() == 0 {
            return false;
        }
        info!("Launching analysis task on utterance end");
        self.launch(transcript.finalized_text().to_string());
        true
    }

    /// Clear the in-flight slot after the event loop consumed an outcome
    pub fn finish(&mut self) {
        self.in_flight = None;
    }

    fn launch(&mut self, snapshot: String) {
        let provider = Arc::clone(&self.provider);
        let results_tx = self.results_tx.clone();
        let handle = tokio::spawn(async move {
            let input_len = snapshot.len();
            let result = provider.analyze(&snapshot).await;
            // Receiver gone means the session is tearing down; the result is
            // discarded unconditionally.
            let _ = results_tx.send(AnalysisOutcome { input_len, result }).await;
        });
        self.in_flight = Some(handle);
    }

    /// Bounded wait for an in-flight task during teardown; past the deadline
    /// the task is abandoned.
    pub async fn shutdown(mut self, deadline: Duration) {
        if let Some(handle) = self.in_flight.take() {
            let abort = handle.abort_handle();
            if timeout(deadline, handle).await.is_err() {
                warn!("Timed out waiting for analysis task during teardown, aborting it");
                abort.abort();
            }
        }
    }
}
