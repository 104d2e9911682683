//! Transcript accumulation
//!
//! This module provides the `TranscriptAccumulator` that tracks:
//! - The ordered list of transcript segments (final and interim)
//! - The growing finalized text fed to analysis
//! - The high-water mark of text already analyzed
//!
//! It is a pure data structure: no I/O, no locking. A session owns exactly
//! one accumulator and mutates it from a single task.

use serde::{Deserialize, Serialize};

/// A single transcript segment received from the STT adapter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Speaker role label ("Doctor", "Patient", "Speaker N")
    pub speaker: String,

    /// Transcribed text
    pub text: String,

    /// Whether this segment is final (interim segments get replaced)
    pub is_final: bool,
}

/// Map a provider speaker index to a stable role label.
///
/// Index 0 is the doctor and index 1 the patient; any other index renders as
/// "Speaker N". The mapping is fixed for output compatibility.
pub fn speaker_label(index: u32) -> String {
    match index {
        0 => "Doctor".to_string(),
        1 => "Patient".to_string(),
        n => format!("Speaker {}", n),
    }
}

/// Accumulated transcript state for one session
#[derive(Debug, Default)]
pub struct TranscriptAccumulator {
    /// Ordered segments; final segments are append-only, the most recent
    /// interim segment is replaceable
    segments: Vec<TranscriptSegment>,

    /// Concatenation of all final segments ("Speaker: text\n" each)
    finalized_text: String,

    /// Length of `finalized_text` already covered by a successful analysis
    last_analyzed_len: usize,
}

impl TranscriptAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a final segment and extend the finalized text.
    ///
    /// Any pending interim segment is superseded by the final result and
    /// removed first.
    pub fn append_final(&mut self, speaker: &str, text: &str) {
        if self.segments.last().is_some_and(|s| !s.is_final) {
            self.segments.pop();
        }
        self.segments.push(TranscriptSegment {
            speaker: speaker.to_string(),
            text: text.to_string(),
            is_final: true,
        });
        self.finalized_text.push_str(speaker);
        self.finalized_text.push_str(": ");
        self.finalized_text.push_str(text);
        self.finalized_text.push('\n');
    }

    /// Record an interim segment for display only.
    ///
    /// Interim results overwrite the previous interim segment instead of
    /// appending, and never touch the finalized text.
    pub fn replace_interim(&mut self, speaker: &str, text: &str) {
        let segment = TranscriptSegment {
            speaker: speaker.to_string(),
            text: text.to_string(),
            is_final: false,
        };
        match self.segments.last_mut() {
            Some(last) if !last.is_final => *last = segment,
            _ => self.segments.push(segment),
        }
    }

    /// Full finalized transcript text
    pub fn finalized_text(&self) -> &str {
        &self.finalized_text
    }

    /// All segments, in arrival order
    pub fn segments(&self) -> &[TranscriptSegment] {
        &self.segments
    }

    /// Finalized text not yet covered by a successful analysis
    pub fn unanalyzed(&self) -> &str {
        &self.finalized_text[self.last_analyzed_len..]
    }

    /// Number of finalized characters not yet analyzed
    pub fn unanalyzed_len(&self) -> usize {
        self.finalized_text.len() - self.last_analyzed_len
    }

    /// Advance the analysis high-water mark.
    ///
    /// Monotonic: a value smaller than the current mark is a no-op (guards
    /// against out-of-order completion of a stale analysis task). Values past
    /// the end of the finalized text are clamped.
    pub fn mark_analyzed(&mut self, upto: usize) {
        let upto = upto.min(self.finalized_text.len());
        if upto > self.last_analyzed_len {
            self.last_analyzed_len = upto;
        }
    }

    /// Current analysis high-water mark
    pub fn last_analyzed_len(&self) -> usize {
        self.last_analyzed_len
    }
}
