//! Client transport protocol
//!
//! Message shapes exchanged with the client over the duplex transport. The
//! server side is JSON with a `type` discriminator; the client side is raw
//! frames (binary audio, sentinel, or legacy base64 text).

use crate::analysis::AnalysisReport;
use serde::{Deserialize, Serialize};

/// Explicit textual end-of-stream token (legacy clients)
pub const END_STREAM_TOKEN: &str = "END_STREAM";

/// One inbound frame from the client transport
#[derive(Debug, Clone, PartialEq)]
pub enum ClientFrame {
    /// Raw audio chunk; a zero-length chunk is the end-of-stream sentinel
    Audio(Vec<u8>),

    /// Text frame: either the end token or base64-encoded audio
    Text(String),
}

/// Structured message sent to the client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Lifecycle notification ("ready", "started")
    Status { message: String },

    /// Incremental transcript with the mapped speaker role
    Transcript {
        is_final: bool,
        speaker: String,
        text: String,
    },

    /// Structured analysis result
    Analysis { data: AnalysisReport },

    /// Non-fatal or terminal error notice
    Error { message: String },

    /// Graceful completion notice, sent exactly once at teardown
    End { message: String },
}

impl ServerMessage {
    pub fn status(message: impl Into<String>) -> Self {
        Self::Status {
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn end(message: impl Into<String>) -> Self {
        Self::End {
            message: message.into(),
        }
    }
}
