//! STT session adapter
//!
//! This module hides the external streaming speech-to-text protocol behind a
//! normalized interface:
//! - `SttConnector` opens one duplex channel per session
//! - `SttAudioSender` carries raw audio chunks toward the provider
//! - `SttEvent` is the single normalized event vocabulary the orchestrator
//!   consumes; it never branches on provider identity
//!
//! The live implementation (`DeepgramConnector`) speaks a Deepgram-style
//! WebSocket protocol; tests build handles from raw channels instead.

pub mod deepgram;

pub use deepgram::DeepgramConnector;

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// Options for opening an STT streaming session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SttOptions {
    /// Provider model name
    pub model: String,

    /// Language code (e.g., "en-US")
    pub language: String,

    /// Audio sample rate in Hz
    pub sample_rate: u32,

    /// Number of audio channels (1 = mono)
    pub channels: u16,

    /// Audio encoding (e.g., "linear16")
    pub encoding: String,

    /// Identify different speakers
    pub diarize: bool,

    /// Format numbers, punctuation, etc.
    pub smart_format: bool,

    /// Detect end of speech segments
    pub endpointing: bool,
}

impl Default for SttOptions {
    fn default() -> Self {
        Self {
            model: "nova-2".to_string(),
            language: "en-US".to_string(),
            sample_rate: 16000,
            channels: 1,
            encoding: "linear16".to_string(),
            diarize: true,
            smart_format: true,
            endpointing: true,
        }
    }
}

/// Normalized event produced by the STT adapter
#[derive(Debug, Clone, PartialEq)]
pub enum SttEvent {
    /// An incremental transcript fragment
    Transcript {
        text: String,
        is_final: bool,
        speaker: u32,
        confidence: Option<f32>,
    },

    /// The provider detected a natural pause in speech
    UtteranceEnd,

    /// Informational provider event, forwarded to logs only
    Metadata { info: String },

    /// Provider-side error; non-fatal unless it recurs past a threshold
    ProviderError { message: String },
}

/// Errors from the STT adapter boundary
#[derive(Debug, Error)]
pub enum SttError {
    #[error("speech-to-text credential is missing")]
    MissingCredential,

    #[error("speech-to-text handshake failed: {0}")]
    Handshake(String),

    #[error("speech-to-text connection timed out")]
    ConnectTimeout,

    #[error("speech-to-text channel closed")]
    ChannelClosed,
}

/// Command sent toward the provider over the duplex channel
#[derive(Debug, Clone, PartialEq)]
pub enum SttCommand {
    /// One raw audio chunk
    Audio(Vec<u8>),

    /// Flush and end the stream
    Finish,
}

/// Connector that opens STT streaming sessions
#[async_trait::async_trait]
pub trait SttConnector: Send + Sync {
    /// Open a duplex streaming channel to the provider.
    ///
    /// Fails fast (no silent retry) if the credential is absent or the
    /// provider rejects the handshake.
    async fn open(&self, options: &SttOptions) -> Result<SttHandle, SttError>;
}

/// Write half of an open STT session.
///
/// Cloneable so the inbound audio loop can hold its own sender while the
/// session keeps one for teardown. `close` is idempotent.
#[derive(Debug, Clone)]
pub struct SttAudioSender {
    tx: mpsc::Sender<SttCommand>,
    closed: Arc<AtomicBool>,
}

impl SttAudioSender {
    pub fn new(tx: mpsc::Sender<SttCommand>) -> Self {
        Self {
            tx,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Forward one audio chunk to the provider.
    ///
    /// The bounded command channel provides natural backpressure: if the
    /// provider cannot keep up, this call blocks the inbound loop.
    pub async fn send(&self, chunk: Vec<u8>) -> Result<(), SttError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SttError::ChannelClosed);
        }
        self.tx
            .send(SttCommand::Audio(chunk))
            .await
            .map_err(|_| SttError::ChannelClosed)
    }

    /// Flush and release the provider channel.
    ///
    /// Safe to call repeatedly and safe to call if the connection already
    /// failed; only the first call sends the finish command.
    pub async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            let _ = self.tx.send(SttCommand::Finish).await;
        }
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// An open STT session: audio in, normalized events out
#[derive(Debug)]
pub struct SttHandle {
    audio: SttAudioSender,
    events: mpsc::Receiver<SttEvent>,
}

impl SttHandle {
    /// Assemble a handle from raw channel halves.
    ///
    /// Used by connectors and by tests that script provider behavior.
    pub fn from_parts(audio: SttAudioSender, events: mpsc::Receiver<SttEvent>) -> Self {
        Self { audio, events }
    }

    /// Split into the write half and the event stream
    pub fn split(self) -> (SttAudioSender, mpsc::Receiver<SttEvent>) {
        (self.audio, self.events)
    }
}
