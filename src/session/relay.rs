//! Relay session orchestration
//!
//! One `RelaySession` per client connection. The session owns the client
//! transport channels and the STT adapter handle, drives two concurrent
//! activities (the inbound audio loop and the STT event loop) and owns the
//! whole lifecycle: Connecting, Ready, Streaming, Draining, Closed.
//!
//! Concurrency discipline:
//! - The transcript accumulator and session state are mutated only from the
//!   event loop; the inbound loop forwards audio and signals, nothing else.
//! - The analysis single-flight check-and-set happens only in the event loop.
//! - Teardown is a single code path reachable from every exit route.

use crate::analysis::{AnalysisOutcome, AnalysisProvider, AnalysisTrigger};
use crate::session::messages::{ClientFrame, ServerMessage, END_STREAM_TOKEN};
use crate::session::registry::SessionRegistry;
use crate::stt::{SttAudioSender, SttConnector, SttEvent, SttOptions};
use crate::transcript::{speaker_label, TranscriptAccumulator};
use base64::Engine;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Notify};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Lifecycle state of a relay session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Connecting,
    Ready,
    Streaming,
    Draining,
    Closed,
}

/// Diagnostic snapshot published to the session registry
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub state: SessionState,
    pub segments: usize,
    pub finalized_chars: usize,
    pub analysis_running: bool,
}

/// Tunable relay behavior
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// New finalized characters required before an analysis call launches
    pub analysis_threshold: usize,

    /// Bound on waiting for an in-flight analysis during teardown
    pub drain_timeout: Duration,

    /// Provider errors tolerated before the session becomes fatal
    pub max_provider_errors: u32,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            analysis_threshold: crate::analysis::DEFAULT_ANALYSIS_THRESHOLD,
            drain_timeout: Duration::from_secs(5),
            max_provider_errors: 3,
        }
    }
}

/// Signal from the inbound loop to the event loop
#[derive(Debug)]
enum InboundSignal {
    /// Client sent the end-of-stream sentinel
    EndOfStream,

    /// Client transport closed
    Disconnected,

    /// One malformed frame; recoverable, the loop continues
    BadFrame { message: String },
}

/// Why the streaming phase ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamOutcome {
    /// STT adapter never opened; terminal error already sent
    ConnectFailed,

    /// Graceful end-of-stream from the client
    EndOfStream,

    /// Abrupt client disconnect; the transport is gone
    Disconnected,

    /// Forced cleanup requested through the registry
    ForcedClose,

    /// Unrecoverable provider failure; terminal error already sent
    SttFatal,
}

/// One real-time transcription relay session
pub struct RelaySession {
    id: String,
    config: RelayConfig,
    stt: Arc<dyn SttConnector>,
    analysis: Arc<dyn AnalysisProvider>,
    registry: SessionRegistry,
}

impl RelaySession {
    pub fn new(
        id: String,
        config: RelayConfig,
        stt: Arc<dyn SttConnector>,
        analysis: Arc<dyn AnalysisProvider>,
        registry: SessionRegistry,
    ) -> Self {
        Self {
            id,
            config,
            stt,
            analysis,
            registry,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Drive the session to completion over the given transport channels.
    ///
    /// Returns once the session is fully closed: adapter released, final
    /// client message sent (when the transport allows), registry entry
    /// removed.
    pub async fn run(
        self,
        inbound: mpsc::Receiver<ClientFrame>,
        outbound: mpsc::Sender<ServerMessage>,
        options: SttOptions,
    ) {
        info!("Session {} starting", self.id);

        let (status_tx, status_rx) = watch::channel(SessionStatus {
            state: SessionState::Connecting,
            segments: 0,
            finalized_chars: 0,
            analysis_running: false,
        });
        let close_signal = self.registry.register(&self.id, status_rx).await;

        let (analysis_tx, mut analysis_rx) = mpsc::channel::<AnalysisOutcome>(4);
        let trigger = AnalysisTrigger::new(
            self.config.analysis_threshold,
            Arc::clone(&self.analysis),
            analysis_tx,
        );

        let mut driver = Driver {
            id: self.id,
            config: self.config,
            registry: self.registry,
            state: SessionState::Connecting,
            transcript: TranscriptAccumulator::new(),
            trigger,
            outbound,
            status_tx,
            terminal_error_sent: false,
        };

        let (outcome, stt_audio) = driver
            .stream(self.stt.as_ref(), inbound, &close_signal, &options, &mut analysis_rx)
            .await;
        driver.shutdown(outcome, stt_audio, &mut analysis_rx).await;
    }
}

/// Mutable session state, owned by the event loop
struct Driver {
    id: String,
    config: RelayConfig,
    registry: SessionRegistry,
    state: SessionState,
    transcript: TranscriptAccumulator,
    trigger: AnalysisTrigger,
    outbound: mpsc::Sender<ServerMessage>,
    status_tx: watch::Sender<SessionStatus>,
    terminal_error_sent: bool,
}

impl Driver {
    /// Connect the STT adapter and run the streaming phase.
    ///
    /// Returns the reason the phase ended plus the adapter write half (for
    /// teardown) if the adapter was opened.
    async fn stream(
        &mut self,
        connector: &dyn SttConnector,
        inbound: mpsc::Receiver<ClientFrame>,
        close_signal: &Notify,
        options: &SttOptions,
        analysis_rx: &mut mpsc::Receiver<AnalysisOutcome>,
    ) -> (StreamOutcome, Option<SttAudioSender>) {
        let handle = match connector.open(options).await {
            Ok(handle) => handle,
            Err(e) => {
                error!("Session {}: STT connect failed: {}", self.id, e);
                self.send_terminal_error(format!("Failed to initialize transcription: {}", e))
                    .await;
                return (StreamOutcome::ConnectFailed, None);
            }
        };

        self.set_state(SessionState::Ready);
        self.send(ServerMessage::status("Transcription service ready"))
            .await;

        let (stt_audio, mut stt_events) = handle.split();
        let (signal_tx, mut signal_rx) = mpsc::channel::<InboundSignal>(8);
        let inbound_task = tokio::spawn(inbound_loop(inbound, stt_audio.clone(), signal_tx));

        self.set_state(SessionState::Streaming);

        let mut provider_errors: u32 = 0;
        let mut inbound_done = false;

        let outcome = loop {
            tokio::select! {
                _ = close_signal.notified() => {
                    info!("Session {}: forced close requested", self.id);
                    break StreamOutcome::ForcedClose;
                }
                signal = signal_rx.recv(), if !inbound_done => match signal {
                    Some(InboundSignal::EndOfStream) => {
                        info!("Session {}: end of audio stream", self.id);
                        break StreamOutcome::EndOfStream;
                    }
                    Some(InboundSignal::Disconnected) => {
                        info!("Session {}: client disconnected", self.id);
                        break StreamOutcome::Disconnected;
                    }
                    Some(InboundSignal::BadFrame { message }) => {
                        warn!("Session {}: {}", self.id, message);
                        self.send(ServerMessage::error(format!(
                            "Error processing audio: {}",
                            message
                        )))
                        .await;
                    }
                    // Inbound loop ended without a verdict (adapter gone);
                    // the event stream arm decides how the session ends.
                    None => inbound_done = true,
                },
                event = stt_events.recv() => match event {
                    Some(event) => {
                        if let Some(outcome) =
                            self.handle_stt_event(event, &mut provider_errors).await
                        {
                            break outcome;
                        }
                    }
                    None => {
                        error!("Session {}: STT event stream ended unexpectedly", self.id);
                        self.send_terminal_error("Transcription service connection lost")
                            .await;
                        break StreamOutcome::SttFatal;
                    }
                },
                outcome = analysis_rx.recv() => {
                    if let Some(outcome) = outcome {
                        self.handle_analysis_outcome(outcome, true).await;
                    }
                }
            }
        };

        inbound_task.abort();
        (outcome, Some(stt_audio))
    }

    /// Single teardown path, reachable from every exit route.
    async fn shutdown(
        mut self,
        outcome: StreamOutcome,
        stt_audio: Option<SttAudioSender>,
        analysis_rx: &mut mpsc::Receiver<AnalysisOutcome>,
    ) {
        self.set_state(SessionState::Draining);

        // An abruptly disconnected transport cannot receive anything more;
        // late results are discarded instead of delivered.
        let deliver = outcome != StreamOutcome::Disconnected;

        // Bounded wait for an in-flight analysis so its result is not lost.
        if self.trigger.is_running() {
            match timeout(self.config.drain_timeout, analysis_rx.recv()).await {
                Ok(Some(analysis)) => self.handle_analysis_outcome(analysis, deliver).await,
                Ok(None) => {}
                Err(_) => warn!(
                    "Session {}: timed out waiting for in-flight analysis",
                    self.id
                ),
            }
        }

        // Close the STT adapter; idempotent, safe even if open never finished.
        if let Some(audio) = stt_audio {
            audio.close().await;
        }

        // Exactly one of error/end reaches the client per session.
        if deliver && !self.terminal_error_sent {
            self.send(ServerMessage::end("Transcription completed"))
                .await;
        }

        self.set_state(SessionState::Closed);
        self.registry.deregister(&self.id).await;

        // Abandon an analysis task that outlived the drain window.
        self.trigger.shutdown(Duration::ZERO).await;

        info!("Session {} closed", self.id);
    }

    /// Process one normalized STT event. Returns a stream outcome when the
    /// event is fatal for the session.
    async fn handle_stt_event(
        &mut self,
        event: SttEvent,
        provider_errors: &mut u32,
    ) -> Option<StreamOutcome> {
        match event {
            SttEvent::Transcript {
                text,
                is_final,
                speaker,
                confidence,
            } => {
                let text = text.trim();
                if text.is_empty() {
                    return None;
                }
                let speaker = speaker_label(speaker);
                debug!(
                    "Session {}: {} ({}): {:?} confidence={:?}",
                    self.id,
                    speaker,
                    if is_final { "final" } else { "interim" },
                    text,
                    confidence
                );

                self.send(ServerMessage::Transcript {
                    is_final,
                    speaker: speaker.clone(),
                    text: text.to_string(),
                })
                .await;

                if is_final {
                    self.transcript.append_final(&speaker, text);
                    self.trigger.maybe_trigger(&self.transcript);
                } else {
                    self.transcript.replace_interim(&speaker, text);
                }
                self.publish_status();
                None
            }
            SttEvent::UtteranceEnd => {
                debug!("Session {}: utterance end", self.id);
                if self.trigger.force_trigger(&self.transcript) {
                    self.publish_status();
                }
                None
            }
            SttEvent::Metadata { info } => {
                debug!("Session {}: provider metadata: {}", self.id, info);
                None
            }
            SttEvent::ProviderError { message } => {
                *provider_errors += 1;
                warn!(
                    "Session {}: provider error {}/{}: {}",
                    self.id, provider_errors, self.config.max_provider_errors, message
                );
                if *provider_errors >= self.config.max_provider_errors {
                    self.send_terminal_error(format!("Transcription service error: {}", message))
                        .await;
                    Some(StreamOutcome::SttFatal)
                } else {
                    self.send(ServerMessage::error(format!(
                        "Transcription service error: {}",
                        message
                    )))
                    .await;
                    None
                }
            }
        }
    }

    /// Consume one analysis completion.
    ///
    /// The high-water mark advances only when the call succeeded and the
    /// result was delivered; failed or discarded results leave the same text
    /// eligible for a future trigger.
    async fn handle_analysis_outcome(&mut self, outcome: AnalysisOutcome, deliver: bool) {
        self.trigger.finish();
        match outcome.result {
            Ok(report) => {
                if deliver && self.send(ServerMessage::Analysis { data: report }).await {
                    self.transcript.mark_analyzed(outcome.input_len);
                    info!(
                        "Session {}: delivered analysis covering {} chars",
                        self.id, outcome.input_len
                    );
                } else {
                    debug!(
                        "Session {}: discarding analysis result, transport gone",
                        self.id
                    );
                }
            }
            Err(e) => warn!("Session {}: analysis failed: {}", self.id, e),
        }
        self.publish_status();
    }

    async fn send(&self, message: ServerMessage) -> bool {
        self.outbound.send(message).await.is_ok()
    }

    /// Send the session's single terminal error; suppresses the end message.
    async fn send_terminal_error(&mut self, message: impl Into<String>) {
        self.terminal_error_sent = true;
        self.send(ServerMessage::error(message)).await;
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            debug!("Session {}: {:?} -> {:?}", self.id, self.state, state);
            self.state = state;
            self.publish_status();
        }
    }

    fn publish_status(&self) {
        self.status_tx.send_replace(SessionStatus {
            state: self.state,
            segments: self.transcript.segments().len(),
            finalized_chars: self.transcript.finalized_text().len(),
            analysis_running: self.trigger.is_running(),
        });
    }
}

/// Inbound audio loop: client frames toward the STT adapter.
///
/// Runs as its own task so adapter backpressure throttles the client without
/// stalling event consumption. Never touches session state; everything the
/// event loop needs to know arrives as an `InboundSignal`.
async fn inbound_loop(
    mut inbound: mpsc::Receiver<ClientFrame>,
    audio: SttAudioSender,
    signals: mpsc::Sender<InboundSignal>,
) {
    while let Some(frame) = inbound.recv().await {
        let chunk = match frame {
            ClientFrame::Audio(bytes) => {
                if bytes.is_empty() {
                    let _ = signals.send(InboundSignal::EndOfStream).await;
                    return;
                }
                bytes
            }
            ClientFrame::Text(text) => {
                let text = text.trim();
                if text.is_empty() || text == END_STREAM_TOKEN {
                    let _ = signals.send(InboundSignal::EndOfStream).await;
                    return;
                }
                // Legacy clients send base64-encoded audio as text frames.
                match base64::engine::general_purpose::STANDARD.decode(text) {
                    Ok(bytes) if bytes.is_empty() => {
                        let _ = signals.send(InboundSignal::EndOfStream).await;
                        return;
                    }
                    Ok(bytes) => bytes,
                    Err(e) => {
                        let _ = signals
                            .send(InboundSignal::BadFrame {
                                message: format!("undecodable audio frame: {}", e),
                            })
                            .await;
                        continue;
                    }
                }
            }
        };

        if audio.send(chunk).await.is_err() {
            // Adapter gone; the event loop learns why from the event stream.
            return;
        }
    }

    let _ = signals.send(InboundSignal::Disconnected).await;
}
