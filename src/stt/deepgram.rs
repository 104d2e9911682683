//! Deepgram-style live transcription connector
//!
//! Speaks the provider's streaming WebSocket protocol: binary audio frames
//! in, JSON events out. All provider event shapes are normalized into
//! `SttEvent` at this boundary: utterance-grouped results, per-alternative
//! speaker turns, and inline speaker labels in the text all collapse into
//! `SttEvent::Transcript` with a numeric speaker index.

use super::{SttAudioSender, SttCommand, SttConnector, SttError, SttEvent, SttHandle, SttOptions};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

type WsSink = futures::stream::SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsStream = futures::stream::SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Default provider endpoint for live transcription
pub const DEFAULT_ENDPOINT: &str = "wss://api.deepgram.com/v1/listen";

/// Handshake timeout; connect failures are fatal for the session
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Connector for the Deepgram-style live transcription API
pub struct DeepgramConnector {
    api_key: Option<String>,
    endpoint: String,
}

impl DeepgramConnector {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }

    /// Override the provider endpoint (used against local test servers)
    pub fn with_endpoint(api_key: Option<String>, endpoint: impl Into<String>) -> Self {
        Self {
            api_key,
            endpoint: endpoint.into(),
        }
    }
}

/// Build the listen URL with streaming options as query parameters
pub fn listen_url(endpoint: &str, options: &SttOptions) -> String {
    format!(
        "{}?model={}&language={}&encoding={}&sample_rate={}&channels={}\
         &diarize={}&smart_format={}&punctuate=true&endpointing={}&interim_results=true",
        endpoint,
        options.model,
        options.language,
        options.encoding,
        options.sample_rate,
        options.channels,
        options.diarize,
        options.smart_format,
        options.endpointing,
    )
}

/// Build the WebSocket upgrade request with provider auth
fn build_ws_request(url: &str, api_key: &str) -> Result<tungstenite::http::Request<()>, SttError> {
    let uri: tungstenite::http::Uri = url
        .parse()
        .map_err(|e| SttError::Handshake(format!("invalid endpoint URL: {}", e)))?;
    let host = uri
        .host()
        .ok_or_else(|| SttError::Handshake("endpoint URL has no host".to_string()))?
        .to_string();

    tungstenite::http::Request::builder()
        .uri(url)
        .header("Host", host)
        .header("Connection", "Upgrade")
        .header("Upgrade", "websocket")
        .header("Sec-WebSocket-Version", "13")
        .header(
            "Sec-WebSocket-Key",
            tungstenite::handshake::client::generate_key(),
        )
        .header("Authorization", format!("Token {}", api_key))
        .body(())
        .map_err(|e| SttError::Handshake(format!("failed to build request: {}", e)))
}

#[async_trait::async_trait]
impl SttConnector for DeepgramConnector {
    async fn open(&self, options: &SttOptions) -> Result<SttHandle, SttError> {
        let api_key = self
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(SttError::MissingCredential)?;

        let url = listen_url(&self.endpoint, options);
        let request = build_ws_request(&url, api_key)?;

        info!("Connecting to STT provider at {}", self.endpoint);

        let ws_stream = match timeout(
            Duration::from_secs(CONNECT_TIMEOUT_SECS),
            connect_async(request),
        )
        .await
        {
            Ok(Ok((stream, _response))) => stream,
            Ok(Err(e)) => return Err(SttError::Handshake(e.to_string())),
            Err(_) => return Err(SttError::ConnectTimeout),
        };

        info!("STT provider connection established");

        let (ws_tx, ws_rx) = ws_stream.split();
        let (cmd_tx, cmd_rx) = mpsc::channel::<SttCommand>(64);
        let (event_tx, event_rx) = mpsc::channel::<SttEvent>(256);

        tokio::spawn(send_task(ws_tx, cmd_rx));
        tokio::spawn(recv_task(ws_rx, event_tx));

        Ok(SttHandle::from_parts(SttAudioSender::new(cmd_tx), event_rx))
    }
}

/// Forward audio commands to the provider socket.
///
/// Ends when the command channel closes or a `Finish` command arrives;
/// either way the stream close message is flushed before the socket drops.
async fn send_task(mut ws_tx: WsSink, mut commands: mpsc::Receiver<SttCommand>) {
    while let Some(command) = commands.recv().await {
        match command {
            SttCommand::Audio(chunk) => {
                if ws_tx.send(Message::Binary(chunk)).await.is_err() {
                    warn!("STT provider socket closed while sending audio");
                    break;
                }
            }
            SttCommand::Finish => break,
        }
    }

    let _ = ws_tx
        .send(Message::Text(r#"{"type":"CloseStream"}"#.to_string()))
        .await;
    let _ = ws_tx.close().await;
    debug!("STT send task finished");
}

/// Receive provider messages and emit normalized events.
///
/// The event channel closing (session gone) ends the task immediately.
async fn recv_task(mut ws_rx: WsStream, events: mpsc::Sender<SttEvent>) {
    while let Some(message) = ws_rx.next().await {
        let text = match message {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(frame)) => {
                if let Some(frame) = frame {
                    if frame.code != CloseCode::Normal {
                        let _ = events
                            .send(SttEvent::ProviderError {
                                message: format!(
                                    "provider closed stream: {} {}",
                                    frame.code, frame.reason
                                ),
                            })
                            .await;
                    }
                }
                break;
            }
            Ok(_) => continue,
            Err(e) => {
                let _ = events
                    .send(SttEvent::ProviderError {
                        message: format!("provider stream error: {}", e),
                    })
                    .await;
                break;
            }
        };

        for event in parse_event(&text) {
            if events.send(event).await.is_err() {
                return;
            }
        }
    }
    debug!("STT receive task finished");
}

/// Parse one provider message into normalized events.
///
/// Unparseable payloads become `ProviderError`; unknown event types are
/// reported as `Metadata` so they reach the logs without affecting the
/// session.
pub fn parse_event(text: &str) -> Vec<SttEvent> {
    let value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            return vec![SttEvent::ProviderError {
                message: format!("unparseable provider event: {}", e),
            }]
        }
    };

    match value.get("type").and_then(Value::as_str) {
        Some("Results") => parse_results(&value),
        Some("UtteranceEnd") => vec![SttEvent::UtteranceEnd],
        Some("Metadata") => {
            let info = value
                .get("request_id")
                .and_then(Value::as_str)
                .map(|id| format!("request_id={}", id))
                .unwrap_or_else(|| "provider metadata".to_string());
            vec![SttEvent::Metadata { info }]
        }
        Some("Error") => vec![SttEvent::ProviderError {
            message: error_message(&value),
        }],
        Some(other) => vec![SttEvent::Metadata {
            info: format!("unhandled {} event", other),
        }],
        None if value.get("error").is_some() => vec![SttEvent::ProviderError {
            message: error_message(&value),
        }],
        None => vec![SttEvent::Metadata {
            info: "untyped provider event".to_string(),
        }],
    }
}

fn error_message(value: &Value) -> String {
    value
        .get("description")
        .or_else(|| value.get("message"))
        .or_else(|| value.get("error"))
        .and_then(Value::as_str)
        .unwrap_or("unknown provider error")
        .to_string()
}

/// Normalize a `Results` message into transcript events.
///
/// Providers report speakers three ways: an utterance list, speaker turns on
/// the alternative, or labels inlined in the text. All three reduce to the
/// same `Transcript{speaker}` shape here.
fn parse_results(value: &Value) -> Vec<SttEvent> {
    let is_final = value
        .get("is_final")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    // Utterance-grouped results carry one speaker per utterance.
    if let Some(utterances) = value.get("utterances").and_then(Value::as_array) {
        let events: Vec<SttEvent> = utterances
            .iter()
            .filter_map(|u| {
                let text = u.get("transcript").and_then(Value::as_str)?.trim();
                if text.is_empty() {
                    return None;
                }
                Some(SttEvent::Transcript {
                    text: text.to_string(),
                    is_final,
                    speaker: u.get("speaker").and_then(Value::as_u64).unwrap_or(0) as u32,
                    confidence: u.get("confidence").and_then(Value::as_f64).map(|c| c as f32),
                })
            })
            .collect();
        if !events.is_empty() {
            return events;
        }
    }

    let alternative = &value["channel"]["alternatives"][0];
    let transcript = alternative
        .get("transcript")
        .and_then(Value::as_str)
        .unwrap_or("")
        .trim();
    if transcript.is_empty() {
        return Vec::new();
    }
    let confidence = alternative
        .get("confidence")
        .and_then(Value::as_f64)
        .map(|c| c as f32);

    // Some responses attach speaker turns to the alternative instead.
    if let Some(turns) = alternative.get("speaker_turns").and_then(Value::as_array) {
        let events: Vec<SttEvent> = turns
            .iter()
            .filter_map(|turn| {
                let text = turn.get("text").and_then(Value::as_str)?.trim();
                if text.is_empty() {
                    return None;
                }
                Some(SttEvent::Transcript {
                    text: text.to_string(),
                    is_final,
                    speaker: turn.get("speaker").and_then(Value::as_u64).unwrap_or(0) as u32,
                    confidence,
                })
            })
            .collect();
        if !events.is_empty() {
            return events;
        }
    }

    // Fall back to labels embedded in the text, then to word-level speakers.
    if let Some((speaker, text)) = strip_inline_label(transcript) {
        return vec![SttEvent::Transcript {
            text: text.to_string(),
            is_final,
            speaker,
            confidence,
        }];
    }

    let speaker = alternative["words"][0]
        .get("speaker")
        .and_then(Value::as_u64)
        .unwrap_or(0) as u32;

    vec![SttEvent::Transcript {
        text: transcript.to_string(),
        is_final,
        speaker,
        confidence,
    }]
}

/// Recognize an inline speaker label prefix and map it back to an index
fn strip_inline_label(text: &str) -> Option<(u32, &str)> {
    if let Some(rest) = text.strip_prefix("Doctor:") {
        return Some((0, rest.trim_start()));
    }
    if let Some(rest) = text.strip_prefix("Patient:") {
        return Some((1, rest.trim_start()));
    }
    if let Some(rest) = text.strip_prefix("Speaker ") {
        let (digits, tail) = rest.split_once(':')?;
        let index: u32 = digits.trim().parse().ok()?;
        return Some((index, tail.trim_start()));
    }
    None
}
