use consult_relay::stt::deepgram::{listen_url, parse_event, DEFAULT_ENDPOINT};
use consult_relay::stt::{
    DeepgramConnector, SttAudioSender, SttCommand, SttConnector, SttError, SttEvent, SttOptions,
};
use tokio::sync::mpsc;

// ============================================================================
// Event normalization
// ============================================================================

#[test]
fn test_parse_results_with_word_speakers() {
    let raw = r#"{
        "type": "Results",
        "is_final": true,
        "channel": {
            "alternatives": [{
                "transcript": "How are you feeling today?",
                "confidence": 0.98,
                "words": [{"word": "how", "speaker": 0}]
            }]
        }
    }"#;

    let events = parse_event(raw);
    assert_eq!(
        events,
        vec![SttEvent::Transcript {
            text: "How are you feeling today?".to_string(),
            is_final: true,
            speaker: 0,
            confidence: Some(0.98),
        }]
    );
}

#[test]
fn test_parse_interim_result() {
    let raw = r#"{
        "type": "Results",
        "is_final": false,
        "channel": {
            "alternatives": [{
                "transcript": "how are",
                "words": [{"word": "how", "speaker": 1}]
            }]
        }
    }"#;

    let events = parse_event(raw);
    assert_eq!(events.len(), 1);
    match &events[0] {
        SttEvent::Transcript {
            is_final, speaker, ..
        } => {
            assert!(!is_final);
            assert_eq!(*speaker, 1);
        }
        other => panic!("unexpected event: {:?}", other),
    }
}

#[test]
fn test_parse_empty_transcript_yields_nothing() {
    let raw = r#"{
        "type": "Results",
        "is_final": false,
        "channel": {"alternatives": [{"transcript": "   "}]}
    }"#;
    assert!(parse_event(raw).is_empty());
}

#[test]
fn test_parse_utterance_grouped_results() {
    let raw = r#"{
        "type": "Results",
        "is_final": true,
        "utterances": [
            {"speaker": 0, "transcript": "What brings you in today?"},
            {"speaker": 1, "transcript": "I've had a cough for a week."}
        ],
        "channel": {"alternatives": [{"transcript": "ignored here"}]}
    }"#;

    let events = parse_event(raw);
    assert_eq!(events.len(), 2);
    match (&events[0], &events[1]) {
        (
            SttEvent::Transcript {
                speaker: s0,
                text: t0,
                ..
            },
            SttEvent::Transcript {
                speaker: s1,
                text: t1,
                ..
            },
        ) => {
            assert_eq!(*s0, 0);
            assert_eq!(t0, "What brings you in today?");
            assert_eq!(*s1, 1);
            assert_eq!(t1, "I've had a cough for a week.");
        }
        other => panic!("unexpected events: {:?}", other),
    }
}

#[test]
fn test_parse_speaker_turns() {
    let raw = r#"{
        "type": "Results",
        "is_final": true,
        "channel": {
            "alternatives": [{
                "transcript": "full text",
                "speaker_turns": [
                    {"speaker": 1, "text": "It hurts when I breathe in."}
                ]
            }]
        }
    }"#;

    let events = parse_event(raw);
    assert_eq!(events.len(), 1);
    match &events[0] {
        SttEvent::Transcript { speaker, text, .. } => {
            assert_eq!(*speaker, 1);
            assert_eq!(text, "It hurts when I breathe in.");
        }
        other => panic!("unexpected event: {:?}", other),
    }
}

#[test]
fn test_parse_inline_speaker_labels() {
    for (raw_text, expected_speaker, expected_text) in [
        ("Doctor: Any fever or chills?", 0, "Any fever or chills?"),
        ("Patient: No fever.", 1, "No fever."),
        ("Speaker 4: background voice", 4, "background voice"),
    ] {
        let raw = format!(
            r#"{{"type": "Results", "is_final": true,
                "channel": {{"alternatives": [{{"transcript": "{}"}}]}}}}"#,
            raw_text
        );
        let events = parse_event(&raw);
        assert_eq!(events.len(), 1, "for {:?}", raw_text);
        match &events[0] {
            SttEvent::Transcript { speaker, text, .. } => {
                assert_eq!(*speaker, expected_speaker);
                assert_eq!(text, expected_text);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}

#[test]
fn test_parse_utterance_end() {
    assert_eq!(
        parse_event(r#"{"type": "UtteranceEnd", "last_word_end": 4.2}"#),
        vec![SttEvent::UtteranceEnd]
    );
}

#[test]
fn test_parse_metadata() {
    let events = parse_event(r#"{"type": "Metadata", "request_id": "abc-123"}"#);
    assert_eq!(
        events,
        vec![SttEvent::Metadata {
            info: "request_id=abc-123".to_string()
        }]
    );
}

#[test]
fn test_parse_provider_error() {
    let events = parse_event(r#"{"type": "Error", "description": "bad audio encoding"}"#);
    assert_eq!(
        events,
        vec![SttEvent::ProviderError {
            message: "bad audio encoding".to_string()
        }]
    );
}

#[test]
fn test_parse_garbage_is_provider_error() {
    let events = parse_event("not json at all");
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], SttEvent::ProviderError { .. }));
}

#[test]
fn test_parse_unknown_type_is_metadata() {
    let events = parse_event(r#"{"type": "SpeechStarted"}"#);
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], SttEvent::Metadata { .. }));
}

// ============================================================================
// Connection setup
// ============================================================================

#[test]
fn test_listen_url_carries_options() {
    let options = SttOptions::default();
    let url = listen_url(DEFAULT_ENDPOINT, &options);

    assert!(url.starts_with("wss://api.deepgram.com/v1/listen?"));
    assert!(url.contains("model=nova-2"));
    assert!(url.contains("language=en-US"));
    assert!(url.contains("encoding=linear16"));
    assert!(url.contains("sample_rate=16000"));
    assert!(url.contains("channels=1"));
    assert!(url.contains("diarize=true"));
    assert!(url.contains("smart_format=true"));
    assert!(url.contains("endpointing=true"));
    assert!(url.contains("interim_results=true"));
}

#[tokio::test]
async fn test_open_without_credential_fails_fast() {
    let connector = DeepgramConnector::new(None);
    let err = connector.open(&SttOptions::default()).await.unwrap_err();
    assert!(matches!(err, SttError::MissingCredential));

    let connector = DeepgramConnector::new(Some(String::new()));
    let err = connector.open(&SttOptions::default()).await.unwrap_err();
    assert!(matches!(err, SttError::MissingCredential));
}

// ============================================================================
// Audio sender
// ============================================================================

#[tokio::test]
async fn test_audio_sender_close_is_idempotent() {
    let (tx, mut rx) = mpsc::channel::<SttCommand>(8);
    let sender = SttAudioSender::new(tx);

    sender.send(vec![1, 2, 3]).await.unwrap();
    sender.close().await;
    sender.close().await;
    sender.close().await;

    assert_eq!(rx.recv().await, Some(SttCommand::Audio(vec![1, 2, 3])));
    // Only the first close sends a finish command
    assert_eq!(rx.recv().await, Some(SttCommand::Finish));
    drop(sender);
    assert_eq!(rx.recv().await, None);
}

#[tokio::test]
async fn test_audio_sender_rejects_after_close() {
    let (tx, _rx) = mpsc::channel::<SttCommand>(8);
    let sender = SttAudioSender::new(tx);

    sender.close().await;
    let err = sender.send(vec![0u8; 4]).await.unwrap_err();
    assert!(matches!(err, SttError::ChannelClosed));
    assert!(sender.is_closed());
}

#[tokio::test]
async fn test_audio_sender_clone_shares_close_state() {
    let (tx, _rx) = mpsc::channel::<SttCommand>(8);
    let sender = SttAudioSender::new(tx);
    let clone = sender.clone();

    sender.close().await;
    assert!(clone.is_closed());
    assert!(clone.send(vec![1]).await.is_err());
}
