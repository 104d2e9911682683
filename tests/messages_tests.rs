use consult_relay::analysis::{AnalysisReport, Diagnosis, Severity, Symptom};
use consult_relay::session::ServerMessage;
use serde_json::{json, Value};

fn sample_report() -> AnalysisReport {
    AnalysisReport {
        symptoms: vec![Symptom {
            description: "Persistent morning headaches for one week".to_string(),
            is_primary: true,
        }],
        suggestions: vec!["Have you experienced any nausea with the headaches?".to_string()],
        severity: Severity {
            level: "Medium".to_string(),
            rationale: "Persistent headaches with dizziness warrant follow-up.".to_string(),
        },
        diagnoses: vec![Diagnosis {
            name: "Migraine".to_string(),
            confidence: "Medium".to_string(),
            rationale: "Recurrent headaches with light sensitivity.".to_string(),
        }],
    }
}

#[test]
fn test_status_message_shape() {
    let msg = ServerMessage::status("Transcription service ready");
    let value = serde_json::to_value(&msg).unwrap();
    assert_eq!(
        value,
        json!({"type": "status", "message": "Transcription service ready"})
    );
}

#[test]
fn test_transcript_message_shape() {
    let msg = ServerMessage::Transcript {
        is_final: true,
        speaker: "Doctor".to_string(),
        text: "How are you feeling today?".to_string(),
    };
    let value = serde_json::to_value(&msg).unwrap();
    assert_eq!(
        value,
        json!({
            "type": "transcript",
            "is_final": true,
            "speaker": "Doctor",
            "text": "How are you feeling today?"
        })
    );
}

#[test]
fn test_analysis_message_shape() {
    let msg = ServerMessage::Analysis {
        data: sample_report(),
    };
    let value = serde_json::to_value(&msg).unwrap();

    assert_eq!(value["type"], "analysis");
    let data = &value["data"];
    assert_eq!(data["symptoms"][0]["is_primary"], true);
    assert_eq!(
        data["symptoms"][0]["description"],
        "Persistent morning headaches for one week"
    );
    assert_eq!(data["severity"]["level"], "Medium");
    assert!(data["severity"]["rationale"].is_string());
    assert_eq!(data["diagnoses"][0]["name"], "Migraine");
    assert_eq!(data["diagnoses"][0]["confidence"], "Medium");
    assert!(data["suggestions"].is_array());
}

#[test]
fn test_error_and_end_message_shapes() {
    let error = serde_json::to_value(ServerMessage::error("Server error processing audio.")).unwrap();
    assert_eq!(
        error,
        json!({"type": "error", "message": "Server error processing audio."})
    );

    let end = serde_json::to_value(ServerMessage::end("Transcription completed")).unwrap();
    assert_eq!(
        end,
        json!({"type": "end", "message": "Transcription completed"})
    );
}

#[test]
fn test_no_snake_case_leaks_in_tag() {
    // The discriminator values are lowercase words, not variant names
    for (msg, tag) in [
        (ServerMessage::status("x"), "status"),
        (ServerMessage::error("x"), "error"),
        (ServerMessage::end("x"), "end"),
    ] {
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], tag);
    }
}

#[test]
fn test_analysis_report_deserializes_provider_json() {
    // The exact shape the analysis provider is instructed to return
    let raw = r#"{
        "symptoms": [
            {"description": "Sharp chest pain on inhalation, started 2 days ago", "is_primary": true},
            {"description": "Mild intermittent dizziness", "is_primary": false}
        ],
        "suggestions": [
            "On a scale of 1-10, how severe is the pain?",
            "Does the dizziness occur every time you stand?"
        ],
        "severity": {"level": "High", "rationale": "Chest pain requires prompt evaluation."},
        "diagnoses": [
            {"name": "Pleurisy", "confidence": "Medium", "rationale": "Pain worsens on inhalation."}
        ]
    }"#;

    let report: AnalysisReport = serde_json::from_str(raw).unwrap();
    assert_eq!(report.symptoms.len(), 2);
    assert!(report.symptoms[0].is_primary);
    assert!(!report.symptoms[1].is_primary);
    assert_eq!(report.suggestions.len(), 2);
    assert_eq!(report.severity.level, "High");
    assert_eq!(report.diagnoses[0].name, "Pleurisy");
}

#[test]
fn test_analysis_report_rejects_incomplete_structure() {
    // Missing severity.rationale must not deserialize
    let raw = r#"{
        "symptoms": [],
        "suggestions": [],
        "severity": {"level": "Low"},
        "diagnoses": []
    }"#;
    let result: Result<AnalysisReport, _> = serde_json::from_str(raw);
    assert!(result.is_err());
}

#[test]
fn test_server_message_roundtrip() {
    let original = ServerMessage::Transcript {
        is_final: false,
        speaker: "Speaker 3".to_string(),
        text: "partial words".to_string(),
    };
    let text = serde_json::to_string(&original).unwrap();
    let parsed: ServerMessage = serde_json::from_str(&text).unwrap();
    assert_eq!(parsed, original);
}

#[test]
fn test_unknown_message_type_rejected() {
    let raw = r#"{"type": "bogus", "message": "hi"}"#;
    let result: Result<ServerMessage, _> = serde_json::from_str(raw);
    assert!(result.is_err());

    let value: Value = serde_json::from_str(raw).unwrap();
    assert_eq!(value["type"], "bogus");
}
