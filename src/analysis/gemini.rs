//! Gemini-style analysis client
//!
//! One request/response call per transcript chunk: the prompt asks for a
//! strict JSON report (symptoms, suggestions, severity, diagnoses) and the
//! candidate text is parsed back into an `AnalysisReport`. Provider errors
//! are converted to `AnalysisError` at this boundary and never propagate
//! further.

use super::{AnalysisError, AnalysisProvider, AnalysisReport};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

/// Default provider endpoint
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default model name
pub const DEFAULT_MODEL: &str = "gemini-2.5-pro-exp-03-25";

/// Request timeout; the analysis call is slow (seconds) but bounded
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Client for the Gemini-style `generateContent` analysis API
pub struct GeminiAnalyst {
    http: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl GeminiAnalyst {
    pub fn new(api_key: Option<String>) -> Self {
        Self::with_endpoint(api_key, DEFAULT_BASE_URL, DEFAULT_MODEL)
    }

    /// Override endpoint and model (used against local test servers)
    pub fn with_endpoint(
        api_key: Option<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            base_url: base_url.into(),
            model: model.into(),
        }
    }
}

/// Build the analysis prompt for one transcript chunk.
///
/// The provider is instructed to answer strictly in the JSON shape that
/// deserializes into `AnalysisReport`.
pub fn build_prompt(transcript: &str) -> String {
    format!(
        r#"Analyze the following medical consultation transcript snippet. Act as a highly astute medical assistant analyzing the conversation between a doctor and a patient.

Transcript Snippet:
---
{}
---

Based strictly on the transcript snippet provided:
1. Identify and list key patient symptoms mentioned, with qualifying details. Distinguish primary symptoms from associated minor complaints. Return an empty list if none are mentioned.
2. Suggest 3-5 insightful follow-up questions the doctor could ask next. Return an empty list if the snippet lacks context.
3. Assess the potential clinical severity as one of "Low", "Medium", "High", "Urgent", defaulting to "Low", with a one-sentence rationale.
4. List up to 3 potential differential diagnoses ordered by likelihood, each with a confidence of "High", "Medium" or "Low" and a one-sentence rationale. Return an empty list if there is insufficient information.

Return your analysis strictly in the following JSON format, with no explanatory text outside the JSON structure:
{{
  "symptoms": [
    {{"description": "Detailed symptom description", "is_primary": true}}
  ],
  "suggestions": [
    "Insightful question?"
  ],
  "severity": {{"level": "Chosen severity level", "rationale": "Brief rationale for severity."}},
  "diagnoses": [
    {{"name": "Possible diagnosis", "confidence": "High", "rationale": "Brief rationale for this diagnosis."}}
  ]
}}"#,
        transcript
    )
}

/// Extract the report from a `generateContent` response body.
///
/// The candidate text is itself JSON (the request asks for a JSON mime type);
/// anything that does not deserialize into the expected structure is a
/// malformed response.
pub fn extract_report(response: &Value) -> Result<AnalysisReport, AnalysisError> {
    let text = response["candidates"][0]["content"]["parts"][0]
        .get("text")
        .and_then(Value::as_str)
        .ok_or_else(|| AnalysisError::Malformed("no candidate text in response".to_string()))?;

    serde_json::from_str(text).map_err(|e| AnalysisError::Malformed(e.to_string()))
}

#[async_trait::async_trait]
impl AnalysisProvider for GeminiAnalyst {
    async fn analyze(&self, transcript: &str) -> Result<AnalysisReport, AnalysisError> {
        let api_key = self
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(AnalysisError::MissingCredential)?;

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, api_key
        );

        let body = json!({
            "contents": [{"parts": [{"text": build_prompt(transcript)}]}],
            "generationConfig": {
                "temperature": 0.7,
                "topP": 1,
                "topK": 1,
                "maxOutputTokens": 2048,
                "responseMimeType": "application/json",
            },
            "safetySettings": [
                {"category": "HARM_CATEGORY_HARASSMENT", "threshold": "BLOCK_MEDIUM_AND_ABOVE"},
                {"category": "HARM_CATEGORY_HATE_SPEECH", "threshold": "BLOCK_MEDIUM_AND_ABOVE"},
                {"category": "HARM_CATEGORY_SEXUALLY_EXPLICIT", "threshold": "BLOCK_MEDIUM_AND_ABOVE"},
                {"category": "HARM_CATEGORY_DANGEROUS_CONTENT", "threshold": "BLOCK_MEDIUM_AND_ABOVE"},
            ],
        });

        info!(
            "Requesting analysis for transcript chunk ({} chars)",
            transcript.len()
        );

        let response = self
            .http
            .post(&url)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .json(&body)
            .send()
            .await
            .map_err(|e| AnalysisError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AnalysisError::Status(status.as_u16()));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| AnalysisError::Malformed(e.to_string()))?;

        let report = extract_report(&payload)?;
        debug!(
            "Analysis succeeded: {} symptoms, {} diagnoses",
            report.symptoms.len(),
            report.diagnoses.len()
        );
        Ok(report)
    }
}
