use crate::session::RelayConfig;
use crate::stt::SttOptions;
use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub stt: SttConfig,
    pub analysis: AnalysisConfig,
    pub relay: RelaySettings,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "consult-relay".to_string(),
            http: HttpConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

/// STT provider settings; the credential can also come from the
/// `DEEPGRAM_API_KEY` environment variable
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SttConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub language: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub encoding: String,
    pub diarize: bool,
    pub smart_format: bool,
    pub endpointing: bool,
}

impl Default for SttConfig {
    fn default() -> Self {
        let options = SttOptions::default();
        Self {
            api_key: None,
            model: options.model,
            language: options.language,
            sample_rate: options.sample_rate,
            channels: options.channels,
            encoding: options.encoding,
            diarize: options.diarize,
            smart_format: options.smart_format,
            endpointing: options.endpointing,
        }
    }
}

/// Analysis provider settings; the credential can also come from the
/// `GOOGLE_API_KEY` environment variable
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: crate::analysis::gemini::DEFAULT_BASE_URL.to_string(),
            model: crate::analysis::gemini::DEFAULT_MODEL.to_string(),
        }
    }
}

/// Relay session tuning
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RelaySettings {
    /// New finalized characters required before an analysis call launches
    pub analysis_threshold: usize,

    /// Seconds to wait for an in-flight analysis during teardown
    pub drain_timeout_secs: u64,

    /// Provider errors tolerated before a session becomes fatal
    pub max_provider_errors: u32,
}

impl Default for RelaySettings {
    fn default() -> Self {
        let relay = RelayConfig::default();
        Self {
            analysis_threshold: relay.analysis_threshold,
            drain_timeout_secs: relay.drain_timeout.as_secs(),
            max_provider_errors: relay.max_provider_errors,
        }
    }
}

impl Config {
    /// Load configuration from an optional file plus environment overrides
    /// (e.g. `CONSULT_STT__API_KEY`). Provider credentials fall back to the
    /// conventional environment variables.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("CONSULT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut cfg: Config = settings.try_deserialize()?;

        if cfg.stt.api_key.is_none() {
            cfg.stt.api_key = std::env::var("DEEPGRAM_API_KEY").ok();
        }
        if cfg.analysis.api_key.is_none() {
            cfg.analysis.api_key = std::env::var("GOOGLE_API_KEY").ok();
        }

        Ok(cfg)
    }

    /// STT session options derived from the config
    pub fn stt_options(&self) -> SttOptions {
        SttOptions {
            model: self.stt.model.clone(),
            language: self.stt.language.clone(),
            sample_rate: self.stt.sample_rate,
            channels: self.stt.channels,
            encoding: self.stt.encoding.clone(),
            diarize: self.stt.diarize,
            smart_format: self.stt.smart_format,
            endpointing: self.stt.endpointing,
        }
    }

    /// Relay behavior derived from the config
    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig {
            analysis_threshold: self.relay.analysis_threshold,
            drain_timeout: Duration::from_secs(self.relay.drain_timeout_secs),
            max_provider_errors: self.relay.max_provider_errors,
        }
    }
}
