use crate::analysis::AnalysisProvider;
use crate::session::{RelayConfig, SessionRegistry};
use crate::stt::{SttConnector, SttOptions};
use std::sync::Arc;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Process-wide table of active relay sessions
    pub registry: SessionRegistry,

    /// Connector for STT streaming sessions
    pub stt: Arc<dyn SttConnector>,

    /// External text-analysis collaborator
    pub analysis: Arc<dyn AnalysisProvider>,

    /// Options used when opening STT sessions
    pub stt_options: SttOptions,

    /// Relay behavior (analysis threshold, drain timeout, error tolerance)
    pub relay: RelayConfig,
}

impl AppState {
    pub fn new(
        stt: Arc<dyn SttConnector>,
        analysis: Arc<dyn AnalysisProvider>,
        stt_options: SttOptions,
        relay: RelayConfig,
    ) -> Self {
        Self {
            registry: SessionRegistry::new(),
            stt,
            analysis,
            stt_options,
            relay,
        }
    }
}
