pub mod analysis;
pub mod config;
pub mod http;
pub mod session;
pub mod stt;
pub mod transcript;

pub use analysis::{
    AnalysisError, AnalysisOutcome, AnalysisProvider, AnalysisReport, AnalysisTrigger,
    GeminiAnalyst,
};
pub use config::Config;
pub use http::{create_router, AppState};
pub use session::{
    ClientFrame, RelayConfig, RelaySession, ServerMessage, SessionInfo, SessionRegistry,
    SessionState, SessionStatus,
};
pub use stt::{
    DeepgramConnector, SttAudioSender, SttConnector, SttError, SttEvent, SttHandle, SttOptions,
};
pub use transcript::{speaker_label, TranscriptAccumulator, TranscriptSegment};
