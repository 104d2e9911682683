//! Relay session management
//!
//! This module provides the `RelaySession` abstraction that manages:
//! - The client transport protocol (inbound frames, outbound messages)
//! - The STT adapter lifecycle and event consumption
//! - Analysis triggering and result delivery
//! - The session state machine and single teardown path
//! - The process-wide registry of active sessions

pub mod messages;
pub mod registry;
pub mod relay;

pub use messages::{ClientFrame, ServerMessage, END_STREAM_TOKEN};
pub use registry::{SessionInfo, SessionRegistry};
pub use relay::{RelayConfig, RelaySession, SessionState, SessionStatus};
