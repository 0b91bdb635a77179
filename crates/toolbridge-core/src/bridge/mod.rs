//! Conversation orchestration
//!
//! A [`Bridge`] owns one conversation with the model. Each user turn is sent
//! to the endpoint; when the model asks for a tool, the bridge runs it through
//! the [`ToolRegistry`](crate::tools::ToolRegistry), feeds the result back and
//! asks again, until the model answers in plain text or the per-turn loop cap
//! is reached.
//!
//! ```text
//!   Idle ──start()──▶ Running ──stop()──▶ Stopped
//! ```
//!
//! [`BridgeManager`] keeps several independent bridges that share one tool
//! registry; [`HostBridge`] is the narrow surface a hosting UI talks to.

mod parser;
mod session;
mod manager;
mod host;

pub use parser::parse_fallback_tool_call;
pub use session::Bridge;
pub use manager::{BridgeId, BridgeManager};
pub use host::HostBridge;

/// Default cap on tool calls per user turn
pub const MAX_TOOL_ITERATIONS: u32 = 5;

/// Lifecycle state of a bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BridgeState {
    Idle,
    Running,
    Stopped,
}

impl std::fmt::Display for BridgeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BridgeState::Idle => write!(f, "idle"),
            BridgeState::Running => write!(f, "running"),
            BridgeState::Stopped => write!(f, "stopped"),
        }
    }
}
