//! Callbacks for streamed responses

use crate::error::{ErrorKind, OperationError};
use crate::types::ToolCallRequest;

/// Receives a streamed response as it arrives.
///
/// `on_complete` and `on_error` are terminal: exactly one of them is called
/// once, and nothing is called after it.
pub trait StreamHandler: Send {
    /// A content delta
    fn on_content(&mut self, text: &str);

    /// A tool call whose arguments are complete
    fn on_tool_call(&mut self, call: &ToolCallRequest);

    /// The final answer, after every delta was delivered
    fn on_complete(&mut self, content: &str);

    fn on_error(&mut self, error: &OperationError);
}

/// What a [`RecordingHandler`] saw
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Content(String),
    ToolCall(ToolCallRequest),
    Complete(String),
    Error(ErrorKind, String),
}

/// Handler that records every callback in order
#[derive(Debug, Default)]
pub struct RecordingHandler {
    pub events: Vec<StreamEvent>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::Content(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn tool_calls(&self) -> Vec<&ToolCallRequest> {
        self.events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::ToolCall(call) => Some(call),
                _ => None,
            })
            .collect()
    }

    pub fn completions(&self) -> usize {
        self.events.iter().filter(|e| matches!(e, StreamEvent::Complete(_))).count()
    }

    pub fn errors(&self) -> Vec<ErrorKind> {
        self.events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::Error(kind, _) => Some(*kind),
                _ => None,
            })
            .collect()
    }
}

impl StreamHandler for RecordingHandler {
    fn on_content(&mut self, text: &str) {
        self.events.push(StreamEvent::Content(text.to_string()));
    }

    fn on_tool_call(&mut self, call: &ToolCallRequest) {
        self.events.push(StreamEvent::ToolCall(call.clone()));
    }

    fn on_complete(&mut self, content: &str) {
        self.events.push(StreamEvent::Complete(content.to_string()));
    }

    fn on_error(&mut self, error: &OperationError) {
        self.events.push(StreamEvent::Error(error.kind(), error.message().to_string()));
    }
}
