//! Model response and streaming chunk types

use serde::{Deserialize, Serialize};
use super::tool::ToolCallRequest;

/// Result of one full model round trip
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelResponse {
    pub content: String,
    #[serde(default)]
    pub tool_calls: Vec<ToolCallRequest>,
}

impl ModelResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn with_tool_call(mut self, call: ToolCallRequest) -> Self {
        self.tool_calls.push(call);
        self
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Streaming chunk decoded from the endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamChunk {
    /// Text content delta
    Content {
        text: String,
    },
    /// Partial tool call; `arguments` is appended to the buffer at `index`
    ToolCallDelta {
        index: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        arguments: Option<String>,
    },
    /// Tool call whose arguments arrived complete
    ToolCall {
        call: ToolCallRequest,
    },
    /// Completion marker
    Done,
}

impl StreamChunk {
    pub fn content(text: impl Into<String>) -> Self {
        StreamChunk::Content { text: text.into() }
    }

    pub fn tool_call(call: ToolCallRequest) -> Self {
        StreamChunk::ToolCall { call }
    }

    pub fn tool_call_delta(index: usize, name: Option<String>, arguments: Option<String>) -> Self {
        StreamChunk::ToolCallDelta {
            index,
            name,
            arguments,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, StreamChunk::Done)
    }

    pub fn as_content(&self) -> Option<&str> {
        match self {
            StreamChunk::Content { text } => Some(text),
            _ => None,
        }
    }
}
