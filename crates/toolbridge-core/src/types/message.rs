//! Conversation message types

use serde::{Deserialize, Serialize};

use super::tool::ToolCallRequest;

/// Message role in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    /// Result of a tool execution, fed back to the model
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

/// One entry of a bridge conversation.
///
/// Assistant messages that requested a tool carry the call in `tool_call`.
/// Tool messages carry the same call so the pair can be matched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
    #[serde(rename = "toolCall", default, skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<ToolCallRequest>,
}

impl ConversationMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, content)
    }

    /// Assistant turn that asked for a tool call
    pub fn assistant_tool_call(content: impl Into<String>, call: ToolCallRequest) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_call: Some(call),
        }
    }

    /// Tool output answering `call`
    pub fn tool_result(call: ToolCallRequest, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_call: Some(call),
        }
    }

    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_call: None,
        }
    }

    /// Whether this is an assistant message requesting a tool
    pub fn requests_tool(&self) -> bool {
        self.role == Role::Assistant && self.tool_call.is_some()
    }
}
