//! Core types shared by the registry, transport and bridge

mod message;
mod tool;
mod stream;
mod cancellation;

pub use message::{ConversationMessage, Role};
pub use tool::{FunctionSpec, ParamType, ParameterSpec, ToolCallRequest, ToolMetadata};
pub use stream::{ModelResponse, StreamChunk};
pub use cancellation::CancellationToken;
