//! toolbridge core
//!
//! Lets a locally hosted language model drive callable tools. The crate is
//! runtime agnostic: hosts (editor extensions, CLIs, chat panels) embed it and
//! talk to it through [`bridge::HostBridge`].
//!
//! ## Components
//!
//! - [`retry::RetryExecutor`] retries connection failures with a constant delay
//! - [`tools::ToolRegistry`] stores tools, scores them against prompts and
//!   executes validated calls
//! - [`transport::TransportClient`] talks to the model endpoint, whole or
//!   streamed
//! - [`bridge::Bridge`] runs the conversation and the tool-call loop
//!
//! ```rust,ignore
//! use toolbridge_core::{Bridge, BridgeConfig, ConsoleLogger, ToolRegistry};
//!
//! let logger = Arc::new(ConsoleLogger::from_env());
//! let registry = Arc::new(ToolRegistry::new(logger.clone()));
//! registry.register_tool(weather_tool(), Some(ToolMetadata::new().with_keywords(["weather"])));
//!
//! let bridge = Bridge::connect(BridgeConfig::new("llama3.1"), registry, logger)?;
//! bridge.start()?;
//! let answer = bridge.send_prompt("What's the weather in Oslo?").await?;
//! ```

pub mod error;
pub mod logging;
pub mod config;
pub mod types;
pub mod retry;
pub mod tools;
pub mod transport;
pub mod bridge;

// Re-export commonly used types
pub use error::{BoxError, ErrorKind, OperationError, OperationResult};

pub use logging::{ConsoleLogger, Logger, LogLevel, MemoryLogger, NoOpLogger, SharedLogger};

pub use config::{load_layered, BridgeConfig, ConfigError, EndpointConfig, FileConfigLoader, RetryConfig};

pub use types::{
    CancellationToken, ConversationMessage, FunctionSpec, ModelResponse, ParamType, ParameterSpec, Role,
    StreamChunk, ToolCallRequest, ToolMetadata,
};

pub use retry::RetryExecutor;

pub use tools::{handler_fn, Tool, ToolArguments, ToolHandler, ToolRegistry};

pub use transport::{ChatRequest, HttpTransport, StreamHandler, Transport, TransportClient};

pub use bridge::{Bridge, BridgeId, BridgeManager, BridgeState, HostBridge, MAX_TOOL_ITERATIONS};
