//! Transport trait definition

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use crate::error::OperationResult;
use crate::types::{CancellationToken, ConversationMessage, ModelResponse, StreamChunk};

/// One request to the model endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    /// Model identifier as the endpoint knows it
    pub model: String,
    /// Full message list, system message first
    pub messages: Vec<ConversationMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ConversationMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: 0.7,
            max_tokens: 2048,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Stream of decoded chunks; ends after [`StreamChunk::Done`]
pub type ChunkStream = Pin<Box<dyn Stream<Item = OperationResult<StreamChunk>> + Send>>;

/// A model endpoint.
///
/// Implementations perform exactly one attempt per call; retrying is the
/// job of [`TransportClient`](super::TransportClient).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Short name used in log lines (e.g. "http", "mock")
    fn name(&self) -> &str;

    /// Single round trip returning the complete response
    async fn send(&self, request: &ChatRequest) -> OperationResult<ModelResponse>;

    /// Open a streaming response.
    ///
    /// Errors returned here happen before any chunk was produced. The stream
    /// should stop producing chunks once `cancel` fires.
    async fn open_stream(&self, request: &ChatRequest, cancel: CancellationToken) -> OperationResult<ChunkStream>;

    /// Model ids the endpoint serves
    async fn list_models(&self) -> OperationResult<Vec<String>>;
}
