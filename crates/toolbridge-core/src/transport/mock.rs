//! Mock transport for testing
//!
//! Replies are scripted in order, one per `send`/`open_stream` call, and
//! every request is recorded so tests can assert on what the bridge sent.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use futures::{stream, StreamExt};
use parking_lot::Mutex;

use crate::error::{ErrorKind, OperationError, OperationResult};
use crate::types::{CancellationToken, ModelResponse, StreamChunk, ToolCallRequest};
use super::traits::{ChatRequest, ChunkStream, Transport};

/// One scripted reply
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Plain final answer
    Text(String),
    /// Structured tool call with optional accompanying content
    ToolCall { content: String, call: ToolCallRequest },
    /// Raw chunks for streaming; `send` folds them into one response
    Chunks(Vec<StreamChunk>),
    /// Fail the call before any output
    Error(ErrorKind, String),
    /// Stream these chunks, then fail mid-stream
    StreamError {
        chunks: Vec<StreamChunk>,
        kind: ErrorKind,
        message: String,
    },
}

impl MockReply {
    pub fn text(content: impl Into<String>) -> Self {
        MockReply::Text(content.into())
    }

    pub fn tool_call(call: ToolCallRequest) -> Self {
        MockReply::ToolCall {
            content: String::new(),
            call,
        }
    }

    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        MockReply::Error(kind, message.into())
    }

    /// Content deltas followed by the completion marker
    pub fn chunks<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut chunks: Vec<StreamChunk> = parts.into_iter().map(StreamChunk::content).collect();
        chunks.push(StreamChunk::Done);
        MockReply::Chunks(chunks)
    }

    fn into_chunks(self) -> Vec<OperationResult<StreamChunk>> {
        match self {
            MockReply::Text(content) => vec![Ok(StreamChunk::content(content)), Ok(StreamChunk::Done)],
            MockReply::ToolCall { content, call } => {
                let mut out = Vec::new();
                if !content.is_empty() {
                    out.push(Ok(StreamChunk::content(content)));
                }
                out.push(Ok(StreamChunk::tool_call(call)));
                out.push(Ok(StreamChunk::Done));
                out
            }
            MockReply::Chunks(chunks) => chunks.into_iter().map(Ok).collect(),
            MockReply::Error(kind, message) => vec![Err(OperationError::new(kind, message))],
            MockReply::StreamError { chunks, kind, message } => {
                let mut out: Vec<_> = chunks.into_iter().map(Ok).collect();
                out.push(Err(OperationError::new(kind, message)));
                out
            }
        }
    }
}

/// Scripted in-memory transport
#[derive(Default)]
pub struct MockTransport {
    replies: Mutex<VecDeque<MockReply>>,
    /// Used once the script runs out
    fallback: Option<MockReply>,
    requests: Mutex<Vec<ChatRequest>>,
    models: Vec<String>,
    chunk_delay: Option<Duration>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_replies(replies: impl IntoIterator<Item = MockReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Reply used for every call once the scripted replies run out
    pub fn repeating(mut self, reply: MockReply) -> Self {
        self.fallback = Some(reply);
        self
    }

    pub fn with_models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.models = models.into_iter().map(Into::into).collect();
        self
    }

    /// Delay before every streamed chunk after the first
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }

    pub fn push(&self, reply: MockReply) {
        self.replies.lock().push_back(reply);
    }

    /// Number of `send`/`open_stream` calls so far
    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Every request received, oldest first
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().clone()
    }

    fn next_reply(&self, request: &ChatRequest) -> OperationResult<MockReply> {
        self.requests.lock().push(request.clone());
        self.replies
            .lock()
            .pop_front()
            .or_else(|| self.fallback.clone())
            .ok_or_else(|| OperationError::server_fault("mock transport has no scripted reply left"))
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn name(&self) -> &str {
        "mock"
    }

    async fn send(&self, request: &ChatRequest) -> OperationResult<ModelResponse> {
        let mut response = ModelResponse::default();
        for chunk in self.next_reply(request)?.into_chunks() {
            match chunk? {
                StreamChunk::Content { text } => response.content.push_str(&text),
                StreamChunk::ToolCall { call } => response.tool_calls.push(call),
                StreamChunk::ToolCallDelta { .. } | StreamChunk::Done => {}
            }
        }
        Ok(response)
    }

    async fn open_stream(&self, request: &ChatRequest, cancel: CancellationToken) -> OperationResult<ChunkStream> {
        let items = match self.next_reply(request)? {
            MockReply::Error(kind, message) => return Err(OperationError::new(kind, message)),
            reply => reply.into_chunks(),
        };
        let delay = self.chunk_delay;
        let chunks = stream::iter(items.into_iter().enumerate())
            .then(move |(i, item)| {
                let cancel = cancel.clone();
                async move {
                    if let Some(delay) = delay.filter(|_| i > 0) {
                        tokio::time::sleep(delay).await;
                    }
                    if cancel.is_cancelled() {
                        return Err(OperationError::cancelled());
                    }
                    item
                }
            })
            // Stop after the first error, like a real connection would
            .scan(false, |failed, item| {
                let emit = if *failed { None } else { Some(item) };
                if matches!(emit, Some(Err(_))) {
                    *failed = true;
                }
                futures::future::ready(emit)
            });
        Ok(Box::pin(chunks))
    }

    async fn list_models(&self) -> OperationResult<Vec<String>> {
        Ok(self.models.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ConversationMessage;
    use serde_json::json;

    fn request() -> ChatRequest {
        ChatRequest::new("mock", vec![ConversationMessage::user("hi")])
    }

    #[tokio::test]
    async fn test_scripted_replies_in_order() {
        let call = ToolCallRequest::new("clock", "now", json!({}));
        let mock = MockTransport::with_replies([MockReply::tool_call(call.clone()), MockReply::text("done")]);

        let first = mock.send(&request()).await.unwrap();
        assert_eq!(first.tool_calls, vec![call]);
        let second = mock.send(&request()).await.unwrap();
        assert_eq!(second.content, "done");
        assert_eq!(mock.call_count(), 2);

        let err = mock.send(&request()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ServerFault);
    }

    #[tokio::test]
    async fn test_repeating_reply() {
        let mock = MockTransport::new().repeating(MockReply::text("again"));
        for _ in 0..3 {
            assert_eq!(mock.send(&request()).await.unwrap().content, "again");
        }
    }

    #[tokio::test]
    async fn test_stream_chunks() {
        let mock = MockTransport::with_replies([MockReply::chunks(["Hello", " world"])]);
        let chunks: Vec<_> = mock
            .open_stream(&request(), CancellationToken::new())
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].as_ref().unwrap().as_content(), Some("Hello"));
        assert!(chunks[2].as_ref().unwrap().is_done());
    }

    #[tokio::test]
    async fn test_stream_error_stops_stream() {
        let mock = MockTransport::with_replies([MockReply::StreamError {
            chunks: vec![StreamChunk::content("par")],
            kind: ErrorKind::Connection,
            message: "reset".into(),
        }]);
        let chunks: Vec<_> = mock
            .open_stream(&request(), CancellationToken::new())
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].as_ref().unwrap_err().kind(), ErrorKind::Connection);
    }

    #[tokio::test]
    async fn test_open_error_fails_before_stream() {
        let mock = MockTransport::with_replies([MockReply::error(ErrorKind::NotFound, "no model")]);
        let result = mock.open_stream(&request(), CancellationToken::new()).await;
        assert_eq!(result.err().map(|e| e.kind()), Some(ErrorKind::NotFound));
    }
}
