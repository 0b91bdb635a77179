//! Transport client: a transport plus the shared retry policy

use std::sync::Arc;

use futures::StreamExt;

use crate::error::{OperationError, OperationResult};
use crate::logging::SharedLogger;
use crate::retry::RetryExecutor;
use crate::types::{CancellationToken, ModelResponse, StreamChunk};
use super::accumulator::ToolCallAccumulator;
use super::handler::StreamHandler;
use super::traits::{ChatRequest, Transport};

/// Sends requests through a [`Transport`], retrying connection failures.
///
/// For streams only opening the stream is retried. Once a chunk may have
/// reached the handler, a failure ends the stream: delivered content is
/// never replayed.
#[derive(Clone)]
pub struct TransportClient {
    transport: Arc<dyn Transport>,
    retry: RetryExecutor,
    logger: SharedLogger,
}

impl TransportClient {
    pub fn new(transport: Arc<dyn Transport>, retry: RetryExecutor, logger: SharedLogger) -> Self {
        Self {
            transport,
            retry,
            logger,
        }
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Single round trip
    pub async fn send(&self, request: &ChatRequest) -> OperationResult<ModelResponse> {
        let response = self
            .retry
            .execute("chat request", || self.transport.send(request))
            .await?;
        self.logger.debug(&format!(
            "[TransportClient] {} response: {} chars, {} tool calls",
            self.transport.name(),
            response.content.len(),
            response.tool_calls.len()
        ));
        Ok(response)
    }

    /// Stream a response into `handler` and return it assembled.
    ///
    /// Content deltas and completed tool calls are forwarded as they arrive.
    /// The terminal callbacks are left to the caller; see [`stream`](Self::stream).
    pub async fn stream_response(
        &self,
        request: &ChatRequest,
        handler: &mut dyn StreamHandler,
        cancel: &CancellationToken,
    ) -> OperationResult<ModelResponse> {
        let open = self
            .retry
            .execute("open stream", || self.transport.open_stream(request, cancel.clone()));
        let mut chunks = match cancel.run_until_cancelled(open).await {
            Some(opened) => opened?,
            None => return Err(self.cancelled()),
        };

        let mut response = ModelResponse::default();
        let mut pending = ToolCallAccumulator::new();
        let mut completed = false;
        loop {
            let next = match cancel.run_until_cancelled(chunks.next()).await {
                Some(next) => next,
                None => return Err(self.cancelled()),
            };
            match next {
                None => break,
                Some(Err(e)) => return Err(e),
                Some(Ok(StreamChunk::Content { text })) => {
                    handler.on_content(&text);
                    response.content.push_str(&text);
                }
                Some(Ok(StreamChunk::ToolCallDelta { index, name, arguments })) => {
                    pending.push(index, name.as_deref(), arguments.as_deref());
                }
                Some(Ok(StreamChunk::ToolCall { call })) => {
                    handler.on_tool_call(&call);
                    response.tool_calls.push(call);
                }
                Some(Ok(StreamChunk::Done)) => {
                    completed = true;
                    break;
                }
            }
        }
        if !completed {
            return Err(OperationError::connection("stream ended before the completion marker"));
        }

        for call in pending.finish()? {
            handler.on_tool_call(&call);
            response.tool_calls.push(call);
        }
        self.logger.debug(&format!(
            "[TransportClient] stream complete: {} chars, {} tool calls",
            response.content.len(),
            response.tool_calls.len()
        ));
        Ok(response)
    }

    /// Stream a response, then call `on_complete` or `on_error` exactly once
    pub async fn stream(
        &self,
        request: &ChatRequest,
        handler: &mut dyn StreamHandler,
        cancel: &CancellationToken,
    ) -> OperationResult<ModelResponse> {
        match self.stream_response(request, handler, cancel).await {
            Ok(response) => {
                handler.on_complete(&response.content);
                Ok(response)
            }
            Err(e) => {
                self.logger.error(&format!("[TransportClient] stream failed: {}", e));
                handler.on_error(&e);
                Err(e)
            }
        }
    }

    /// Model ids served by the endpoint
    pub async fn list_models(&self) -> OperationResult<Vec<String>> {
        self.retry
            .execute("list models", || self.transport.list_models())
            .await
    }

    /// Whether the endpoint answers; the error says why not
    pub async fn health_check(&self) -> OperationResult<()> {
        let models = self.list_models().await?;
        self.logger.info(&format!(
            "[TransportClient] {} endpoint healthy, {} models available",
            self.transport.name(),
            models.len()
        ));
        Ok(())
    }

    fn cancelled(&self) -> OperationError {
        self.logger.info("[TransportClient] stream cancelled");
        OperationError::cancelled()
    }
}
