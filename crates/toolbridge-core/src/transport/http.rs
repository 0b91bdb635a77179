//! HTTP transport for a locally hosted model endpoint

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::{stream, Stream, StreamExt};
use serde_json::Value;

use crate::config::EndpointConfig;
use crate::error::{OperationError, OperationResult};
use crate::logging::SharedLogger;
use crate::types::{CancellationToken, ModelResponse, StreamChunk};
use super::traits::{ChatRequest, ChunkStream, Transport};
use super::wire::{self, ChunkQueue, FrameDecoder};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

type ByteStream = Pin<Box<dyn Stream<Item = reqwest::Result<Vec<u8>>> + Send>>;

/// Transport speaking the JSON wire format over HTTP
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: EndpointConfig,
    logger: SharedLogger,
}

impl HttpTransport {
    pub fn new(endpoint: EndpointConfig, logger: SharedLogger) -> OperationResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(OperationError::from_reqwest)?;
        Ok(Self {
            client,
            endpoint,
            logger,
        })
    }

    pub fn endpoint(&self) -> &EndpointConfig {
        &self.endpoint
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.endpoint.request_timeout_secs)
    }

    /// Turn a non-success status into an error, reading the body for detail
    async fn check_status(&self, response: reqwest::Response) -> OperationResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let error = OperationError::from_status(status.as_u16(), &body);
        self.logger.warn(&format!("[HttpTransport] {} from endpoint: {}", status, error.message()));
        Err(error)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn name(&self) -> &str {
        "http"
    }

    async fn send(&self, request: &ChatRequest) -> OperationResult<ModelResponse> {
        let url = self.endpoint.chat_url();
        self.logger.debug(&format!(
            "[HttpTransport] POST {} model={} messages={}",
            url,
            request.model,
            request.messages.len()
        ));
        let response = self
            .client
            .post(&url)
            .timeout(self.request_timeout())
            .json(&wire::encode_request(request, false))
            .send()
            .await
            .map_err(OperationError::from_reqwest)?;
        let response = self.check_status(response).await?;
        let body: Value = response.json().await.map_err(OperationError::from_reqwest)?;
        wire::decode_response(&body)
    }

    async fn open_stream(&self, request: &ChatRequest, cancel: CancellationToken) -> OperationResult<ChunkStream> {
        let url = self.endpoint.chat_url();
        self.logger.debug(&format!("[HttpTransport] POST {} (stream) model={}", url, request.model));
        // No total timeout here: a long generation must not be cut off mid-stream.
        let response = self
            .client
            .post(&url)
            .json(&wire::encode_request(request, true))
            .send()
            .await
            .map_err(OperationError::from_reqwest)?;
        let response = self.check_status(response).await?;

        let bytes: ByteStream = Box::pin(response.bytes_stream().map(|r| r.map(|b| b.to_vec())));
        Ok(decode_stream(bytes, cancel))
    }

    async fn list_models(&self) -> OperationResult<Vec<String>> {
        let url = self.endpoint.models_url();
        self.logger.debug(&format!("[HttpTransport] GET {}", url));
        let response = self
            .client
            .get(&url)
            .timeout(self.request_timeout())
            .send()
            .await
            .map_err(OperationError::from_reqwest)?;
        let response = self.check_status(response).await?;
        let body: Value = response.json().await.map_err(OperationError::from_reqwest)?;
        wire::decode_model_list(&body)
    }
}

struct DecodeState {
    bytes: ByteStream,
    decoder: FrameDecoder,
    queue: ChunkQueue,
    cancel: CancellationToken,
    ended: bool,
}

/// Decode a byte stream into chunks.
///
/// The chunk stream ends after `Done`, after the first error, or when
/// `cancel` fires (yielding a `Cancelled` error). Bytes ending without a
/// completion marker yield a `Connection` error.
fn decode_stream(bytes: ByteStream, cancel: CancellationToken) -> ChunkStream {
    let state = DecodeState {
        bytes,
        decoder: FrameDecoder::new(),
        queue: ChunkQueue::new(),
        cancel,
        ended: false,
    };
    Box::pin(stream::unfold(state, |mut st| async move {
        loop {
            if let Some(item) = st.queue.pop_front() {
                return Some((item, st));
            }
            if st.ended {
                return None;
            }
            let cancel = st.cancel.clone();
            match cancel.run_until_cancelled(st.bytes.next()).await {
                None => {
                    st.ended = true;
                    st.queue.push_back(Err(OperationError::cancelled()));
                }
                Some(Some(Ok(bytes))) => {
                    let decoded = st.decoder.push(&bytes);
                    st.enqueue(decoded);
                }
                Some(Some(Err(e))) => {
                    st.ended = true;
                    st.queue.push_back(Err(OperationError::from_reqwest(e).context("stream interrupted")));
                }
                Some(None) => {
                    let decoded = st.decoder.finish();
                    st.enqueue(decoded);
                    if !st.decoder.is_finished() {
                        st.queue.push_back(Err(OperationError::connection(
                            "stream ended before the completion marker",
                        )));
                    }
                    st.ended = true;
                }
            }
        }
    }))
}

impl DecodeState {
    fn enqueue(&mut self, decoded: OperationResult<Vec<StreamChunk>>) {
        match decoded {
            Ok(chunks) => self.queue.extend(chunks.into_iter().map(Ok)),
            Err(e) => {
                self.queue.push_back(Err(e));
                self.ended = true;
            }
        }
        if self.decoder.is_finished() {
            self.ended = true;
        }
    }
}
