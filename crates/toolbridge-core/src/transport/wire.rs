//! JSON wire format of the model endpoint
//!
//! Requests are encoded as
//! `{model, messages: [{role, content, tool_calls?, name?}], stream, temperature, max_tokens}`.
//! Tool calls travel as `{name: "tool.function", arguments}`.
//!
//! Responses come in two shapes: the flat `{content, tool_calls}` form and
//! the chat-API form `{message: {content, tool_calls: [{function: {...}}]}}`.
//! Streaming responses are newline-delimited frames of the same shapes,
//! optionally prefixed with `data: `, ending at `done: true` or `[DONE]`.

use std::collections::VecDeque;

use serde_json::{json, Map, Value};

use crate::error::{OperationError, OperationResult};
use crate::types::{ConversationMessage, ModelResponse, Role, StreamChunk, ToolCallRequest};
use super::traits::ChatRequest;

/// Encode a request body
pub fn encode_request(request: &ChatRequest, stream: bool) -> Value {
    let messages: Vec<Value> = request.messages.iter().map(encode_message).collect();
    json!({
        "model": request.model,
        "messages": messages,
        "stream": stream,
        "temperature": request.temperature,
        "max_tokens": request.max_tokens,
    })
}

fn encode_message(message: &ConversationMessage) -> Value {
    let mut out = Map::new();
    out.insert("role".into(), Value::String(message.role.to_string()));
    out.insert("content".into(), Value::String(message.content.clone()));
    if let Some(call) = &message.tool_call {
        match message.role {
            Role::Assistant => {
                out.insert(
                    "tool_calls".into(),
                    json!([{ "name": call.qualified_name(), "arguments": call.parameters }]),
                );
            }
            Role::Tool => {
                out.insert("name".into(), Value::String(call.qualified_name()));
            }
            _ => {}
        }
    }
    Value::Object(out)
}

/// Decode a complete (non-streaming) response body
pub fn decode_response(body: &Value) -> OperationResult<ModelResponse> {
    check_endpoint_error(body)?;
    let message = body.get("message").filter(|m| m.is_object()).unwrap_or(body);
    if message.get("content").is_none() && message.get("tool_calls").is_none() {
        return Err(OperationError::server_fault(format!(
            "unrecognized response shape: expected `content`, `message` or `tool_calls`, got {}",
            truncate(&body.to_string())
        ))
        .with_suggestion("Check that the endpoint speaks the chat API configured in `chat_path`."));
    }
    let content = match message.get("content") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => {
            return Err(OperationError::server_fault(format!(
                "response content must be a string, got {}",
                other
            )))
        }
    };

    let mut tool_calls = Vec::new();
    if let Some(calls) = message.get("tool_calls").and_then(Value::as_array) {
        for raw in calls {
            tool_calls.push(decode_tool_call(raw)?);
        }
    }
    Ok(ModelResponse { content, tool_calls })
}

/// An `error` field means the endpoint refused the request despite its status
fn check_endpoint_error(body: &Value) -> OperationResult<()> {
    let detail = match body.get("error") {
        None | Some(Value::Null) => return Ok(()),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| other.to_string()),
    };
    Err(OperationError::server_fault(format!("endpoint error: {}", detail)))
}

fn truncate(text: &str) -> String {
    const LIMIT: usize = 200;
    match text.char_indices().nth(LIMIT) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Decode one tool call in either the flat or the `function`-wrapped form
fn decode_tool_call(raw: &Value) -> OperationResult<ToolCallRequest> {
    let inner = raw.get("function").filter(|f| f.is_object()).unwrap_or(raw);
    let arguments = match inner.get("arguments") {
        None | Some(Value::Null) => Value::Object(Map::new()),
        Some(Value::String(text)) => parse_arguments(text)?,
        Some(other) => other.clone(),
    };

    let tool = inner.get("tool").and_then(Value::as_str);
    let function = inner.get("function").and_then(Value::as_str);
    let name = inner.get("name").and_then(Value::as_str);
    match (tool, function, name) {
        (Some(tool), Some(function), _) => Ok(ToolCallRequest::new(tool, function, arguments)),
        (_, _, Some(name)) if !name.is_empty() => Ok(ToolCallRequest::from_qualified(name, arguments)),
        _ => Err(OperationError::server_fault(format!("tool call without a name: {}", raw))),
    }
}

/// Parse a JSON-encoded argument string; empty means no arguments
pub fn parse_arguments(text: &str) -> OperationResult<Value> {
    if text.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_str(text).map_err(|e| {
        OperationError::server_fault(format!("tool call arguments are not valid JSON: {}", e)).with_cause(e)
    })
}

/// Splits a byte stream into frames and decodes them into chunks
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    finished: bool,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a completion marker was seen
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Feed raw bytes; returns the chunks of every complete line
    pub fn push(&mut self, bytes: &[u8]) -> OperationResult<Vec<StreamChunk>> {
        self.buffer.extend_from_slice(bytes);
        let mut chunks = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.decode_line(&line, &mut chunks)?;
        }
        Ok(chunks)
    }

    /// Decode whatever is left once the byte stream ends
    pub fn finish(&mut self) -> OperationResult<Vec<StreamChunk>> {
        let rest = std::mem::take(&mut self.buffer);
        let mut chunks = Vec::new();
        self.decode_line(&rest, &mut chunks)?;
        Ok(chunks)
    }

    fn decode_line(&mut self, raw: &[u8], out: &mut Vec<StreamChunk>) -> OperationResult<()> {
        if self.finished {
            return Ok(());
        }
        let line = String::from_utf8_lossy(raw);
        let line = line.trim();
        if line.is_empty() || line.starts_with(':') || is_sse_field(line) {
            return Ok(());
        }
        let payload = line.strip_prefix("data:").map(str::trim_start).unwrap_or(line);
        if payload == "[DONE]" {
            self.finished = true;
            out.push(StreamChunk::Done);
            return Ok(());
        }
        let frame: Value = serde_json::from_str(payload).map_err(|e| {
            OperationError::server_fault(format!("malformed stream frame: {}", e)).with_cause(e)
        })?;
        decode_frame(&frame, out)?;
        if frame.get("done").and_then(Value::as_bool).unwrap_or(false) {
            self.finished = true;
            out.push(StreamChunk::Done);
        }
        Ok(())
    }
}

/// SSE field lines other than `data:` carry nothing to decode
fn is_sse_field(line: &str) -> bool {
    ["event:", "id:", "retry:"].iter().any(|field| line.starts_with(field))
}

fn decode_frame(frame: &Value, out: &mut Vec<StreamChunk>) -> OperationResult<()> {
    check_endpoint_error(frame)?;
    let message = frame.get("message").filter(|m| m.is_object()).unwrap_or(frame);
    if let Some(text) = message.get("content").and_then(Value::as_str) {
        if !text.is_empty() {
            out.push(StreamChunk::content(text));
        }
    }
    let Some(calls) = message.get("tool_calls").and_then(Value::as_array) else {
        return Ok(());
    };
    for (position, raw) in calls.iter().enumerate() {
        let inner = raw.get("function").filter(|f| f.is_object()).unwrap_or(raw);
        let index = raw
            .get("index")
            .and_then(Value::as_u64)
            .map(|i| i as usize)
            .unwrap_or(position);
        match inner.get("arguments") {
            // Object arguments arrive whole
            Some(Value::Object(_)) => out.push(StreamChunk::tool_call(decode_tool_call(raw)?)),
            Some(Value::String(fragment)) => out.push(StreamChunk::tool_call_delta(
                index,
                inner.get("name").and_then(Value::as_str).map(str::to_string),
                Some(fragment.clone()),
            )),
            _ => out.push(StreamChunk::tool_call_delta(
                index,
                inner.get("name").and_then(Value::as_str).map(str::to_string),
                None,
            )),
        }
    }
    Ok(())
}

/// Chunks queued between byte reads
pub(crate) type ChunkQueue = VecDeque<OperationResult<StreamChunk>>;

/// Extract model ids from a model listing body
pub fn decode_model_list(body: &Value) -> OperationResult<Vec<String>> {
    if let Some(models) = body.get("models").and_then(Value::as_array) {
        return Ok(models
            .iter()
            .filter_map(|m| m.get("name").or_else(|| m.get("model")).and_then(Value::as_str))
            .map(str::to_string)
            .collect());
    }
    if let Some(data) = body.get("data").and_then(Value::as_array) {
        return Ok(data
            .iter()
            .filter_map(|m| m.get("id").and_then(Value::as_str))
            .map(str::to_string)
            .collect());
    }
    Err(OperationError::server_fault("model listing has neither `models` nor `data`"))
}
