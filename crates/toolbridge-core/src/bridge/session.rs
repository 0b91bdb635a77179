//! Bridge session: conversation state and the tool-call loop

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;

use crate::config::BridgeConfig;
use crate::error::{OperationError, OperationResult};
use crate::logging::SharedLogger;
use crate::retry::RetryExecutor;
use crate::tools::{Tool, ToolRegistry};
use crate::transport::{ChatRequest, HttpTransport, StreamHandler, Transport, TransportClient};
use crate::types::{CancellationToken, ConversationMessage, ModelResponse, ToolCallRequest, ToolMetadata};
use super::parser::parse_fallback_tool_call;
use super::BridgeState;

struct Session {
    state: BridgeState,
    conversation: Vec<ConversationMessage>,
    /// Tool calls made in the current user turn
    iteration_count: u32,
}

/// How a turn delivers its output
enum Delivery<'a, 'h> {
    Send,
    Stream {
        handler: &'a mut (dyn StreamHandler + 'h),
        cancel: &'a CancellationToken,
    },
}

/// Passes content deltas through; tool calls are reported by the bridge
/// itself once it decides which call to honor.
struct ContentForwarder<'a, 'h> {
    inner: &'a mut (dyn StreamHandler + 'h),
}

impl StreamHandler for ContentForwarder<'_, '_> {
    fn on_content(&mut self, text: &str) {
        self.inner.on_content(text);
    }

    fn on_tool_call(&mut self, _call: &ToolCallRequest) {}

    fn on_complete(&mut self, _content: &str) {}

    fn on_error(&mut self, _error: &OperationError) {}
}

/// Marks a turn as in flight until dropped
struct TurnGuard<'a> {
    in_flight: &'a AtomicBool,
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.store(false, Ordering::SeqCst);
    }
}

/// One conversation between a user, a model endpoint and the registered tools.
///
/// Turns on one bridge are strictly sequential: a turn started while another
/// is in flight is rejected. Separate bridges are independent and only share
/// the tool registry.
pub struct Bridge {
    config: BridgeConfig,
    registry: Arc<ToolRegistry>,
    client: TransportClient,
    logger: SharedLogger,
    session: Mutex<Session>,
    in_flight: AtomicBool,
}

impl Bridge {
    /// Create an idle bridge over `transport`
    pub fn new(
        config: BridgeConfig,
        transport: Arc<dyn Transport>,
        registry: Arc<ToolRegistry>,
        logger: SharedLogger,
    ) -> OperationResult<Self> {
        config.validate()?;
        let retry = RetryExecutor::from_config(&config.retry, Arc::clone(&logger));
        let client = TransportClient::new(transport, retry, Arc::clone(&logger));
        Ok(Self {
            config,
            registry,
            client,
            logger,
            session: Mutex::new(Session {
                state: BridgeState::Idle,
                conversation: Vec::new(),
                iteration_count: 0,
            }),
            in_flight: AtomicBool::new(false),
        })
    }

    /// Create an idle bridge talking HTTP to the configured endpoint
    pub fn connect(config: BridgeConfig, registry: Arc<ToolRegistry>, logger: SharedLogger) -> OperationResult<Self> {
        config.validate()?;
        let transport = HttpTransport::new(config.endpoint.clone(), Arc::clone(&logger))?;
        Self::new(config, Arc::new(transport), registry, logger)
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Client for model management calls (`list_models`, `health_check`)
    pub fn client(&self) -> &TransportClient {
        &self.client
    }

    pub fn state(&self) -> BridgeState {
        self.session.lock().state
    }

    /// Tool calls made so far in the current (or last) turn
    pub fn iteration_count(&self) -> u32 {
        self.session.lock().iteration_count
    }

    /// Copy of the conversation so far
    pub fn conversation(&self) -> Vec<ConversationMessage> {
        self.session.lock().conversation.clone()
    }

    /// Idle -> Running. Starting a running bridge does nothing; a stopped
    /// bridge cannot be restarted.
    pub fn start(&self) -> OperationResult<()> {
        let mut session = self.session.lock();
        match session.state {
            BridgeState::Idle => {
                session.state = BridgeState::Running;
                self.logger
                    .info(&format!("[Bridge] started (model={})", self.config.model));
                Ok(())
            }
            BridgeState::Running => Ok(()),
            BridgeState::Stopped => Err(OperationError::validation("bridge was stopped")
                .with_suggestion("Create a new bridge to start another session.")),
        }
    }

    /// Stop the bridge and drop its conversation
    pub fn stop(&self) {
        let mut session = self.session.lock();
        if session.state != BridgeState::Stopped {
            self.logger.info(&format!(
                "[Bridge] stopped after {} messages",
                session.conversation.len()
            ));
        }
        session.state = BridgeState::Stopped;
        session.conversation.clear();
        session.iteration_count = 0;
    }

    /// Start a new chat on a running bridge
    pub fn clear_conversation(&self) -> OperationResult<()> {
        // Turns are claimed under the session lock, so this check cannot race one.
        let mut session = self.session.lock();
        if session.state != BridgeState::Running {
            return Err(not_started());
        }
        if self.in_flight.load(Ordering::SeqCst) {
            return Err(turn_in_progress());
        }
        session.conversation.clear();
        session.iteration_count = 0;
        Ok(())
    }

    /// Register a tool with the shared registry
    pub fn register_tool(&self, tool: Tool, metadata: Option<ToolMetadata>) {
        self.registry.register_tool(tool, metadata);
    }

    /// Run one user turn and return the model's final answer
    pub async fn send_prompt(&self, prompt: &str) -> OperationResult<String> {
        let _turn = self.begin_turn(prompt)?;
        self.run_turn(prompt, Delivery::Send).await.map_err(|e| self.turn_failed(e))
    }

    /// Run one user turn, streaming content into `handler`.
    ///
    /// The handler sees content deltas live and each honored tool call
    /// before it runs. It then gets exactly one of `on_complete` (with the
    /// final answer) or `on_error`.
    pub async fn stream_message(
        &self,
        prompt: &str,
        handler: &mut dyn StreamHandler,
        cancel: CancellationToken,
    ) -> OperationResult<String> {
        let result = match self.begin_turn(prompt) {
            Ok(_turn) => {
                let delivery = Delivery::Stream {
                    handler: &mut *handler,
                    cancel: &cancel,
                };
                self.run_turn(prompt, delivery).await.map_err(|e| self.turn_failed(e))
            }
            Err(e) => Err(e),
        };
        match &result {
            Ok(content) => handler.on_complete(content),
            Err(e) => handler.on_error(e),
        }
        result
    }

    /// Check the state, claim the turn and record the user message
    fn begin_turn(&self, prompt: &str) -> OperationResult<TurnGuard<'_>> {
        let mut session = self.session.lock();
        if session.state != BridgeState::Running {
            return Err(not_started());
        }
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(turn_in_progress());
        }
        let guard = TurnGuard {
            in_flight: &self.in_flight,
        };
        session.conversation.push(ConversationMessage::user(prompt));
        session.iteration_count = 0;
        Ok(guard)
    }

    async fn run_turn(&self, prompt: &str, mut delivery: Delivery<'_, '_>) -> OperationResult<String> {
        let hint = self.relevance_hint(prompt);
        let max_iterations = self.config.max_tool_iterations;

        loop {
            let iteration = self.session.lock().iteration_count;
            if iteration >= max_iterations {
                return Err(OperationError::validation(format!(
                    "suspected tool-call loop: no final answer after {} tool calls",
                    iteration
                ))
                .with_suggestion("Rephrase the request, or check that the tool results answer it."));
            }

            let request = self.build_request(hint.as_deref());
            self.logger.debug(&format!(
                "[Bridge] iteration {}: sending {} messages",
                iteration,
                request.messages.len()
            ));
            let response = match &mut delivery {
                Delivery::Send => self.client.send(&request).await?,
                Delivery::Stream { handler, cancel } => {
                    let mut forwarder = ContentForwarder { inner: &mut **handler };
                    self.client.stream_response(&request, &mut forwarder, *cancel).await?
                }
            };

            let Some(call) = self.detect_tool_call(&response) else {
                self.record(ConversationMessage::assistant(response.content.clone()))?;
                return Ok(response.content);
            };

            if let Delivery::Stream { handler, .. } = &mut delivery {
                handler.on_tool_call(&call);
            }
            let result = self.execute_tool(&call).await;
            self.record_tool_exchange(
                ConversationMessage::assistant_tool_call(response.content, call.clone()),
                ConversationMessage::tool_result(call, result),
            )?;
        }
    }

    /// The call to honor this iteration: the first structured call, else a
    /// call written into the text
    fn detect_tool_call(&self, response: &ModelResponse) -> Option<ToolCallRequest> {
        if let Some(first) = response.tool_calls.first() {
            if response.tool_calls.len() > 1 {
                self.logger.debug(&format!(
                    "[Bridge] model requested {} tool calls; honoring {}",
                    response.tool_calls.len(),
                    first.qualified_name()
                ));
            }
            return Some(first.clone());
        }
        parse_fallback_tool_call(&response.content, &self.registry)
    }

    /// Run a tool; failures become an error payload for the model
    async fn execute_tool(&self, call: &ToolCallRequest) -> String {
        match self.registry.execute(call).await {
            Ok(value) => value.to_string(),
            Err(e) => {
                self.logger
                    .warn(&format!("[Bridge] tool {} failed: {}", call.qualified_name(), e));
                json!({
                    "error": e.message(),
                    "kind": e.kind(),
                    "suggestion": e.recovery_suggestion(),
                })
                .to_string()
            }
        }
    }

    /// Append to the conversation unless the bridge was stopped mid-turn
    fn record(&self, message: ConversationMessage) -> OperationResult<()> {
        let mut session = self.session.lock();
        if session.state != BridgeState::Running {
            return Err(OperationError::validation("bridge stopped during the turn"));
        }
        session.conversation.push(message);
        Ok(())
    }

    /// Append a tool call and its result together, so an abandoned turn
    /// never leaves a call without a reply
    fn record_tool_exchange(&self, call: ConversationMessage, result: ConversationMessage) -> OperationResult<()> {
        let mut session = self.session.lock();
        if session.state != BridgeState::Running {
            return Err(OperationError::validation("bridge stopped during the turn"));
        }
        session.conversation.push(call);
        session.conversation.push(result);
        session.iteration_count += 1;
        Ok(())
    }

    fn build_request(&self, hint: Option<&str>) -> ChatRequest {
        let instructions = self.registry.get_tool_instructions();
        let system: Vec<&str> = [Some(self.config.system_prompt.as_str()), instructions.as_deref(), hint]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect();

        let conversation = self.conversation();
        let mut messages = Vec::with_capacity(conversation.len() + 1);
        if !system.is_empty() {
            messages.push(ConversationMessage::system(system.join("\n\n")));
        }
        messages.extend(conversation);

        ChatRequest::new(self.config.model.clone(), messages)
            .with_temperature(self.config.temperature)
            .with_max_tokens(self.config.max_tokens)
    }

    fn relevance_hint(&self, prompt: &str) -> Option<String> {
        let tools = self.registry.detect_tools_for_prompt(prompt);
        if tools.is_empty() {
            return None;
        }
        Some(format!("Tools likely relevant to this request: {}.", tools.join(", ")))
    }

    fn turn_failed(&self, error: OperationError) -> OperationError {
        self.logger.error(&format!(
            "[Bridge] turn failed: {} (suggestion: {})",
            error,
            error.recovery_suggestion()
        ));
        error
    }
}

fn not_started() -> OperationError {
    OperationError::validation("bridge not started")
        .with_suggestion("Call start() on the bridge before sending prompts.")
}

fn turn_in_progress() -> OperationError {
    OperationError::validation("a turn is already in progress")
        .with_suggestion("Wait for the current response to finish before sending another prompt.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::MAX_TOOL_ITERATIONS;
    use crate::error::{BoxError, ErrorKind};
    use crate::logging::{LogLevel, MemoryLogger, NoOpLogger};
    use crate::tools::handler_fn;
    use crate::transport::{MockReply, MockTransport, RecordingHandler, StreamEvent};
    use crate::types::{FunctionSpec, ParamType, ParameterSpec, Role};
    use serde_json::Value;
    use std::time::Duration;

    fn calc_tool() -> Tool {
        Tool::new(
            "calc",
            "Arithmetic",
            handler_fn(|function, args| async move {
                match function.as_str() {
                    "add" => Ok::<_, BoxError>(json!(args.get_f64("a").unwrap_or(0.0) + args.get_f64("b").unwrap_or(0.0))),
                    _ => Err("division by zero".into()),
                }
            }),
        )
        .with_function(
            FunctionSpec::new("add", "Add two numbers")
                .param(ParameterSpec::required("a", ParamType::Number))
                .param(ParameterSpec::required("b", ParamType::Number))
                .returns(ParamType::Number),
        )
        .with_function(FunctionSpec::new("divide", "Always fails"))
    }

    fn add_call() -> ToolCallRequest {
        ToolCallRequest::new("calc", "add", json!({"a": 2, "b": 3}))
    }

    fn bridge_with(mock: Arc<MockTransport>, logger: SharedLogger) -> Bridge {
        let registry = Arc::new(ToolRegistry::new(Arc::clone(&logger)));
        registry.register_tool(
            calc_tool(),
            Some(ToolMetadata::new().with_keywords(["add", "sum"]).with_categories(["math"])),
        );
        let config = BridgeConfig::new("test-model")
            .with_system_prompt("You are helpful.")
            .with_retry(3, 1);
        let bridge = Bridge::new(config, mock, registry, logger).unwrap();
        bridge.start().unwrap();
        bridge
    }

    fn bridge(mock: Arc<MockTransport>) -> Bridge {
        bridge_with(mock, Arc::new(NoOpLogger))
    }

    fn roles(bridge: &Bridge) -> Vec<Role> {
        bridge.conversation().iter().map(|m| m.role).collect()
    }

    #[tokio::test]
    async fn test_plain_answer_takes_one_call() {
        let mock = Arc::new(MockTransport::with_replies([MockReply::text("Hi!")]));
        let bridge = bridge(Arc::clone(&mock));

        assert_eq!(bridge.send_prompt("hello").await.unwrap(), "Hi!");
        assert_eq!(mock.call_count(), 1);
        assert_eq!(roles(&bridge), vec![Role::User, Role::Assistant]);
    }

    #[tokio::test]
    async fn test_tool_call_then_answer() {
        let mock = Arc::new(MockTransport::with_replies([
            MockReply::tool_call(add_call()),
            MockReply::text("2 + 3 = 5"),
        ]));
        let bridge = bridge(Arc::clone(&mock));

        assert_eq!(bridge.send_prompt("add 2 and 3").await.unwrap(), "2 + 3 = 5");
        assert_eq!(mock.call_count(), 2);
        assert_eq!(roles(&bridge), vec![Role::User, Role::Assistant, Role::Tool, Role::Assistant]);

        let conversation = bridge.conversation();
        assert_eq!(conversation[1].tool_call, Some(add_call()));
        assert_eq!(conversation[2].tool_call, Some(add_call()));
        assert_eq!(conversation[2].content, "5.0");
        assert_eq!(bridge.iteration_count(), 1);

        // the second request carries the tool result back to the model
        let second = &mock.requests()[1];
        assert_eq!(second.messages.last().map(|m| m.role), Some(Role::Tool));
    }

    #[tokio::test]
    async fn test_tool_result_follows_its_call() {
        let mock = Arc::new(MockTransport::with_replies([
            MockReply::tool_call(add_call()),
            MockReply::tool_call(ToolCallRequest::new("calc", "add", json!({"a": 5, "b": 1}))),
            MockReply::text("6"),
        ]));
        let bridge = bridge(mock);
        bridge.send_prompt("sum things").await.unwrap();

        let conversation = bridge.conversation();
        for (i, message) in conversation.iter().enumerate() {
            if message.role == Role::Tool {
                let previous = &conversation[i - 1];
                assert!(previous.requests_tool());
                assert_eq!(previous.tool_call, message.tool_call);
            }
        }
    }

    #[tokio::test]
    async fn test_loop_cap() {
        let mock = Arc::new(MockTransport::new().repeating(MockReply::tool_call(add_call())));
        let bridge = bridge(Arc::clone(&mock));

        let err = bridge.send_prompt("add forever").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.message().contains("loop"));
        assert_eq!(mock.call_count(), MAX_TOOL_ITERATIONS as usize);
        assert_eq!(bridge.iteration_count(), MAX_TOOL_ITERATIONS);

        // the next turn starts from zero
        mock.push(MockReply::text("ok"));
        assert_eq!(bridge.send_prompt("stop adding").await.unwrap(), "ok");
        assert_eq!(bridge.iteration_count(), 0);
    }

    #[tokio::test]
    async fn test_tool_failure_is_fed_back() {
        let mock = Arc::new(MockTransport::with_replies([
            MockReply::tool_call(ToolCallRequest::new("calc", "divide", json!({}))),
            MockReply::tool_call(ToolCallRequest::new("calc", "add", json!({"a": "two"}))),
            MockReply::tool_call(ToolCallRequest::new("nope", "run", json!({}))),
            MockReply::text("I could not compute that."),
        ]));
        let bridge = bridge(mock);

        assert_eq!(bridge.send_prompt("divide").await.unwrap(), "I could not compute that.");
        let payloads: Vec<Value> = bridge
            .conversation()
            .iter()
            .filter(|m| m.role == Role::Tool)
            .map(|m| serde_json::from_str(&m.content).unwrap())
            .collect();
        assert_eq!(payloads.len(), 3);
        assert_eq!(payloads[0]["kind"], "unknown");
        assert!(payloads[0]["error"].as_str().unwrap().contains("division by zero"));
        assert_eq!(payloads[1]["kind"], "validation");
        assert_eq!(payloads[2]["kind"], "not_found");
        assert!(payloads[2]["suggestion"].as_str().unwrap().contains("tool name"));
    }

    #[tokio::test]
    async fn test_fallback_text_call() {
        let text = "Calling the tool.\n```json\n{\"tool\": \"calc\", \"function\": \"add\", \"parameters\": {\"a\": 1, \"b\": 1}}\n```";
        let mock = Arc::new(MockTransport::with_replies([MockReply::text(text), MockReply::text("2")]));
        let bridge = bridge(Arc::clone(&mock));

        assert_eq!(bridge.send_prompt("1+1?").await.unwrap(), "2");
        assert_eq!(mock.call_count(), 2);
        let conversation = bridge.conversation();
        assert_eq!(conversation[1].content, text);
        assert_eq!(conversation[2].content, "2.0");
    }

    #[tokio::test]
    async fn test_structured_call_wins_over_text() {
        let text = "```json\n{\"tool\": \"calc\", \"function\": \"divide\", \"parameters\": {}}\n```";
        let mock = Arc::new(MockTransport::with_replies([
            MockReply::ToolCall {
                content: text.to_string(),
                call: add_call(),
            },
            MockReply::text("5"),
        ]));
        let bridge = bridge(mock);
        bridge.send_prompt("add").await.unwrap();
        assert_eq!(bridge.conversation()[1].tool_call, Some(add_call()));
    }

    #[tokio::test]
    async fn test_requires_running_state() {
        let mock = Arc::new(MockTransport::new().repeating(MockReply::text("x")));
        let registry = Arc::new(ToolRegistry::default());
        let bridge = Bridge::new(BridgeConfig::default(), mock, registry, Arc::new(NoOpLogger)).unwrap();

        let err = bridge.send_prompt("hi").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.message(), "bridge not started");

        bridge.start().unwrap();
        bridge.send_prompt("hi").await.unwrap();
        bridge.stop();
        assert_eq!(bridge.state(), BridgeState::Stopped);
        assert!(bridge.conversation().is_empty());
        assert!(bridge.send_prompt("hi").await.is_err());
        assert!(bridge.start().is_err());
    }

    #[tokio::test]
    async fn test_system_message_is_rebuilt_not_stored() {
        let mock = Arc::new(MockTransport::with_replies([MockReply::text("5")]));
        let bridge = bridge(Arc::clone(&mock));
        bridge.send_prompt("please add these").await.unwrap();

        let system = &mock.requests()[0].messages[0];
        assert_eq!(system.role, Role::System);
        assert!(system.content.starts_with("You are helpful."));
        assert!(system.content.contains("### Tool: calc"));
        assert!(system.content.contains("Tools likely relevant to this request: calc."));
        assert!(bridge.conversation().iter().all(|m| m.role != Role::System));
        assert_eq!(mock.requests()[0].model, "test-model");
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let config = BridgeConfig::new("m").with_max_tool_iterations(0);
        let result = Bridge::new(
            config,
            Arc::new(MockTransport::new()),
            Arc::new(ToolRegistry::default()),
            Arc::new(NoOpLogger),
        );
        assert_eq!(result.err().map(|e| e.kind()), Some(ErrorKind::Validation));
    }

    #[tokio::test]
    async fn test_streaming_plain_answer() {
        let mock = Arc::new(MockTransport::with_replies([MockReply::chunks(["Hello", " world", "!"])]));
        let bridge = bridge(mock);
        let mut handler = RecordingHandler::new();

        let answer = bridge
            .stream_message("greet me", &mut handler, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(answer, "Hello world!");
        assert_eq!(handler.contents(), vec!["Hello", " world", "!"]);
        assert_eq!(handler.completions(), 1);
        assert!(handler.errors().is_empty());
        assert_eq!(handler.events.len(), 4);
    }

    #[tokio::test]
    async fn test_streaming_reports_tool_call_before_running_it() {
        let mock = Arc::new(MockTransport::with_replies([
            MockReply::tool_call(add_call()),
            MockReply::chunks(["5"]),
        ]));
        let bridge = bridge(mock);
        let mut handler = RecordingHandler::new();

        bridge
            .stream_message("add", &mut handler, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            handler.events,
            vec![
                StreamEvent::ToolCall(add_call()),
                StreamEvent::Content("5".into()),
                StreamEvent::Complete("5".into()),
            ]
        );
        assert_eq!(roles(&bridge), vec![Role::User, Role::Assistant, Role::Tool, Role::Assistant]);
    }

    #[tokio::test]
    async fn test_streaming_error_is_terminal() {
        let mock = Arc::new(MockTransport::with_replies([MockReply::error(ErrorKind::Permission, "denied")]));
        let logger = Arc::new(MemoryLogger::new());
        let bridge = bridge_with(mock, logger.clone());
        let mut handler = RecordingHandler::new();

        let err = bridge
            .stream_message("hi", &mut handler, CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Permission);
        assert_eq!(handler.errors(), vec![ErrorKind::Permission]);
        assert_eq!(handler.completions(), 0);
        assert!(matches!(handler.events.last(), Some(StreamEvent::Error(..))));
        assert!(logger.contains(LogLevel::Error, "turn failed"));
    }

    #[tokio::test]
    async fn test_streaming_not_started_reports_error() {
        let bridge = Bridge::new(
            BridgeConfig::default(),
            Arc::new(MockTransport::new()),
            Arc::new(ToolRegistry::default()),
            Arc::new(NoOpLogger),
        )
        .unwrap();
        let mut handler = RecordingHandler::new();
        assert!(bridge
            .stream_message("hi", &mut handler, CancellationToken::new())
            .await
            .is_err());
        assert_eq!(handler.errors(), vec![ErrorKind::Validation]);
    }

    #[tokio::test]
    async fn test_streaming_cancellation() {
        let mock = Arc::new(
            MockTransport::with_replies([MockReply::chunks(["a", "b", "c", "d", "e"])])
                .with_chunk_delay(Duration::from_millis(40)),
        );
        let bridge = bridge(Arc::clone(&mock));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(60)).await;
            trigger.cancel();
        });

        let mut handler = RecordingHandler::new();
        let err = bridge.stream_message("letters", &mut handler, cancel).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert_eq!(handler.errors(), vec![ErrorKind::Cancelled]);
        assert_eq!(handler.completions(), 0);
        assert!(handler.contents().len() < 5);
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_overlapping_turns_are_rejected() {
        let mock = Arc::new(
            MockTransport::with_replies([MockReply::chunks(["slow", " answer"])])
                .with_chunk_delay(Duration::from_millis(50)),
        );
        let bridge = bridge(mock);
        let mut handler = RecordingHandler::new();

        let (first, second, cleared) = tokio::join!(
            bridge.stream_message("first", &mut handler, CancellationToken::new()),
            async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                bridge.send_prompt("second").await
            },
            async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                bridge.clear_conversation()
            }
        );

        assert_eq!(first.unwrap(), "slow answer");
        let err = second.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.message(), "a turn is already in progress");
        assert!(cleared.is_err());
        assert_eq!(roles(&bridge), vec![Role::User, Role::Assistant]);

        bridge.clear_conversation().unwrap();
        assert!(bridge.conversation().is_empty());
    }

    #[tokio::test]
    async fn test_abandoned_turn_leaves_no_unanswered_call() {
        let mock = Arc::new(MockTransport::with_replies([
            MockReply::tool_call(ToolCallRequest::new("slow", "wait", json!({}))),
            MockReply::text("ok"),
        ]));
        let bridge = bridge(Arc::clone(&mock));
        bridge.register_tool(
            Tool::new(
                "slow",
                "Takes a while",
                handler_fn(|_, _| async {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    Ok::<_, BoxError>(json!("done"))
                }),
            )
            .with_function(FunctionSpec::new("wait", "Wait")),
            None,
        );

        let abandoned = tokio::time::timeout(Duration::from_millis(50), bridge.send_prompt("wait please")).await;
        assert!(abandoned.is_err());
        assert_eq!(roles(&bridge), vec![Role::User]);

        assert_eq!(bridge.send_prompt("never mind").await.unwrap(), "ok");
        let last = mock.requests().pop().unwrap();
        assert!(last.messages.iter().all(|m| m.tool_call.is_none()));
        assert_eq!(
            last.messages.iter().map(|m| m.role).collect::<Vec<_>>(),
            vec![Role::System, Role::User, Role::User]
        );
    }

    #[tokio::test]
    async fn test_lifecycle_and_tool_failures_are_logged() {
        let mock = Arc::new(MockTransport::with_replies([
            MockReply::tool_call(ToolCallRequest::new("calc", "divide", json!({}))),
            MockReply::text("cannot divide"),
        ]));
        let logger = Arc::new(MemoryLogger::new());
        let bridge = bridge_with(mock, logger.clone());

        bridge.send_prompt("divide").await.unwrap();
        bridge.stop();

        assert!(logger.contains(LogLevel::Info, "[Bridge] started (model=test-model)"));
        assert!(logger.contains(LogLevel::Warn, "[Bridge] tool calc.divide failed"));
        assert!(logger.contains(LogLevel::Info, "[Bridge] stopped after 4 messages"));
    }

    #[test]
    fn test_clear_conversation_requires_running() {
        let registry = Arc::new(ToolRegistry::default());
        let bridge = Bridge::new(
            BridgeConfig::default(),
            Arc::new(MockTransport::new()),
            registry,
            Arc::new(NoOpLogger),
        )
        .unwrap();
        assert_eq!(bridge.clear_conversation().unwrap_err().message(), "bridge not started");

        bridge.start().unwrap();
        bridge.clear_conversation().unwrap();

        bridge.stop();
        let err = bridge.clear_conversation().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.message(), "bridge not started");
    }
}
