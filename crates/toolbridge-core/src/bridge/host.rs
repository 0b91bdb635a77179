//! The entry points a hosting UI calls

use async_trait::async_trait;

use crate::error::OperationResult;
use crate::tools::Tool;
use crate::transport::StreamHandler;
use crate::types::{CancellationToken, ToolMetadata};
use super::session::Bridge;

/// Narrow host-facing surface of a bridge.
///
/// Editor panels, webviews and CLIs program against this trait only.
#[async_trait]
pub trait HostBridge: Send + Sync {
    fn start(&self) -> OperationResult<()>;

    fn stop(&self);

    fn register_tool(&self, tool: Tool, metadata: Option<ToolMetadata>);

    async fn send_prompt(&self, prompt: &str) -> OperationResult<String>;

    async fn stream_message(
        &self,
        prompt: &str,
        handler: &mut dyn StreamHandler,
        cancel: CancellationToken,
    ) -> OperationResult<String>;
}

#[async_trait]
impl HostBridge for Bridge {
    fn start(&self) -> OperationResult<()> {
        Bridge::start(self)
    }

    fn stop(&self) {
        Bridge::stop(self)
    }

    fn register_tool(&self, tool: Tool, metadata: Option<ToolMetadata>) {
        Bridge::register_tool(self, tool, metadata)
    }

    async fn send_prompt(&self, prompt: &str) -> OperationResult<String> {
        Bridge::send_prompt(self, prompt).await
    }

    async fn stream_message(
        &self,
        prompt: &str,
        handler: &mut dyn StreamHandler,
        cancel: CancellationToken,
    ) -> OperationResult<String> {
        Bridge::stream_message(self, prompt, handler, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BridgeConfig;
    use crate::error::BoxError;
    use crate::logging::NoOpLogger;
    use crate::tools::{handler_fn, ToolRegistry};
    use crate::transport::{MockReply, MockTransport, RecordingHandler};
    use crate::types::{FunctionSpec, ParamType, ParameterSpec, ToolCallRequest};
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_host_drives_bridge_through_trait() {
        let mock = Arc::new(MockTransport::with_replies([
            MockReply::tool_call(ToolCallRequest::new("echo", "say", json!({"text": "hi"}))),
            MockReply::chunks(["said ", "hi"]),
        ]));
        let bridge = Bridge::new(
            BridgeConfig::default(),
            mock,
            Arc::new(ToolRegistry::default()),
            Arc::new(NoOpLogger),
        )
        .unwrap();
        let host: Arc<dyn HostBridge> = Arc::new(bridge);

        host.register_tool(
            Tool::new(
                "echo",
                "Echo text",
                handler_fn(|_, args| async move { Ok::<_, BoxError>(json!(args.get_str("text").unwrap_or_default())) }),
            )
            .with_function(FunctionSpec::new("say", "Say it").param(ParameterSpec::required("text", ParamType::String))),
            Some(ToolMetadata::new().with_keywords(["echo"])),
        );
        host.start().unwrap();

        let mut handler = RecordingHandler::new();
        let answer = host
            .stream_message("echo hi", &mut handler, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(answer, "said hi");
        assert_eq!(handler.tool_calls().len(), 1);
        assert_eq!(handler.completions(), 1);

        host.stop();
        assert!(host.send_prompt("again").await.is_err());
    }
}
