//! Tool execution contract

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;

use crate::error::BoxError;
use super::schema::ToolArguments;

/// Executes the functions of one tool.
///
/// Arguments are already validated against the function's declared
/// parameters. Any error is reported back to the model as a tool result;
/// it never aborts the conversation.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn execute(&self, function: &str, arguments: ToolArguments) -> Result<Value, BoxError>;
}

/// Handler backed by a closure
pub struct FnToolHandler<F> {
    f: F,
}

#[async_trait]
impl<F> ToolHandler for FnToolHandler<F>
where
    F: Fn(String, ToolArguments) -> BoxFuture<'static, Result<Value, BoxError>> + Send + Sync,
{
    async fn execute(&self, function: &str, arguments: ToolArguments) -> Result<Value, BoxError> {
        (self.f)(function.to_string(), arguments).await
    }
}

/// Wrap an async closure as a shared handler
///
/// ```rust,ignore
/// let handler = handler_fn(|function, args| async move {
///     match function.as_str() {
///         "add" => Ok::<_, BoxError>(json!(args.get_f64("a").unwrap_or(0.0) + args.get_f64("b").unwrap_or(0.0))),
///         other => Err(format!("unsupported function {}", other).into()),
///     }
/// });
/// ```
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn ToolHandler>
where
    F: Fn(String, ToolArguments) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, BoxError>> + Send + 'static,
{
    Arc::new(FnToolHandler {
        f: move |function: String, arguments: ToolArguments| -> BoxFuture<'static, Result<Value, BoxError>> {
            Box::pin(f(function, arguments))
        },
    })
}
