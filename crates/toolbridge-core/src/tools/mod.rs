//! Tool management module
//!
//! Tools are registered by the host, described to the model through the
//! system prompt, and executed when the model asks for them.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  ToolRegistry                               │
//! │                                             │
//! │  - Stores tools + relevance metadata        │
//! │  - Scores tools against a prompt            │
//! │  - Renders calling instructions             │
//! │  - Validates arguments, runs handlers       │
//! └─────────────────────────────────────────────┘
//!           ▲                       │
//!           │ ToolCallRequest       │ ToolHandler::execute
//!           │                       ▼
//! ┌──────────────────┐    ┌─────────────────────┐
//! │  Bridge          │    │  Host tool code     │
//! └──────────────────┘    └─────────────────────┘
//! ```

mod handler;
mod instructions;
mod registry;
mod schema;

pub use handler::{handler_fn, FnToolHandler, ToolHandler};
pub use instructions::format_invocation;
pub use registry::{Tool, ToolRegistry};
pub use schema::{example_value, ParamValue, ToolArguments};
