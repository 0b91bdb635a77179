//! Logging abstractions for runtime-agnostic logging
//!
//! Components never log through a global; each one holds a [`SharedLogger`]
//! handed in by the host. The host decides where lines end up (console, an
//! editor output channel, a test capture).

mod traits;
mod noop;
mod console;
mod memory;

pub use traits::{Logger, LogLevel, SharedLogger};
pub use noop::NoOpLogger;
pub use console::ConsoleLogger;
pub use memory::MemoryLogger;
