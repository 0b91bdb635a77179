//! Model endpoint transport
//!
//! This module contains the transport abstraction and its implementations.
//!
//! ## Architecture
//!
//! - [`Transport`] performs one attempt against an endpoint, either a full
//!   round trip or an opened chunk stream.
//! - [`HttpTransport`] speaks newline-delimited JSON over HTTP (reqwest).
//! - [`TransportClient`] wraps any transport with the shared
//!   [`RetryExecutor`](crate::retry::RetryExecutor), assembles streamed
//!   tool-call fragments and drives [`StreamHandler`] callbacks.
//!
//! The `MockTransport` is kept for testing purposes.

mod traits;
mod wire;
mod accumulator;
mod http;
mod handler;
mod client;
mod mock;

pub use traits::{ChatRequest, ChunkStream, Transport};
pub use wire::{decode_response, encode_request, FrameDecoder};
pub use accumulator::ToolCallAccumulator;
pub use http::HttpTransport;
pub use handler::{RecordingHandler, StreamEvent, StreamHandler};
pub use client::TransportClient;
pub use mock::{MockReply, MockTransport};
