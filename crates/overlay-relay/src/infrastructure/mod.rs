//! Infrastructure layer for overlay-relay.
//!
//! The infrastructure layer handles all I/O: accepting WebSocket connections
//! from subscribers and reading events from an input source.
//!
//! # Responsibilities
//!
//! - Binding a TCP listener and performing the WebSocket upgrade on `/ws`
//! - Running each session's receive and heartbeat loops
//! - Feeding events from an [`InputSource`](input_source::InputSource) into
//!   the broadcaster's queue
//! - Handling the graceful shutdown signal
//!
//! # What does NOT belong here?
//!
//! - Fan-out, subscription and heartbeat decisions (that is the application
//!   layer)
//! - Wire message shapes (that is `overlay-core`)

pub mod input_source;
pub mod ws_server;

// Re-export the primary entry points so `main.rs` can call them concisely.
pub use input_source::{build_source, CaptureError, InputSource};
pub use ws_server::{run_server, serve};
