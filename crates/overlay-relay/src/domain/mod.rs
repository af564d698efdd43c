//! Domain layer for overlay-relay.
//!
//! The domain layer contains plain configuration types with no dependencies on
//! sockets, async runtimes or threads.  The event model itself lives in
//! `overlay-core`; this layer only describes how the relay process is set up.
//!
//! # What does NOT belong here?
//!
//! - Any `tokio`, `TcpStream`, or `WebSocket` types
//! - Environment variable reading (that is done by `clap` in `main.rs`)

pub mod config;

pub use config::{ConfigError, RelayConfig, RelayFileConfig, SourceKind};
