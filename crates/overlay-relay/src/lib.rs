//! overlay-relay library crate.
//!
//! Relays keyboard, mouse and device events from a single input source to
//! any number of WebSocket subscribers (typically on-screen input overlays),
//! each receiving only the event categories it asked for.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! InputSource (stdin JSON lines, mock, ...)
//!         │  EventSink (bounded, drop-newest)
//!         ▼
//! [overlay-relay]
//!   ├── domain/           RelayConfig, file config, source selection
//!   ├── application/      Registry, Session, Broadcaster, heartbeat logic
//!   └── infrastructure/
//!         ├── ws_server/     accept loop, /ws upgrade, per-session loops
//!         └── input_source/  InputSource trait and implementations
//!         │
//!         ▼
//! Subscribers (JSON over WebSocket)
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O and no async.
//! - `application` depends on `domain` and `overlay-core`; it queues frames
//!   but never touches a socket.
//! - `infrastructure` depends on all other layers plus `tokio` and
//!   `tokio-tungstenite`.

/// Domain layer: configuration types (no I/O).
pub mod domain;

/// Application layer: subscription registry, sessions, broadcaster.
pub mod application;

/// Infrastructure layer: WebSocket server and input sources.
pub mod infrastructure;
