//! Application layer for overlay-relay.
//!
//! The application layer orchestrates the relay: it knows *what* happens to
//! an event or a control message, but never touches a socket.
//!
//! # Responsibilities
//!
//! - Tracking live sessions and their subscriptions (`registry`, `session`)
//! - Fanning events out to matching sessions (`broadcaster`)
//! - Deciding what a `listen` / `ping` message or a heartbeat tick does
//!   (`control`)
//! - Remembering attached devices for late `Devices` subscribers (`devices`)
//! - The bounded producer queue (`sink`) and heartbeat nonces (`nonce`)
//!
//! # What does NOT belong here?
//!
//! - Opening sockets or listening for connections (that is infrastructure)
//! - WebSocket framing (handled by tokio-tungstenite)

pub mod broadcaster;
pub mod control;
pub mod devices;
pub mod nonce;
pub mod registry;
pub mod session;
pub mod sink;
pub mod state;

pub use broadcaster::{BroadcastError, Broadcaster, DeliveryReport};
pub use control::{apply_client_message, next_heartbeat};
pub use devices::DeviceTable;
pub use nonce::NonceSource;
pub use registry::{Registry, RegistryClosed};
pub use session::{DeliveryError, HeartbeatError, Session, SessionError, SessionState};
pub use sink::{event_channel, EventSink, SubmitError};
pub use state::RelayState;
