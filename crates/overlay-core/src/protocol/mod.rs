//! Protocol module containing the wire message types and the JSON codec.

pub mod codec;
pub mod messages;

pub use codec::{
    button_message, decode_client_message, device_message, encode_button_event,
    encode_device_event, encode_ping, encode_server_message, ProtocolError,
};
pub use messages::{ClientMessage, ServerMessage};
