//! Session control logic that does not touch the socket.
//!
//! The WebSocket loops in `infrastructure::ws_server` only move frames; the
//! decisions about what a decoded control message or a heartbeat tick does to
//! a session are made here so they can be unit-tested without a network.

use overlay_core::protocol::codec::{encode_device_event, encode_ping};
use overlay_core::{ClientMessage, DeviceEvent, EventCategory};
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

use crate::application::devices::DeviceTable;
use crate::application::nonce::NonceSource;
use crate::application::session::{DeliveryError, Session, SessionError};

/// Applies one decoded inbound message to `session`.
///
/// - `Listen` grows the mask.  The first time `Devices` enters the mask, the
///   session is sent one `Devices` message per currently attached device.
/// - `Ping` must echo the outstanding nonce exactly.
///
/// # Errors
///
/// Returns a [`SessionError`] for a nonce mismatch, or if the session closed
/// while its device snapshot was being queued.
pub fn apply_client_message(
    session: &Session,
    msg: ClientMessage,
    devices: &DeviceTable,
) -> Result<(), SessionError> {
    match msg {
        ClientMessage::Listen(category) => {
            let previous = session.subscribe(category);
            debug!(
                "subscriber {}: listen {category:?}; mask now {:?}",
                session.id(),
                session.mask()
            );
            if category.contains(EventCategory::DEVICES)
                && !previous.contains(EventCategory::DEVICES)
            {
                send_device_snapshot(session, devices)?;
            }
            Ok(())
        }
        ClientMessage::Ping(nonce) => {
            session.acknowledge_ping(nonce)?;
            debug!("subscriber {}: heartbeat {nonce} acknowledged", session.id());
            Ok(())
        }
    }
}

/// Queues an `attached: true` message for every device in `devices`.
///
/// Runs with the device table locked, so a live device event is queued
/// either wholly before or wholly after the snapshot.  A device that
/// attaches right after the subscription can be reported twice; a detach
/// always lands last.
fn send_device_snapshot(session: &Session, devices: &DeviceTable) -> Result<(), SessionError> {
    devices.with_attached(|attached| -> Result<(), SessionError> {
        debug!(
            "subscriber {}: sending {} attached device(s)",
            session.id(),
            attached.len()
        );
        for device in attached {
            let text = encode_device_event(&DeviceEvent {
                device: device.clone(),
                attached: true,
            })?;
            match session.try_deliver(Message::text(text)) {
                Ok(()) => {}
                Err(DeliveryError::QueueFull) => {
                    debug!("subscriber {}: queue full during device snapshot", session.id());
                }
                Err(e @ DeliveryError::Closed) => return Err(e.into()),
            }
        }
        Ok(())
    })
}

/// Runs one heartbeat tick: issues a fresh nonce and returns the encoded
/// `Ping` frame to send.
///
/// # Errors
///
/// Returns [`SessionError::Heartbeat`] if the previous nonce is still
/// unanswered; the caller must close the session.
pub fn next_heartbeat(session: &Session, nonces: &NonceSource) -> Result<Message, SessionError> {
    let nonce = nonces.next_nonce();
    session.issue_ping(nonce)?;
    let text = encode_ping(nonce)?;
    Ok(Message::text(text))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
