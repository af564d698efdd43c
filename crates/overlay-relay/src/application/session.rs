//! Per-subscriber session state.
//!
//! A [`Session`] is shared (behind an `Arc`) by three parties:
//!
//! - the **receive loop**, which grows the category mask and acknowledges
//!   heartbeat nonces,
//! - the **heartbeat loop**, which issues nonces and is the only task that
//!   writes to the socket,
//! - the **broadcaster**, which enqueues already-encoded frames.
//!
//! None of them take a lock on the session.  Every mutable field is an atomic
//! with a single, documented access pattern:
//!
//! | Field              | Written by                         | Read by              |
//! |--------------------|------------------------------------|----------------------|
//! | `mask`             | receive loop (`fetch_or`)          | registry, broadcaster|
//! | `outstanding_ping` | heartbeat loop sets, receive loop clears (CAS) | both     |
//! | `state`            | first remover (CAS `Open → Closing`) | everyone           |
//!
//! # Lifecycle
//!
//! ```text
//! Open ──(violation / transport error / silence / shutdown)──▶ Closing ──▶ Removed
//! ```
//!
//! Only the caller that wins the `Open → Closing` compare-and-set performs the
//! removal, so concurrent close attempts from both loops and the broadcaster
//! collapse into one.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicI64, AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;

use overlay_core::{EventCategory, ProtocolError};
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Sentinel stored in `outstanding_ping` while no nonce is awaiting an echo.
/// Nonces are always non-negative, so it can never collide with a real one.
const NO_PING: i64 = -1;

// ── Errors ────────────────────────────────────────────────────────────────────

/// Heartbeat protocol failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeartbeatError {
    /// The previous nonce was still unanswered when the next tick fired.
    #[error("heartbeat nonce {nonce} was not acknowledged")]
    Unacknowledged { nonce: i64 },

    /// The peer echoed a value other than the outstanding nonce, or echoed
    /// while nothing was outstanding.
    #[error("ping echo {received} does not match outstanding nonce {expected:?}")]
    Mismatch { expected: Option<i64>, received: i64 },
}

/// Why a frame could not be handed to a session's outbound queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// The subscriber is not draining fast enough; this sample is dropped
    /// for it alone.
    #[error("outbound queue is full")]
    QueueFull,

    /// The session is closing or its writer has exited.
    #[error("session is closed")]
    Closed,
}

/// The reason a session's loop ended.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("heartbeat failure: {0}")]
    Heartbeat(#[from] HeartbeatError),

    #[error("delivery failure: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("unexpected {0} frame")]
    UnexpectedFrame(&'static str),

    #[error("transport error: {0}")]
    Transport(#[from] WsError),

    #[error("peer closed the connection")]
    PeerClosed,
}

impl SessionError {
    /// `true` when the peer broke the protocol (as opposed to going away).
    /// An inbound message over the size limit counts as a violation.
    pub fn is_violation(&self) -> bool {
        matches!(
            self,
            SessionError::Protocol(_)
                | SessionError::Heartbeat(HeartbeatError::Mismatch { .. })
                | SessionError::UnexpectedFrame(_)
                | SessionError::Transport(WsError::Capacity(_))
        )
    }
}

// ── Session state ─────────────────────────────────────────────────────────────

/// Coarse session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    Open = 0,
    Closing = 1,
    Removed = 2,
}

impl SessionState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => SessionState::Open,
            1 => SessionState::Closing,
            _ => SessionState::Removed,
        }
    }
}

/// One connected subscriber.
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    peer: SocketAddr,
    mask: AtomicU32,
    outstanding_ping: AtomicI64,
    state: AtomicU8,
    cancel: CancellationToken,
    outbound: mpsc::Sender<Message>,
}

impl Session {
    /// Creates an open session with an empty mask and returns it together
    /// with the receiving end of its outbound queue.
    ///
    /// `capacity` must be non-zero (enforced by [`RelayConfig::validate`]).
    ///
    /// [`RelayConfig::validate`]: crate::domain::RelayConfig::validate
    pub fn new(peer: SocketAddr, capacity: usize) -> (Arc<Self>, mpsc::Receiver<Message>) {
        let (outbound, rx) = mpsc::channel(capacity);
        let session = Arc::new(Self {
            id: Uuid::new_v4(),
            peer,
            mask: AtomicU32::new(EventCategory::NONE.bits()),
            outstanding_ping: AtomicI64::new(NO_PING),
            state: AtomicU8::new(SessionState::Open as u8),
            cancel: CancellationToken::new(),
            outbound,
        });
        (session, rx)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    // ── Subscription mask ─────────────────────────────────────────────────────

    /// The current subscription mask.
    pub fn mask(&self) -> EventCategory {
        EventCategory::from_bits_truncate(self.mask.load(Ordering::Acquire))
    }

    /// Unions `category` into the mask and returns the mask as it was before.
    ///
    /// The mask only ever grows; there is no way to clear a bit.
    pub fn subscribe(&self, category: EventCategory) -> EventCategory {
        let previous = self.mask.fetch_or(category.bits(), Ordering::AcqRel);
        EventCategory::from_bits_truncate(previous)
    }

    /// `true` if every bit of `category` is in the mask.
    pub fn is_subscribed(&self, category: EventCategory) -> bool {
        self.mask().contains(category)
    }

    // ── Heartbeat ─────────────────────────────────────────────────────────────

    /// Records `nonce` as the outstanding heartbeat.
    ///
    /// # Errors
    ///
    /// Returns [`HeartbeatError::Unacknowledged`] if the previous nonce was
    /// never echoed; the peer is presumed dead.
    pub fn issue_ping(&self, nonce: i64) -> Result<(), HeartbeatError> {
        debug_assert!(nonce >= 0, "nonces are non-negative");
        self.outstanding_ping
            .compare_exchange(NO_PING, nonce, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|pending| HeartbeatError::Unacknowledged { nonce: pending })
    }

    /// Clears the outstanding nonce if `echoed` matches it exactly.
    ///
    /// # Errors
    ///
    /// Returns [`HeartbeatError::Mismatch`] for any other value, including an
    /// echo that arrives while no nonce is outstanding.
    pub fn acknowledge_ping(&self, echoed: i64) -> Result<(), HeartbeatError> {
        if echoed != NO_PING
            && self
                .outstanding_ping
                .compare_exchange(echoed, NO_PING, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        {
            return Ok(());
        }
        Err(HeartbeatError::Mismatch {
            expected: self.outstanding_ping(),
            received: echoed,
        })
    }

    /// The nonce awaiting an echo, if any.
    pub fn outstanding_ping(&self) -> Option<i64> {
        match self.outstanding_ping.load(Ordering::Acquire) {
            NO_PING => None,
            nonce => Some(nonce),
        }
    }

    // ── Delivery ──────────────────────────────────────────────────────────────

    /// Hands an encoded frame to the session's writer without waiting.
    ///
    /// # Errors
    ///
    /// [`DeliveryError::QueueFull`] if the subscriber is lagging and
    /// [`DeliveryError::Closed`] once the session has left the `Open` state.
    pub fn try_deliver(&self, frame: Message) -> Result<(), DeliveryError> {
        if !self.is_open() {
            return Err(DeliveryError::Closed);
        }
        self.outbound.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => DeliveryError::QueueFull,
            TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────────

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_open(&self) -> bool {
        self.state() == SessionState::Open
    }

    /// Attempts the `Open → Closing` transition.  Returns `true` only for the
    /// single caller that performed it.
    pub(crate) fn begin_close(&self) -> bool {
        self.state
            .compare_exchange(
                SessionState::Open as u8,
                SessionState::Closing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub(crate) fn mark_removed(&self) {
        self.state
            .store(SessionState::Removed as u8, Ordering::Release);
    }

    /// Signals both loops to stop at their next suspension point.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// The token both loops select on.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn new_session(capacity: usize) -> (Arc<Session>, mpsc::Receiver<Message>) {
        Session::new("127.0.0.1:40000".parse().unwrap(), capacity)
    }

    #[test]
    fn test_new_session_is_open_with_empty_mask() {
        let (session, _rx) = new_session(4);
        assert_eq!(session.state(), SessionState::Open);
        assert!(session.mask().is_empty());
        assert_eq!(session.outstanding_ping(), None);
    }

    #[test]
    fn test_subscribe_returns_previous_mask_and_only_grows() {
        // Arrange
        let (session, _rx) = new_session(4);

        // Act
        let before_first = session.subscribe(EventCategory::KEYBOARD);
        let before_second = session.subscribe(EventCategory::DEVICES);
        let before_repeat = session.subscribe(EventCategory::KEYBOARD);

        // Assert
        assert!(before_first.is_empty());
        assert_eq!(before_second, EventCategory::KEYBOARD);
        assert_eq!(
            before_repeat,
            EventCategory::KEYBOARD | EventCategory::DEVICES
        );
        assert!(session.is_subscribed(EventCategory::KEYBOARD));
        assert!(session.is_subscribed(EventCategory::DEVICES));
        assert!(!session.is_subscribed(EventCategory::MOUSE_BUTTONS));
    }

    #[test]
    fn test_matching_echo_clears_outstanding_nonce() {
        let (session, _rx) = new_session(4);
        session.issue_ping(12345).unwrap();

        assert_eq!(session.acknowledge_ping(12345), Ok(()));
        assert_eq!(session.outstanding_ping(), None);
    }

    #[test]
    fn test_wrong_echo_is_a_mismatch() {
        let (session, _rx) = new_session(4);
        session.issue_ping(12345).unwrap();

        let err = session.acknowledge_ping(999).unwrap_err();

        assert_eq!(
            err,
            HeartbeatError::Mismatch {
                expected: Some(12345),
                received: 999
            }
        );
        assert_eq!(session.outstanding_ping(), Some(12345));
    }

    #[test]
    fn test_echo_without_outstanding_nonce_is_a_mismatch() {
        let (session, _rx) = new_session(4);
        assert_err!(session.acknowledge_ping(7));
        // The sentinel itself must never be accepted as an echo.
        assert_err!(session.acknowledge_ping(-1));
    }

    #[test]
    fn test_second_echo_of_same_nonce_is_rejected() {
        let (session, _rx) = new_session(4);
        assert_ok!(session.issue_ping(5));
        assert_ok!(session.acknowledge_ping(5));
        assert_err!(session.acknowledge_ping(5));
    }

    #[test]
    fn test_issue_while_outstanding_reports_unacknowledged() {
        let (session, _rx) = new_session(4);
        session.issue_ping(1).unwrap();

        assert_eq!(
            session.issue_ping(2),
            Err(HeartbeatError::Unacknowledged { nonce: 1 })
        );
    }

    #[test]
    fn test_begin_close_succeeds_exactly_once() {
        let (session, _rx) = new_session(4);

        assert!(session.begin_close());
        assert!(!session.begin_close());
        assert_eq!(session.state(), SessionState::Closing);

        session.mark_removed();
        assert!(!session.begin_close());
        assert_eq!(session.state(), SessionState::Removed);
    }

    #[test]
    fn test_try_deliver_reports_full_queue() {
        // Arrange: capacity 1, nobody draining
        let (session, _rx) = new_session(1);

        // Act
        let first = session.try_deliver(Message::text("a".to_string()));
        let second = session.try_deliver(Message::text("b".to_string()));

        // Assert
        assert_eq!(first, Ok(()));
        assert_eq!(second, Err(DeliveryError::QueueFull));
    }

    #[test]
    fn test_try_deliver_after_writer_exit_reports_closed() {
        let (session, rx) = new_session(4);
        drop(rx);
        assert_eq!(
            session.try_deliver(Message::text("a".to_string())),
            Err(DeliveryError::Closed)
        );
    }

    #[test]
    fn test_try_deliver_to_closing_session_reports_closed() {
        let (session, _rx) = new_session(4);
        session.begin_close();
        assert_eq!(
            session.try_deliver(Message::text("a".to_string())),
            Err(DeliveryError::Closed)
        );
    }

    #[tokio::test]
    async fn test_delivered_frames_arrive_in_order() {
        let (session, mut rx) = new_session(4);
        session.try_deliver(Message::text("1".to_string())).unwrap();
        session.try_deliver(Message::text("2".to_string())).unwrap();

        assert_eq!(rx.recv().await.unwrap().to_text().unwrap(), "1");
        assert_eq!(rx.recv().await.unwrap().to_text().unwrap(), "2");
    }

    #[test]
    fn test_violation_classification() {
        assert!(SessionError::UnexpectedFrame("binary").is_violation());
        assert!(SessionError::Protocol(ProtocolError::Empty).is_violation());
        assert!(SessionError::Heartbeat(HeartbeatError::Mismatch {
            expected: None,
            received: 3
        })
        .is_violation());
        assert!(!SessionError::Heartbeat(HeartbeatError::Unacknowledged { nonce: 3 })
            .is_violation());
        assert!(!SessionError::PeerClosed.is_violation());
    }

    #[test]
    fn test_oversized_message_is_a_violation() {
        use tokio_tungstenite::tungstenite::error::CapacityError;

        let oversized = SessionError::Transport(WsError::Capacity(CapacityError::MessageTooLong {
            size: 1024,
            max_size: 256,
        }));

        assert!(oversized.is_violation());
        assert!(!SessionError::Transport(WsError::ConnectionClosed).is_violation());
    }
}
