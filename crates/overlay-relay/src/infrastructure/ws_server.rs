//! WebSocket server: accept loop and per-session task management.
//!
//! This module is responsible for:
//!
//! 1. Binding a TCP listener on the configured address.
//! 2. Upgrading connections on the configured path (default `/ws`) to
//!    WebSocket sessions and answering every other path with 404.
//! 3. Running two concurrent tasks per session:
//!    - **Receive loop**: reads control messages, grows the subscription mask,
//!      checks heartbeat echoes.
//!    - **Heartbeat loop**: sends a `Ping` every interval and is the only
//!      writer to the socket, draining the session's outbound queue between
//!      ticks.
//! 4. Removing a session from the registry as soon as either loop fails.
//! 5. Closing every session when the `running` flag is cleared.
//!
//! # Scalability
//!
//! Each loop runs in its own Tokio task and the accept loop never waits on a
//! session.  The broadcaster never waits on a socket either: it enqueues
//! frames and the heartbeat loop writes them, so a slow subscriber only ever
//! slows itself down.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use overlay_core::decode_client_message;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_tungstenite::{
    accept_hdr_async_with_config,
    tungstenite::{
        handshake::server::{ErrorResponse, Request, Response},
        http::StatusCode,
        protocol::WebSocketConfig,
        Error as WsError, Message,
    },
};
use tracing::{debug, error, info, warn};

use crate::application::{
    apply_client_message, next_heartbeat, DeviceTable, NonceSource, Registry, RelayState,
    Session, SessionError,
};
use crate::domain::RelayConfig;

/// How often the accept loop re-checks the `running` flag.
const ACCEPT_POLL: Duration = Duration::from_millis(200);

/// How long a closing session waits for its close frame to go out.
const CLOSE_GRACE: Duration = Duration::from_millis(250);

// ── Public API ────────────────────────────────────────────────────────────────

/// Binds `config.bind_addr` and serves until `running` is set to `false`.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the listener cannot be
/// bound (e.g., the port is already in use).
pub async fn run_server(
    config: RelayConfig,
    state: RelayState,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    config.validate().context("invalid relay configuration")?;
    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind WebSocket listener on {}", config.bind_addr))?;
    serve(listener, config, state, running).await
}

/// Runs the accept loop on an already bound listener.
///
/// Tests bind port 0 themselves and pass the listener in so they know the
/// address.  On return every session has been removed from the registry, and
/// connections still mid-handshake are refused once they complete.
///
/// # Errors
///
/// Returns an error if the configuration is invalid.
pub async fn serve(
    listener: TcpListener,
    config: RelayConfig,
    state: RelayState,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    config.validate().context("invalid relay configuration")?;
    let local = listener.local_addr().context("listener has no local address")?;
    info!("relay listening on ws://{local}{}", config.ws_path);

    let config = Arc::new(config);

    while running.load(Ordering::Relaxed) {
        // Short timeout so the loop notices the shutdown flag even when no
        // subscriber is connecting.
        match timeout(ACCEPT_POLL, listener.accept()).await {
            Ok(Ok((stream, peer))) => {
                debug!("TCP connection from {peer}");
                let config = Arc::clone(&config);
                let state = state.clone();
                tokio::spawn(async move {
                    handle_connection(stream, peer, config, state).await;
                });
            }
            Ok(Err(e)) => {
                // Transient accept error (e.g., too many open file descriptors).
                error!("accept error: {e}");
            }
            Err(_) => {}
        }
    }

    info!("shutdown flag set; stopping accept loop");
    let closed = state.registry.close_all();
    info!("closed {closed} subscriber session(s)");
    Ok(())
}

// ── Per-connection handler ────────────────────────────────────────────────────

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    config: Arc<RelayConfig>,
    state: RelayState,
) {
    if let Err(e) = run_session(stream, peer, config, state).await {
        debug!("connection {peer}: {e:#}");
    }
}

/// Upgrades the connection, registers the session and runs both loops until
/// they have exited.
async fn run_session(
    stream: TcpStream,
    peer: SocketAddr,
    config: Arc<RelayConfig>,
    state: RelayState,
) -> anyhow::Result<()> {
    let expected_path = config.ws_path.clone();
    let check_path = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        if req.uri().path() == expected_path {
            Ok(resp)
        } else {
            debug!("connection {peer}: rejecting upgrade on {}", req.uri().path());
            let mut not_found = ErrorResponse::new(None);
            *not_found.status_mut() = StatusCode::NOT_FOUND;
            Err(not_found)
        }
    };

    let mut ws_stream =
        accept_hdr_async_with_config(stream, check_path, Some(websocket_config(&config)))
            .await
            .with_context(|| format!("WebSocket handshake failed with {peer}"))?;

    let (session, outbound) = Session::new(peer, config.outbound_queue_capacity);
    if let Err(e) = state.registry.add(Arc::clone(&session)) {
        // Handshake finished after shutdown began.
        info!("connection {peer}: {e}");
        let _ = timeout(CLOSE_GRACE, ws_stream.close(None)).await;
        return Ok(());
    }

    let (sink, source) = ws_stream.split();

    let heartbeat = tokio::spawn({
        let session = Arc::clone(&session);
        let registry = Arc::clone(&state.registry);
        let nonces = Arc::clone(&state.nonces);
        let period = config.heartbeat_interval;
        async move {
            let outcome = heartbeat_loop(&session, sink, outbound, &nonces, period).await;
            finish(&registry, &session, "heartbeat", outcome);
        }
    });

    let receive = tokio::spawn({
        let session = Arc::clone(&session);
        let registry = Arc::clone(&state.registry);
        let devices = Arc::clone(&state.devices);
        async move {
            let outcome = receive_loop(&session, source, &devices).await;
            finish(&registry, &session, "receive", outcome);
        }
    });

    let (heartbeat, receive) = tokio::join!(heartbeat, receive);
    if let Err(e) = heartbeat.and(receive) {
        error!("subscriber {}: session task failed: {e}", session.id());
        state.registry.remove(&session);
    }
    debug!("subscriber {}: torn down", session.id());
    Ok(())
}

fn websocket_config(config: &RelayConfig) -> WebSocketConfig {
    let mut ws = WebSocketConfig::default();
    ws.max_message_size = Some(config.max_message_size);
    ws.max_frame_size = Some(config.max_message_size);
    ws
}

/// Logs why a loop ended and removes the session.  Removal is idempotent, so
/// whichever loop (or the broadcaster) gets here first does the work.
fn finish(
    registry: &Registry,
    session: &Session,
    loop_name: &str,
    outcome: Result<(), SessionError>,
) {
    match outcome {
        Ok(()) => debug!("subscriber {}: {loop_name} loop cancelled", session.id()),
        Err(e) if e.is_violation() => warn!("subscriber {}: {e}", session.id()),
        Err(e) => debug!("subscriber {}: {loop_name} loop ended: {e}", session.id()),
    }
    registry.remove(session);
}

// ── Receive loop ──────────────────────────────────────────────────────────────

/// Reads and applies control messages until cancelled or until the peer
/// breaks the protocol or goes away.
///
/// Returns `Ok(())` only when cancelled.
async fn receive_loop<S>(
    session: &Session,
    mut source: S,
    devices: &DeviceTable,
) -> Result<(), SessionError>
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    let cancel = session.cancellation().clone();
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            next = source.next() => next,
        };

        match next {
            None => return Err(SessionError::PeerClosed),
            Some(Err(e)) => return Err(e.into()),
            Some(Ok(Message::Text(text))) => {
                if text.is_empty() {
                    return Err(SessionError::UnexpectedFrame("empty text"));
                }
                debug!("subscriber {}: received {} bytes", session.id(), text.len());
                let msg = decode_client_message(text.as_str())?;
                apply_client_message(session, msg, devices)?;
            }
            Some(Ok(Message::Binary(_))) => return Err(SessionError::UnexpectedFrame("binary")),
            Some(Ok(Message::Close(_))) => return Err(SessionError::PeerClosed),
            // Transport-level keepalives are answered by tungstenite itself.
            Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
        }
    }
}

// ── Heartbeat loop ────────────────────────────────────────────────────────────

/// Sends a heartbeat every `period` (the first one immediately) and writes
/// queued broadcast frames in between.  The only writer to the socket.
///
/// Returns `Ok(())` only when cancelled.
async fn heartbeat_loop<W>(
    session: &Session,
    mut sink: W,
    mut outbound: mpsc::Receiver<Message>,
    nonces: &NonceSource,
    period: Duration,
) -> Result<(), SessionError>
where
    W: Sink<Message, Error = WsError> + Unpin,
{
    let cancel = session.cancellation().clone();
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let result = loop {
        let frame = tokio::select! {
            biased;
            _ = cancel.cancelled() => break Ok(()),
            _ = ticker.tick() => match next_heartbeat(session, nonces) {
                Ok(ping) => ping,
                Err(e) => break Err(e),
            },
            queued = outbound.recv() => match queued {
                Some(frame) => frame,
                None => break Ok(()),
            },
        };

        let sent = tokio::select! {
            _ = cancel.cancelled() => break Ok(()),
            sent = sink.send(frame) => sent,
        };
        if let Err(e) = sent {
            break Err(SessionError::Transport(e));
        }
    };

    outbound.close();
    if !matches!(result, Err(SessionError::Transport(_))) {
        // No payload: a closing subscriber is never told why.
        let _ = timeout(CLOSE_GRACE, sink.close()).await;
    }
    result
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::DeliveryError;
    use futures_util::stream;
    use overlay_core::{EventCategory, ServerMessage};
    use tokio_util::sync::PollSender;

    fn new_session() -> (Arc<Session>, mpsc::Receiver<Message>) {
        Session::new("127.0.0.1:40000".parse().unwrap(), 8)
    }

    fn frames(items: Vec<Result<Message, WsError>>) -> impl Stream<Item = Result<Message, WsError>> + Unpin {
        stream::iter(items)
    }

    #[tokio::test]
    async fn test_receive_loop_applies_listen_then_reports_peer_close() {
        // Arrange
        let (session, _rx) = new_session();
        let devices = DeviceTable::new();
        let input = frames(vec![
            Ok(Message::text(r#"{"listen":"Keyboard"}"#.to_string())),
            Ok(Message::Ping(Default::default())),
            Ok(Message::text(r#"{"listen":"Devices"}"#.to_string())),
        ]);

        // Act
        let outcome = receive_loop(&session, input, &devices).await;

        // Assert: stream end is a peer close, after both listens applied
        assert!(matches!(outcome, Err(SessionError::PeerClosed)));
        assert_eq!(
            session.mask(),
            EventCategory::KEYBOARD | EventCategory::DEVICES
        );
    }

    #[tokio::test]
    async fn test_receive_loop_rejects_malformed_message() {
        let (session, _rx) = new_session();
        let devices = DeviceTable::new();
        let input = frames(vec![
            Ok(Message::text(r#"{"listen":"Keyboard","extra":1}"#.to_string())),
            Ok(Message::text(r#"{"listen":"Devices"}"#.to_string())),
        ]);

        let outcome = receive_loop(&session, input, &devices).await;

        assert!(matches!(outcome, Err(SessionError::Protocol(_))));
        assert!(session.mask().is_empty());
    }

    #[tokio::test]
    async fn test_receive_loop_rejects_binary_and_empty_frames() {
        let (session, _rx) = new_session();
        let devices = DeviceTable::new();

        let binary = receive_loop(
            &session,
            frames(vec![Ok(Message::binary(vec![1u8, 2, 3]))]),
            &devices,
        )
        .await;
        let empty = receive_loop(
            &session,
            frames(vec![Ok(Message::text(String::new()))]),
            &devices,
        )
        .await;

        assert!(matches!(binary, Err(SessionError::UnexpectedFrame("binary"))));
        assert!(matches!(empty, Err(SessionError::UnexpectedFrame("empty text"))));
    }

    #[tokio::test]
    async fn test_receive_loop_rejects_unsolicited_ping_echo() {
        let (session, _rx) = new_session();
        let devices = DeviceTable::new();

        let outcome = receive_loop(
            &session,
            frames(vec![Ok(Message::text(r#"{"ping":1}"#.to_string()))]),
            &devices,
        )
        .await;

        assert!(matches!(outcome, Err(SessionError::Heartbeat(_))));
    }

    #[tokio::test]
    async fn test_receive_loop_returns_ok_when_cancelled() {
        let (session, _rx) = new_session();
        let devices = DeviceTable::new();
        session.cancel();

        let outcome = receive_loop(&session, stream::pending(), &devices).await;

        assert!(outcome.is_ok());
    }

    #[tokio::test]
    async fn test_heartbeat_loop_sends_ping_then_queued_frames() {
        // Arrange
        let (session, outbound) = new_session();
        let nonces = NonceSource::seeded(9);
        let (tx, mut written) = mpsc::channel::<Message>(8);
        let sink = PollSender::new(tx).sink_map_err(|_| WsError::ConnectionClosed);
        session
            .try_deliver(Message::text(r#"{"type":"Devices","hDevice":"x","attached":true}"#.to_string()))
            .unwrap();

        // Act: long interval so only the immediate first tick fires
        let task = {
            let session = Arc::clone(&session);
            tokio::spawn(async move {
                heartbeat_loop(&session, sink, outbound, &nonces, Duration::from_secs(60)).await
            })
        };
        let first = written.recv().await.unwrap();
        let second = written.recv().await.unwrap();
        session.cancel();
        let outcome = task.await.unwrap();

        // Assert
        let first: ServerMessage = serde_json::from_str(first.to_text().unwrap()).unwrap();
        assert!(matches!(first, ServerMessage::Ping { .. }));
        assert!(second.to_text().unwrap().contains("Devices"));
        assert!(outcome.is_ok());
    }

    #[tokio::test]
    async fn test_heartbeat_loop_fails_when_ping_unanswered() {
        let (session, outbound) = new_session();
        let nonces = NonceSource::seeded(9);
        let (tx, _written) = mpsc::channel::<Message>(8);
        let sink = PollSender::new(tx).sink_map_err(|_| WsError::ConnectionClosed);

        let outcome =
            heartbeat_loop(&session, sink, outbound, &nonces, Duration::from_millis(20)).await;

        assert!(matches!(outcome, Err(SessionError::Heartbeat(_))));
    }

    #[tokio::test]
    async fn test_heartbeat_write_failure_closes_queue_and_removes_session() {
        // Arrange: a writer whose peer is gone, and a frame waiting to go out
        let registry = Registry::new();
        let (session, outbound) = new_session();
        registry.add(Arc::clone(&session)).unwrap();
        let nonces = NonceSource::seeded(3);
        let (tx, written) = mpsc::channel::<Message>(8);
        drop(written);
        let sink = PollSender::new(tx).sink_map_err(|_| WsError::ConnectionClosed);
        session
            .try_deliver(Message::text(r#"{"type":"Ping","ping":1}"#.to_string()))
            .unwrap();

        // Act
        let outcome =
            heartbeat_loop(&session, sink, outbound, &nonces, Duration::from_secs(60)).await;

        // Assert: the loop reports the write failure and stops accepting frames
        assert!(matches!(outcome, Err(SessionError::Transport(_))));
        assert_eq!(
            session.try_deliver(Message::text("{}".to_string())),
            Err(DeliveryError::Closed)
        );

        // and tearing it down strikes the session from the registry
        finish(&registry, &session, "heartbeat", outcome);
        assert!(registry.is_empty());
        assert!(session.cancellation().is_cancelled());
    }

    #[tokio::test]
    async fn test_handshake_finishing_after_shutdown_is_refused() {
        // Arrange: a TCP connection accepted before shutdown, not yet upgraded
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = RelayState::new();
        let running = Arc::new(AtomicBool::new(true));
        let server = tokio::spawn(serve(
            listener,
            RelayConfig::default(),
            state.clone(),
            Arc::clone(&running),
        ));
        let tcp = TcpStream::connect(addr).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Act: shut down, then finish the upgrade
        running.store(false, Ordering::Relaxed);
        server.await.unwrap().unwrap();
        let upgraded = tokio_tungstenite::client_async(format!("ws://{addr}/ws"), tcp).await;

        // Assert: the late session is closed and never registered
        if let Ok((mut ws, _)) = upgraded {
            let next = timeout(Duration::from_secs(2), ws.next())
                .await
                .expect("late session should be closed promptly");
            assert!(matches!(
                next,
                None | Some(Err(_)) | Some(Ok(Message::Close(_)))
            ));
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(state.registry.is_empty());
    }

    #[test]
    fn test_websocket_config_limits_message_size() {
        let config = RelayConfig::default();
        let ws = websocket_config(&config);
        assert_eq!(ws.max_message_size, Some(256));
    }
}
