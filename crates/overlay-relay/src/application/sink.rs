//! Producer-side handle onto the bounded event queue.
//!
//! Input sources run on their own threads and must never block on a slow
//! broadcaster, so [`EventSink::submit`] never waits.  When the queue is full
//! the *newest* event (the one being submitted) is discarded and counted.
//! The broadcaster drains the queue in FIFO order, so every subscriber sees
//! events in the order the source produced them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use overlay_core::InputEvent;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::warn;

/// Why an event was not queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// The queue was full; the event was dropped.
    #[error("event queue is full; event dropped")]
    Full,

    /// The broadcaster has stopped.
    #[error("event queue is closed")]
    Closed,
}

/// Creates the event queue shared by an input source and the broadcaster.
///
/// `capacity` must be non-zero.
pub fn event_channel(capacity: usize) -> (EventSink, mpsc::Receiver<InputEvent>) {
    let (tx, rx) = mpsc::channel(capacity);
    let sink = EventSink {
        tx,
        dropped: Arc::new(AtomicU64::new(0)),
    };
    (sink, rx)
}

/// Cloneable, non-blocking producer handle.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::Sender<InputEvent>,
    dropped: Arc<AtomicU64>,
}

impl EventSink {
    /// Queues one event without waiting.  Safe to call from any thread.
    ///
    /// # Errors
    ///
    /// [`SubmitError::Full`] if the event was dropped under load,
    /// [`SubmitError::Closed`] once the broadcaster has gone away.
    pub fn submit(&self, evt: impl Into<InputEvent>) -> Result<(), SubmitError> {
        match self.tx.try_send(evt.into()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!("event queue full; dropped newest event ({total} dropped so far)");
                Err(SubmitError::Full)
            }
            Err(TrySendError::Closed(_)) => Err(SubmitError::Closed),
        }
    }

    /// Total events dropped because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
