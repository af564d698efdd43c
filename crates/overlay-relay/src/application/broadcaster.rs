//! The broadcaster: classify → count → snapshot → encode once → deliver.
//!
//! # Data flow
//!
//! ```text
//! InputSource ──EventSink──▶ [bounded queue] ──▶ Broadcaster::run
//!                                                   │
//!                    classify_event / classify_device
//!                                                   │
//!                         PressCounters::record_and_fetch
//!                                                   │
//!                     Registry::snapshot_into(category)   (lock held only here)
//!                                                   │
//!                           encode once ─▶ Message (refcounted text)
//!                                                   │
//!                       Session::try_deliver for each recipient
//! ```
//!
//! The broadcaster is the only owner of the [`PressCounters`], so counting
//! needs no synchronisation.  It never awaits a socket: delivery is a
//! non-blocking enqueue onto each session's outbound queue, so one slow
//! subscriber cannot hold up the others.
//!
//! Delivery is at-most-once.  A full queue drops the sample for that
//! subscriber only; a closed queue removes the subscriber.  Nothing is
//! retried.

use std::sync::Arc;

use overlay_core::protocol::codec::{encode_button_event, encode_device_event};
use overlay_core::{
    classify_device, classify_event, ButtonEvent, ClassifyError, DeviceEvent, EventCategory,
    InputEvent, PressCounters, ProtocolError,
};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::application::devices::DeviceTable;
use crate::application::registry::Registry;
use crate::application::session::{DeliveryError, Session};

/// Reasons a single event could not be broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BroadcastError {
    /// The producer emitted an event no category accepts.
    #[error(transparent)]
    Classify(#[from] ClassifyError),

    /// The outbound message could not be serialized.
    #[error(transparent)]
    Encode(#[from] ProtocolError),
}

/// Outcome of broadcasting one event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Sessions in the snapshot.
    pub recipients: usize,
    /// Frames accepted by a session's outbound queue.
    pub delivered: usize,
    /// Frames dropped because a session's queue was full.
    pub dropped: usize,
    /// Sessions removed because their queue was closed.
    pub removed: usize,
}

/// Fans events out to subscribed sessions.
pub struct Broadcaster {
    registry: Arc<Registry>,
    devices: Arc<DeviceTable>,
    counters: PressCounters,
    scratch: Vec<Arc<Session>>,
}

impl Broadcaster {
    pub fn new(registry: Arc<Registry>, devices: Arc<DeviceTable>) -> Self {
        Self {
            registry,
            devices,
            counters: PressCounters::new(),
            scratch: Vec::new(),
        }
    }

    /// Broadcasts a key, click, or wheel event to every matching subscriber.
    ///
    /// Counters are updated even when nobody is listening, so `presses`
    /// always counts from process start.  When the snapshot is empty the
    /// event is not encoded at all.
    ///
    /// # Errors
    ///
    /// [`BroadcastError::Classify`] for a malformed event,
    /// [`BroadcastError::Encode`] if serialization fails.
    pub fn on_button_event(&mut self, evt: &ButtonEvent) -> Result<DeliveryReport, BroadcastError> {
        let category = classify_event(evt)?;
        let presses = self.counters.record_and_fetch(category, evt)?;

        self.registry.snapshot_into(category, &mut self.scratch);
        if self.scratch.is_empty() {
            return Ok(DeliveryReport::default());
        }

        let text = match encode_button_event(evt, presses) {
            Ok(text) => text,
            Err(e) => {
                self.scratch.clear();
                return Err(e.into());
            }
        };
        Ok(self.deliver(category, Message::text(text)))
    }

    /// Records a device attach/detach and broadcasts it to `Devices`
    /// subscribers.
    ///
    /// # Errors
    ///
    /// [`BroadcastError::Encode`] if serialization fails.
    pub fn on_device_event(&mut self, evt: &DeviceEvent) -> Result<DeliveryReport, BroadcastError> {
        let category = classify_device(evt);
        // The table stays locked until every recipient has the frame queued,
        // so no bootstrap can slip a stale state in behind it.
        let devices = Arc::clone(&self.devices);
        devices.apply(evt, |_| -> Result<DeliveryReport, BroadcastError> {
            self.registry.snapshot_into(category, &mut self.scratch);
            if self.scratch.is_empty() {
                return Ok(DeliveryReport::default());
            }

            let text = match encode_device_event(evt) {
                Ok(text) => text,
                Err(e) => {
                    self.scratch.clear();
                    return Err(e.into());
                }
            };
            Ok(self.deliver(category, Message::text(text)))
        })
    }

    /// Broadcasts one event and logs any failure.  A bad event never stops
    /// the broadcaster.
    pub fn handle(&mut self, evt: &InputEvent) {
        let result = match evt {
            InputEvent::Button(b) => self.on_button_event(b),
            InputEvent::Device(d) => self.on_device_event(d),
        };
        match result {
            Ok(report) if report.recipients > 0 => debug!(
                "broadcast to {} subscriber(s): {} delivered, {} dropped, {} removed",
                report.recipients, report.delivered, report.dropped, report.removed
            ),
            Ok(_) => {}
            Err(BroadcastError::Classify(e)) => warn!("dropping event: {e}"),
            Err(BroadcastError::Encode(e)) => error!("dropping event: {e}"),
        }
    }

    /// Consumes events until every [`EventSink`](crate::application::EventSink)
    /// has been dropped.
    pub async fn run(mut self, mut events: mpsc::Receiver<InputEvent>) {
        info!("broadcaster started");
        while let Some(evt) = events.recv().await {
            self.handle(&evt);
        }
        info!("event queue closed; broadcaster stopped");
    }

    /// Hands `frame` to every session in the current snapshot, draining it.
    fn deliver(&mut self, category: EventCategory, frame: Message) -> DeliveryReport {
        let mut report = DeliveryReport {
            recipients: self.scratch.len(),
            ..DeliveryReport::default()
        };

        for session in self.scratch.drain(..) {
            // Masks only grow, so this holds for every snapshot member; it is
            // kept so delivery never depends on how the snapshot was taken.
            if !session.is_subscribed(category) {
                continue;
            }
            match session.try_deliver(frame.clone()) {
                Ok(()) => report.delivered += 1,
                Err(DeliveryError::QueueFull) => {
                    report.dropped += 1;
                    debug!("subscriber {}: queue full; sample dropped", session.id());
                }
                Err(DeliveryError::Closed) => {
                    if self.registry.remove(&session) {
                        report.removed += 1;
                    }
                }
            }
        }
        report
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
