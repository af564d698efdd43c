//! Mock input source for tests.
//!
//! Allows tests to inject synthetic events without a capture layer.

use overlay_core::InputEvent;
use parking_lot::Mutex;

use super::{CaptureError, InputSource};
use crate::application::{EventSink, SubmitError};

/// A mock implementation of [`InputSource`] that allows tests to inject events.
#[derive(Debug, Default)]
pub struct MockInputSource {
    sink: Mutex<Option<EventSink>>,
}

impl MockInputSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Injects a synthetic event, as if captured from hardware.
    ///
    /// # Errors
    ///
    /// [`SubmitError::Closed`] before `start()` or after `stop()`, and
    /// whatever the sink reports otherwise.
    pub fn inject_event(&self, event: impl Into<InputEvent>) -> Result<(), SubmitError> {
        match self.sink.lock().as_ref() {
            Some(sink) => sink.submit(event),
            None => Err(SubmitError::Closed),
        }
    }

    pub fn is_started(&self) -> bool {
        self.sink.lock().is_some()
    }
}

impl InputSource for MockInputSource {
    fn start(&self, sink: EventSink) -> Result<(), CaptureError> {
        let mut slot = self.sink.lock();
        if slot.is_some() {
            return Err(CaptureError::AlreadyStarted);
        }
        *slot = Some(sink);
        Ok(())
    }

    fn stop(&self) {
        // Dropping the sink closes the queue once every clone is gone.
        self.sink.lock().take();
    }
}
