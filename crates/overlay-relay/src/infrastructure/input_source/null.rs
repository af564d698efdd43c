//! A source that never produces anything.

use parking_lot::Mutex;
use tracing::info;

use super::{CaptureError, InputSource};
use crate::application::EventSink;

/// Holds the sink open until stopped so the broadcaster keeps running.
#[derive(Debug, Default)]
pub struct NullInputSource {
    sink: Mutex<Option<EventSink>>,
}

impl NullInputSource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl InputSource for NullInputSource {
    fn start(&self, sink: EventSink) -> Result<(), CaptureError> {
        info!("no input source configured; serving subscriptions only");
        *self.sink.lock() = Some(sink);
        Ok(())
    }

    fn stop(&self) {
        self.sink.lock().take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::event_channel;

    #[test]
    fn test_stop_releases_sink() {
        let source = NullInputSource::new();
        let (sink, mut rx) = event_channel(1);

        source.start(sink).unwrap();
        assert!(rx.try_recv().is_err());
        source.stop();

        assert!(matches!(
            rx.try_recv(),
            Err(tokio::sync::mpsc::error::TryRecvError::Disconnected)
        ));
    }
}
