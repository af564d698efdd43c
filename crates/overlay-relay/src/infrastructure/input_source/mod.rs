//! Input sources: where captured events enter the relay.
//!
//! Capturing raw hardware input is platform-specific and lives outside this
//! crate.  Whatever does the capturing only has to implement [`InputSource`]
//! and push [`InputEvent`](overlay_core::InputEvent)s into the
//! [`EventSink`] it is given.  Events must come from one logical thread of
//! control so their order is preserved.
//!
//! # Testability
//!
//! The `InputSource` trait allows tests to inject synthetic events through
//! [`mock::MockInputSource`] without any capture layer at all.

use thiserror::Error;

use crate::application::EventSink;
use crate::domain::SourceKind;

pub mod line;
pub mod mock;
pub mod null;

pub use line::LineInputSource;
pub use mock::MockInputSource;
pub use null::NullInputSource;

/// Error type for input source operations.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// `start` was called twice on a source that can only run once.
    #[error("input source has already been started")]
    AlreadyStarted,

    /// The reader thread could not be spawned.
    #[error("failed to spawn input thread: {0}")]
    Thread(#[from] std::io::Error),
}

/// Trait abstracting input event production.
pub trait InputSource: Send + Sync {
    /// Starts producing events into `sink`.  Must not block.
    fn start(&self, sink: EventSink) -> Result<(), CaptureError>;

    /// Stops producing events and releases the sink.
    fn stop(&self);
}

/// Builds the source selected by configuration.
pub fn build_source(kind: SourceKind) -> Box<dyn InputSource> {
    match kind {
        SourceKind::Stdin => Box::new(LineInputSource::stdin()),
        SourceKind::None => Box::new(NullInputSource::new()),
    }
}
