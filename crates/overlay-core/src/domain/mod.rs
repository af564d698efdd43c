//! Domain entities for the input overlay relay.
//!
//! Pure data and pure functions: no sockets, no async runtime, no global
//! state.  Everything here can be unit-tested in isolation.
//!
//! - [`buttons`]: the closed sets of logical keyboard and mouse buttons.
//! - [`event`]: button and device events as emitted by the capture layer.
//! - [`category`]: category bit sets and the classifier.
//! - [`counters`]: per-button press counters.

pub mod buttons;
pub mod category;
pub mod counters;
pub mod event;
