//! Shared relay state handed to the server and the broadcaster.

use std::sync::Arc;

use crate::application::broadcaster::Broadcaster;
use crate::application::devices::DeviceTable;
use crate::application::nonce::NonceSource;
use crate::application::registry::Registry;

/// Process-wide state.  Cloning is cheap: every field is an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct RelayState {
    pub registry: Arc<Registry>,
    pub devices: Arc<DeviceTable>,
    pub nonces: Arc<NonceSource>,
}

impl RelayState {
    pub fn new() -> Self {
        Self::default()
    }

    /// State whose heartbeat nonces come from `nonces` instead of OS entropy.
    pub fn with_nonces(nonces: NonceSource) -> Self {
        Self {
            nonces: Arc::new(nonces),
            ..Self::default()
        }
    }

    /// Builds the single broadcaster that owns the press counters.
    pub fn broadcaster(&self) -> Broadcaster {
        Broadcaster::new(Arc::clone(&self.registry), Arc::clone(&self.devices))
    }
}
