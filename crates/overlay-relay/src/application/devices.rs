//! Table of currently attached input devices.
//!
//! The broadcaster applies every `DeviceEvent` here before fanning it out, so
//! a subscriber that asks for `Devices` late can be sent the devices that
//! attached before it connected.
//!
//! Both [`DeviceTable::apply`] and [`DeviceTable::with_attached`] run their
//! callback with the table locked.  A bootstrap and a live device broadcast
//! therefore never interleave: a subscriber's queue always ends with the
//! latest state of every device.  Lock order is table, then registry.

use std::collections::btree_map::{BTreeMap, Values};

use overlay_core::{Device, DeviceEvent, DeviceHandle};
use parking_lot::Mutex;
use tracing::debug;

/// Attached devices keyed by handle.  Ordered so bootstrap output is stable.
#[derive(Debug, Default)]
pub struct DeviceTable {
    devices: Mutex<BTreeMap<DeviceHandle, Device>>,
}

impl DeviceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an attach or detach, then runs `then` with the table still
    /// locked.  `then` receives `true` if the table changed.
    pub fn apply<R>(&self, evt: &DeviceEvent, then: impl FnOnce(bool) -> R) -> R {
        let mut devices = self.devices.lock();
        let changed = if evt.attached {
            devices
                .insert(evt.device.handle.clone(), evt.device.clone())
                .as_ref()
                != Some(&evt.device)
        } else {
            devices.remove(&evt.device.handle).is_some()
        };
        debug!(
            "device {} {}; {} attached",
            evt.device.handle,
            if evt.attached { "attached" } else { "detached" },
            devices.len()
        );
        then(changed)
    }

    /// Runs `f` over every attached device, in handle order, with the table
    /// locked.
    pub fn with_attached<R>(&self, f: impl FnOnce(Values<'_, DeviceHandle, Device>) -> R) -> R {
        f(self.devices.lock().values())
    }

    pub fn len(&self) -> usize {
        self.devices.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
