use crate::device::{DeviceId, PassthroughDevice};
use crate::hooks::{ChangeHook, ChangeHooks};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Devices currently passed through, keyed by identity.
///
/// The registry is the only owner allowed to mutate the map. Readers copy an
/// `Arc` out of the lock; nothing else runs while it is held.
#[derive(Default)]
pub struct DeviceRegistry {
    devices: Mutex<BTreeMap<DeviceId, Arc<PassthroughDevice>>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts the device unless its identity is already present.
    pub fn add_device(&self, device: PassthroughDevice) -> bool {
        let mut devices = self.devices.lock();
        if devices.contains_key(&device.id()) {
            return false;
        }
        devices.insert(device.id(), Arc::new(device));
        true
    }

    pub fn get_device_by_id(&self, id: DeviceId) -> Option<Arc<PassthroughDevice>> {
        self.devices.lock().get(&id).cloned()
    }

    /// Removes every device missing from `plugged`, queueing a removal hook
    /// for each in registry order.
    pub fn detect_removed(&self, plugged: &BTreeSet<DeviceId>, hooks: &mut ChangeHooks) {
        self.devices.lock().retain(|id, device| {
            if plugged.contains(id) {
                return true;
            }
            hooks.push(ChangeHook::removed(Arc::clone(device)));
            false
        });
    }

    pub fn ids(&self) -> Vec<DeviceId> {
        self.devices.lock().keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.devices.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.lock().is_empty()
    }
}
