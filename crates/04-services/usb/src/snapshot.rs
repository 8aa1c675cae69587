use crate::device::{DeviceId, PassthroughDevice};
use crate::hooks::{ChangeEvent, DeviceChangeListener};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceEntry {
    pub id: DeviceId,
    pub vid: u16,
    pub pid: u16,
}

#[derive(Default)]
struct SnapshotState {
    pending: BTreeMap<DeviceId, DeviceEntry>,
    published: Vec<DeviceEntry>,
    generation: u64,
}

/// Guest-visible device list, republished once per change batch.
///
/// Individual hooks only touch the pending list; readers see the result of a
/// whole batch or nothing.
#[derive(Default)]
pub struct DeviceListSnapshot {
    state: Mutex<SnapshotState>,
}

impl DeviceListSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<DeviceEntry> {
        self.state.lock().published.clone()
    }

    /// Number of batches published so far.
    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }
}

impl DeviceChangeListener for DeviceListSnapshot {
    fn on_device_change(&self, event: ChangeEvent, device: Arc<PassthroughDevice>) {
        let mut state = self.state.lock();
        match event {
            ChangeEvent::Inserted => {
                state.pending.insert(
                    device.id(),
                    DeviceEntry {
                        id: device.id(),
                        vid: device.vid(),
                        pid: device.pid(),
                    },
                );
            }
            ChangeEvent::Removed => {
                state.pending.remove(&device.id());
            }
        }
    }

    fn on_device_change_end(&self) {
        let mut state = self.state.lock();
        state.published = state.pending.values().copied().collect();
        state.generation += 1;
    }
}
