//! Device-change notifications.
//!
//! A scan pass collects [`ChangeHook`]s in discovery order, then removal
//! order, and hands them to the listener in one go: one `on_device_change` per
//! hook, then a single `on_device_change_end` if anything changed.

use crate::device::PassthroughDevice;
use crate::registry::DeviceRegistry;
use smallvec::SmallVec;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeEvent {
    Inserted,
    Removed,
}

#[derive(Clone, Debug)]
pub struct ChangeHook {
    pub device: Arc<PassthroughDevice>,
    pub event: ChangeEvent,
}

impl ChangeHook {
    pub fn inserted(device: Arc<PassthroughDevice>) -> Self {
        Self {
            device,
            event: ChangeEvent::Inserted,
        }
    }

    pub fn removed(device: Arc<PassthroughDevice>) -> Self {
        Self {
            device,
            event: ChangeEvent::Removed,
        }
    }
}

/// Ordered change set produced by one scan pass.
pub type ChangeHooks = SmallVec<[ChangeHook; 8]>;

/// Device-specific reaction to hot-plug changes.
///
/// Called from the scan thread as well as the guest-request context, never
/// while the registry lock is held.
pub trait DeviceChangeListener: Send + Sync {
    /// Final say on whether a whitelisted host device is passed through.
    fn should_add_device(&self, _device: &PassthroughDevice) -> bool {
        true
    }

    fn on_device_change(&self, _event: ChangeEvent, _device: Arc<PassthroughDevice>) {}

    /// Called once after a non-empty batch.
    fn on_device_change_end(&self) {}
}

/// Listener that accepts every device and ignores changes.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullListener;

impl DeviceChangeListener for NullListener {}

pub(crate) fn dispatch_hooks(
    host_name: &str,
    registry: &DeviceRegistry,
    listener: &dyn DeviceChangeListener,
    hooks: &ChangeHooks,
) {
    for hook in hooks {
        let device = &hook.device;
        if hook.event == ChangeEvent::Inserted {
            let owned = registry
                .get_device_by_id(device.id())
                .is_some_and(|current| Arc::ptr_eq(&current, device));
            if !owned {
                log::error!(
                    "{host_name} - dropping insertion hook for {:04x}:{:04x}: no longer registered",
                    device.vid(),
                    device.pid()
                );
                continue;
            }
        }
        log::info!(
            "{host_name} - {} device: {:04x}:{:04x}",
            match hook.event {
                ChangeEvent::Inserted => "New",
                ChangeEvent::Removed => "Removed",
            },
            device.vid(),
            device.pid()
        );
        listener.on_device_change(hook.event, Arc::clone(device));
    }
    if !hooks.is_empty() {
        listener.on_device_change_end();
    }
}
