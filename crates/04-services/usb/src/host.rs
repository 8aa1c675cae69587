use crate::device::{DeviceId, HostEnumerator, PassthroughDevice};
use crate::hooks::{dispatch_hooks, ChangeHook, ChangeHooks, DeviceChangeListener};
use crate::registry::DeviceRegistry;
use crate::scan::ScanThread;
use ios_core::{Determinism, Device, StateWrap, UsbConfig};
use ipc_abi::{GuestMemory, IoctlvRequest, IpcReply, OpenRequest, ReturnCode};
use std::collections::BTreeSet;
use std::sync::Arc;

pub const DEVICE_NAME: &str = "/dev/usb/host";

/// State shared between the guest-facing device and its scan thread.
pub(crate) struct HostShared {
    pub(crate) name: String,
    pub(crate) registry: DeviceRegistry,
    pub(crate) config: UsbConfig,
    pub(crate) determinism: Determinism,
    enumerator: Arc<dyn HostEnumerator>,
    listener: Arc<dyn DeviceChangeListener>,
}

impl HostShared {
    /// One scan pass. Returns `false` if the host could not be enumerated, in
    /// which case the registry is left untouched.
    pub(crate) fn update_devices(&self, always_add_hooks: bool) -> bool {
        if self.determinism.wants_determinism() {
            return true;
        }
        let mut hooks = ChangeHooks::new();
        let mut plugged = BTreeSet::new();
        if !self.add_new_devices(&mut plugged, &mut hooks, always_add_hooks) {
            return false;
        }
        self.registry.detect_removed(&plugged, &mut hooks);
        self.dispatch(&hooks);
        true
    }

    fn add_new_devices(
        &self,
        plugged: &mut BTreeSet<DeviceId>,
        hooks: &mut ChangeHooks,
        always_add_hooks: bool,
    ) -> bool {
        if self.config.passthrough_devices.is_empty() {
            return true;
        }
        let descriptors = match self.enumerator.list_devices() {
            Ok(descriptors) => descriptors,
            Err(err) => {
                log::warn!("{} - failed to list host devices: {err}", self.name);
                return false;
            }
        };

        for descriptor in descriptors {
            if !self.config.is_whitelisted(descriptor.vid, descriptor.pid) {
                continue;
            }
            let device = PassthroughDevice::new(descriptor);
            if !self.listener.should_add_device(&device) {
                continue;
            }
            let id = device.id();
            if !plugged.insert(id) {
                continue;
            }
            if self.registry.add_device(device) || always_add_hooks {
                if let Some(device) = self.registry.get_device_by_id(id) {
                    hooks.push(ChangeHook::inserted(device));
                }
            }
        }
        true
    }

    pub(crate) fn flush_removed(&self, plugged: &BTreeSet<DeviceId>) {
        let mut hooks = ChangeHooks::new();
        self.registry.detect_removed(plugged, &mut hooks);
        self.dispatch(&hooks);
    }

    fn dispatch(&self, hooks: &ChangeHooks) {
        dispatch_hooks(&self.name, &self.registry, self.listener.as_ref(), hooks);
    }
}

/// Host USB passthrough device.
///
/// Owns the registry of passed-through devices and the thread that keeps it
/// in sync with the host. Device-specific behaviour plugs in through the
/// [`DeviceChangeListener`].
pub struct UsbHost {
    shared: Arc<HostShared>,
    scan: ScanThread,
    opened: bool,
    has_initialised: bool,
}

impl UsbHost {
    pub fn new(
        name: impl Into<String>,
        config: UsbConfig,
        determinism: Determinism,
        enumerator: Arc<dyn HostEnumerator>,
        listener: Arc<dyn DeviceChangeListener>,
    ) -> Self {
        let shared = Arc::new(HostShared {
            name: name.into(),
            registry: DeviceRegistry::new(),
            config,
            determinism,
            enumerator,
            listener,
        });
        Self {
            scan: ScanThread::new(Arc::clone(&shared)),
            shared,
            opened: false,
            has_initialised: false,
        }
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.shared.registry
    }

    pub fn add_device(&self, device: PassthroughDevice) -> bool {
        self.shared.registry.add_device(device)
    }

    pub fn get_device_by_id(&self, id: DeviceId) -> Option<Arc<PassthroughDevice>> {
        self.shared.registry.get_device_by_id(id)
    }

    /// Runs a scan pass on the calling thread.
    pub fn update_devices(&self, always_add_hooks: bool) -> bool {
        self.shared.update_devices(always_add_hooks)
    }

    pub fn scan_thread(&self) -> &ScanThread {
        &self.scan
    }

    pub fn scan_thread_mut(&mut self) -> &mut ScanThread {
        &mut self.scan
    }

    /// Submits a transfer to `device` and maps the submission status onto
    /// the guest reply. A successful submission defers the reply to the
    /// transfer's completion.
    pub fn handle_transfer<F>(
        &self,
        device: Option<Arc<PassthroughDevice>>,
        request: u32,
        submit: F,
    ) -> Option<IpcReply>
    where
        F: FnOnce(&PassthroughDevice) -> i32,
    {
        let Some(device) = device else {
            return Some(ReturnCode::IpcEnoent.into());
        };
        let ret = submit(&device);
        if ret == ReturnCode::Success.raw() {
            return None;
        }
        log::error!(
            "{} - [{:04x}:{:04x}] failed to submit transfer (request {request}): {ret}",
            self.shared.name,
            device.vid(),
            device.pid()
        );
        Some(if ret <= 0 {
            IpcReply::new(ret)
        } else {
            ReturnCode::IpcEinval.into()
        })
    }
}

impl Device for UsbHost {
    fn name(&self) -> &str {
        &self.shared.name
    }

    fn is_opened(&self) -> bool {
        self.opened
    }

    fn open(&mut self, _request: &OpenRequest) -> IpcReply {
        if !self.has_initialised && !self.shared.determinism.wants_determinism() {
            if self.scan.start() {
                self.scan.wait_for_first_scan();
            }
            self.has_initialised = true;
        }
        self.opened = true;
        IpcReply::success()
    }

    fn close(&mut self) -> IpcReply {
        self.opened = false;
        IpcReply::success()
    }

    fn ioctlv(
        &mut self,
        request: &IoctlvRequest,
        _memory: &mut dyn GuestMemory,
    ) -> Option<IpcReply> {
        let name = &self.shared.name;
        log::warn!("{name} - unhandled ioctlv {:#x}", request.request);
        Some(ReturnCode::IpcEinval.into())
    }

    fn do_state(&mut self, p: &mut StateWrap) {
        if self.opened && p.is_read_mode() {
            self.update_devices(true);
        }
    }

    fn update_want_determinism(&mut self, new_want_determinism: bool) {
        if new_want_determinism {
            self.scan.stop();
        } else if self.opened {
            self.scan.start();
        }
    }

    fn set_opened(&mut self, opened: bool) {
        self.opened = opened;
    }
}
