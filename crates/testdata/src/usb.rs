use parking_lot::Mutex;
use services_usb::{
    ChangeEvent, DeviceChangeListener, DeviceId, EnumerateError, HostDescriptor, HostEnumerator,
    PassthroughDevice,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

const POLL: Duration = Duration::from_millis(2);

fn poll_until(timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if done() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(POLL);
    }
}

/// Host enumerator whose device list is set by the test.
#[derive(Default)]
pub struct ScriptedEnumerator {
    devices: Mutex<Vec<HostDescriptor>>,
    failing: AtomicBool,
    passes: AtomicUsize,
    callers: Mutex<Vec<ThreadId>>,
}

impl ScriptedEnumerator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_devices(&self, devices: &[HostDescriptor]) {
        *self.devices.lock() = devices.to_vec();
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Release);
    }

    /// Number of `list_devices` calls so far, failed ones included.
    pub fn passes(&self) -> usize {
        self.passes.load(Ordering::Acquire)
    }

    /// Number of distinct threads that have listed devices.
    pub fn caller_threads(&self) -> usize {
        self.callers.lock().len()
    }

    /// Waits until `extra` more passes have run past the current count.
    pub fn wait_for_passes(&self, extra: usize, timeout: Duration) -> bool {
        let target = self.passes() + extra;
        poll_until(timeout, || self.passes() >= target)
    }
}

impl HostEnumerator for ScriptedEnumerator {
    fn list_devices(&self) -> Result<Vec<HostDescriptor>, EnumerateError> {
        let caller = thread::current().id();
        let mut callers = self.callers.lock();
        if !callers.contains(&caller) {
            callers.push(caller);
        }
        drop(callers);
        self.passes.fetch_add(1, Ordering::AcqRel);
        if self.failing.load(Ordering::Acquire) {
            return Err(EnumerateError::Backend("scripted failure".into()));
        }
        Ok(self.devices.lock().clone())
    }
}

/// Listener that records every hook and batch end.
#[derive(Default)]
pub struct RecordingListener {
    events: Mutex<Vec<(ChangeEvent, DeviceId)>>,
    batches: AtomicUsize,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn take(&self) -> Vec<(ChangeEvent, DeviceId)> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn batches(&self) -> usize {
        self.batches.load(Ordering::Acquire)
    }

    pub fn wait_for_events(&self, count: usize, timeout: Duration) -> bool {
        poll_until(timeout, || self.len() >= count)
    }
}

impl DeviceChangeListener for RecordingListener {
    fn on_device_change(&self, event: ChangeEvent, device: Arc<PassthroughDevice>) {
        self.events.lock().push((event, device.id()));
    }

    fn on_device_change_end(&self) {
        self.batches.fetch_add(1, Ordering::AcqRel);
    }
}
