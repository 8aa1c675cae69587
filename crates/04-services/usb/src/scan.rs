//! Background hot-plug scanner.

use crate::host::HostShared;
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use ios_core::OneShotEvent;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

const THREAD_NAME: &str = "USB Scan Thread";

/// Polls the host enumerator on a fixed interval until stopped.
///
/// At most one loop runs at a time. Stopping always flushes the registry, so
/// every device the guest saw gets a removal notification.
pub struct ScanThread {
    host: Arc<HostShared>,
    running: Arc<AtomicBool>,
    first_scan: Arc<OneShotEvent>,
    wake: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl ScanThread {
    pub(crate) fn new(host: Arc<HostShared>) -> Self {
        Self {
            host,
            running: Arc::new(AtomicBool::new(false)),
            first_scan: Arc::new(OneShotEvent::new()),
            wake: None,
            worker: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Launches the loop. Returns `false` when nothing was started, either
    /// because a loop is already running or determinism forbids scanning.
    pub fn start(&mut self) -> bool {
        if self.host.determinism.wants_determinism() {
            return false;
        }
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        let (wake_tx, wake_rx) = bounded::<()>(1);
        let host = Arc::clone(&self.host);
        let running = Arc::clone(&self.running);
        let first_scan = Arc::clone(&self.first_scan);
        let interval = host.config.scan_interval();
        let spawned = thread::Builder::new()
            .name(THREAD_NAME.to_owned())
            .spawn(move || {
                log::debug!("{} - scan loop started", host.name);
                while running.load(Ordering::Acquire) {
                    if host.update_devices(false) {
                        first_scan.set();
                    }
                    match wake_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                log::debug!("{} - scan loop exited", host.name);
            });

        match spawned {
            Ok(handle) => {
                self.wake = Some(wake_tx);
                self.worker = Some(handle);
                true
            }
            Err(err) => {
                log::error!("{} - failed to spawn scan thread: {err}", self.host.name);
                self.running.store(false, Ordering::Release);
                false
            }
        }
    }

    /// Joins the loop if it was running, then reports every registered
    /// device as removed.
    pub fn stop(&mut self) {
        if self
            .running
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            // Dropping the sender wakes the loop out of its sleep.
            self.wake.take();
            if let Some(worker) = self.worker.take() {
                if worker.join().is_err() {
                    log::error!("{} - scan thread panicked", self.host.name);
                }
            }
        }
        self.host.flush_removed(&BTreeSet::new());
    }

    /// Blocks until one scan pass has completed successfully.
    pub fn wait_for_first_scan(&self) {
        self.first_scan.wait();
    }

    pub fn first_scan_done(&self) -> bool {
        self.first_scan.is_set()
    }
}

impl Drop for ScanThread {
    fn drop(&mut self) {
        self.stop();
    }
}
