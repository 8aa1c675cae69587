//! Host USB passthrough.
//!
//! [`UsbHost`] keeps a [`DeviceRegistry`] in sync with the devices plugged into
//! the host, filtered by the configured whitelist. A [`ScanThread`] polls the
//! [`HostEnumerator`] in the background; every change is reported to a
//! [`DeviceChangeListener`] in batches. While determinism is requested the
//! host is never consulted.

#![allow(missing_docs)]

mod device;
mod hooks;
mod host;
mod registry;
mod scan;
mod snapshot;

pub use device::{DeviceId, EnumerateError, HostDescriptor, HostEnumerator, PassthroughDevice};
pub use hooks::{ChangeEvent, ChangeHook, ChangeHooks, DeviceChangeListener, NullListener};
pub use host::{UsbHost, DEVICE_NAME};
pub use registry::DeviceRegistry;
pub use scan::ScanThread;
pub use snapshot::{DeviceEntry, DeviceListSnapshot};
