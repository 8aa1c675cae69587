use std::fmt;
use thiserror::Error;

/// Stable identity of a host device, derived from its transport descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeviceId(pub u64);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Descriptor reported by the host enumerator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HostDescriptor {
    pub vid: u16,
    pub pid: u16,
    pub bus: u8,
    pub port: u8,
}

impl HostDescriptor {
    pub const fn new(vid: u16, pid: u16, bus: u8, port: u8) -> Self {
        Self {
            vid,
            pid,
            bus,
            port,
        }
    }

    pub fn id(&self) -> DeviceId {
        DeviceId(
            u64::from(self.vid) << 32
                | u64::from(self.pid) << 16
                | u64::from(self.bus) << 8
                | u64::from(self.port),
        )
    }
}

/// Host device passed through to the guest.
#[derive(Debug, PartialEq, Eq)]
pub struct PassthroughDevice {
    descriptor: HostDescriptor,
    id: DeviceId,
}

impl PassthroughDevice {
    pub fn new(descriptor: HostDescriptor) -> Self {
        Self {
            id: descriptor.id(),
            descriptor,
        }
    }

    pub fn id(&self) -> DeviceId {
        self.id
    }

    pub fn vid(&self) -> u16 {
        self.descriptor.vid
    }

    pub fn pid(&self) -> u16 {
        self.descriptor.pid
    }

    pub fn descriptor(&self) -> &HostDescriptor {
        &self.descriptor
    }
}

/// Failures of the host enumerator.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum EnumerateError {
    #[error("host USB context is unavailable")]
    Unavailable,
    #[error("enumeration failed: {0}")]
    Backend(String),
}

/// Source of the host's current device list.
pub trait HostEnumerator: Send + Sync {
    fn list_devices(&self) -> Result<Vec<HostDescriptor>, EnumerateError>;
}
