//! Guest memory accessor consumed by request decoding.
//!
//! Guest memory is big-endian. The emulator's real memory subsystem sits
//! behind [`GuestMemory`]; [`GuestRam`] is a flat buffer used by tools and tests.

/// Read/write access to guest physical memory.
pub trait GuestMemory {
    /// Returns true if `[address, address + len)` is backed by memory.
    fn is_valid_range(&self, address: u32, len: u32) -> bool;

    /// Copies `out.len()` bytes starting at `address`.
    fn read_bytes(&self, address: u32, out: &mut [u8]);

    /// Writes `bytes` starting at `address`.
    fn write_bytes(&mut self, address: u32, bytes: &[u8]);

    fn read_u32(&self, address: u32) -> u32 {
        let mut raw = [0u8; 4];
        self.read_bytes(address, &mut raw);
        u32::from_be_bytes(raw)
    }

    fn read_u64(&self, address: u32) -> u64 {
        let mut raw = [0u8; 8];
        self.read_bytes(address, &mut raw);
        u64::from_be_bytes(raw)
    }

    fn write_u32(&mut self, address: u32, value: u32) {
        self.write_bytes(address, &value.to_be_bytes());
    }

    fn write_u64(&mut self, address: u32, value: u64) {
        self.write_bytes(address, &value.to_be_bytes());
    }
}

/// Flat, zero-initialised guest RAM starting at address zero.
#[derive(Clone, Debug)]
pub struct GuestRam {
    bytes: Vec<u8>,
}

impl GuestRam {
    pub fn new(size: usize) -> Self {
        Self {
            bytes: vec![0; size],
        }
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    fn span(&self, address: u32, len: usize) -> Option<std::ops::Range<usize>> {
        let start = address as usize;
        let end = start.checked_add(len)?;
        (end <= self.bytes.len()).then_some(start..end)
    }
}

impl GuestMemory for GuestRam {
    fn is_valid_range(&self, address: u32, len: u32) -> bool {
        self.span(address, len as usize).is_some()
    }

    fn read_bytes(&self, address: u32, out: &mut [u8]) {
        match self.span(address, out.len()) {
            Some(range) => out.copy_from_slice(&self.bytes[range]),
            None => {
                log::error!(
                    "guest read out of bounds: addr={address:#010x} len={}",
                    out.len()
                );
                out.fill(0);
            }
        }
    }

    fn write_bytes(&mut self, address: u32, bytes: &[u8]) {
        match self.span(address, bytes.len()) {
            Some(range) => self.bytes[range].copy_from_slice(bytes),
            None => log::error!(
                "guest write out of bounds: addr={address:#010x} len={}",
                bytes.len()
            ),
        }
    }
}
