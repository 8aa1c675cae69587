//! Request and reply shapes exchanged between the guest and HLE devices.

use crate::error::{IosError, IosResult, ReturnCode};
use crate::memory::GuestMemory;
use smallvec::SmallVec;

/// Typed buffer descriptor pointing into guest memory.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IoVector {
    /// Guest address of the buffer.
    pub address: u32,
    /// Buffer length in bytes.
    pub size: u32,
}

impl IoVector {
    pub const fn new(address: u32, size: u32) -> Self {
        Self { address, size }
    }
}

/// Vectored device request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IoctlvRequest {
    /// Kernel file descriptor the request was issued on.
    pub fd: u32,
    /// Device-specific request number.
    pub request: u32,
    /// UID of the issuing process, filled in by the kernel.
    pub uid: u32,
    /// Buffers the device reads from.
    pub in_vectors: SmallVec<[IoVector; 4]>,
    /// Buffers the device writes into.
    pub io_vectors: SmallVec<[IoVector; 4]>,
}

impl IoctlvRequest {
    pub fn new(request: u32) -> Self {
        Self {
            request,
            ..Self::default()
        }
    }

    /// Sets the issuing process UID.
    pub fn with_uid(mut self, uid: u32) -> Self {
        self.uid = uid;
        self
    }

    /// Appends an input vector.
    pub fn with_in(mut self, address: u32, size: u32) -> Self {
        self.in_vectors.push(IoVector::new(address, size));
        self
    }

    /// Appends an output vector.
    pub fn with_io(mut self, address: u32, size: u32) -> Self {
        self.io_vectors.push(IoVector::new(address, size));
        self
    }

    /// Checks vector counts and that every vector is backed by guest memory.
    pub fn has_number_of_valid_vectors(
        &self,
        in_count: usize,
        io_count: usize,
        memory: &dyn GuestMemory,
    ) -> bool {
        if self.in_vectors.len() != in_count || self.io_vectors.len() != io_count {
            return false;
        }
        self.in_vectors
            .iter()
            .chain(self.io_vectors.iter())
            .all(|v| memory.is_valid_range(v.address, v.size))
    }
}

/// Fixed shape an operation expects from its request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RequestShape<'a> {
    /// Exact byte size of each input vector.
    pub in_sizes: &'a [u32],
    /// Number of output vectors; their sizes are caller-defined.
    pub io_count: usize,
}

impl<'a> RequestShape<'a> {
    pub const fn new(in_sizes: &'a [u32], io_count: usize) -> Self {
        Self { in_sizes, io_count }
    }

    /// Rejects the request unless it matches this shape exactly.
    ///
    /// Runs before any guest memory is read, so a malformed request never has
    /// side effects.
    pub fn validate(&self, request: &IoctlvRequest, memory: &dyn GuestMemory) -> IosResult<()> {
        if !request.has_number_of_valid_vectors(self.in_sizes.len(), self.io_count, memory) {
            return Err(IosError::InvalidArgument);
        }
        let sizes_match = request
            .in_vectors
            .iter()
            .zip(self.in_sizes)
            .all(|(vector, expected)| vector.size == *expected);
        if sizes_match {
            Ok(())
        } else {
            Err(IosError::InvalidArgument)
        }
    }
}

/// Access mode requested when opening a device or file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OpenMode {
    #[default]
    None,
    Read,
    Write,
    ReadWrite,
}

/// Identity of the process issuing an open.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Caller {
    pub uid: u32,
    pub gid: u16,
}

/// Device open request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpenRequest {
    pub path: String,
    pub mode: OpenMode,
    pub caller: Caller,
}

impl OpenRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mode: OpenMode::None,
            caller: Caller::default(),
        }
    }
}

/// Commands routed by the kernel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Request {
    Open(OpenRequest),
    Close { fd: u32 },
    Ioctlv(IoctlvRequest),
}

/// Reply carrying a single signed result.
///
/// Non-negative values carry data (a handle, a byte count); negative values are
/// error codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IpcReply {
    pub return_value: i32,
}

impl IpcReply {
    pub const fn new(return_value: i32) -> Self {
        Self { return_value }
    }

    pub const fn success() -> Self {
        Self::new(ReturnCode::Success as i32)
    }

    /// Encodes a device result: data on success, the taxonomy code otherwise.
    pub fn from_result(result: IosResult<i32>) -> Self {
        match result {
            Ok(value) => Self::new(value),
            Err(err) => Self::from(err.return_code()),
        }
    }
}

impl From<ReturnCode> for IpcReply {
    fn from(code: ReturnCode) -> Self {
        Self::new(code.raw())
    }
}
