//! IPC protocol types shared between the kernel and HLE devices.
//!
//! This crate is the protocol boundary: guest requests arrive as vectored
//! buffer descriptors ([`IoctlvRequest`]), get validated against a fixed
//! [`RequestShape`], and leave as a single signed [`IpcReply`]. It holds no
//! state of its own.

#![allow(missing_docs)]

mod error;
mod memory;
mod request;

pub use error::{FsError, IosError, IosResult, ReturnCode};
pub use memory::{GuestMemory, GuestRam};
pub use request::{
    Caller, IoVector, IoctlvRequest, IpcReply, OpenMode, OpenRequest, Request, RequestShape,
};

/// UID of the kernel and other privileged callers.
pub const PID_KERNEL: u32 = 0;
