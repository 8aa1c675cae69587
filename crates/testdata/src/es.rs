//! Builders for `/dev/es` requests with arguments staged in guest memory.

use ipc_abi::{GuestMemory, IoctlvRequest};
use services_es::{ioctlv, TICKET_VIEW_SIZE};

pub const TITLE_ID_ADDR: u32 = 0x100;
pub const TICKET_VIEW_ADDR: u32 = 0x200;
pub const ARG0_ADDR: u32 = 0x400;
pub const ARG1_ADDR: u32 = 0x410;
pub const ARG2_ADDR: u32 = 0x420;
pub const OUTPUT_ADDR: u32 = 0x1000;

/// Guest RAM size large enough for every staged argument.
pub const SCRATCH_RAM_SIZE: usize = 0x2000;

pub fn open_title_content(
    memory: &mut dyn GuestMemory,
    title_id: u64,
    index: u32,
) -> IoctlvRequest {
    memory.write_u64(TITLE_ID_ADDR, title_id);
    memory.write_u32(ARG0_ADDR, index);
    IoctlvRequest::new(ioctlv::OPEN_TITLE_CONTENT)
        .with_in(TITLE_ID_ADDR, 8)
        .with_in(TICKET_VIEW_ADDR, TICKET_VIEW_SIZE)
        .with_in(ARG0_ADDR, 4)
}

pub fn open_active_title_content(memory: &mut dyn GuestMemory, index: u32) -> IoctlvRequest {
    memory.write_u32(ARG0_ADDR, index);
    IoctlvRequest::new(ioctlv::OPEN_ACTIVE_TITLE_CONTENT).with_in(ARG0_ADDR, 4)
}

pub fn read_content(memory: &mut dyn GuestMemory, cfd: u32, size: u32) -> IoctlvRequest {
    memory.write_u32(ARG0_ADDR, cfd);
    IoctlvRequest::new(ioctlv::READ_CONTENT)
        .with_in(ARG0_ADDR, 4)
        .with_io(OUTPUT_ADDR, size)
}

pub fn seek_content(
    memory: &mut dyn GuestMemory,
    cfd: u32,
    offset: u32,
    mode: u32,
) -> IoctlvRequest {
    memory.write_u32(ARG0_ADDR, cfd);
    memory.write_u32(ARG1_ADDR, offset);
    memory.write_u32(ARG2_ADDR, mode);
    IoctlvRequest::new(ioctlv::SEEK_CONTENT)
        .with_in(ARG0_ADDR, 4)
        .with_in(ARG1_ADDR, 4)
        .with_in(ARG2_ADDR, 4)
}

pub fn close_content(memory: &mut dyn GuestMemory, cfd: u32) -> IoctlvRequest {
    memory.write_u32(ARG0_ADDR, cfd);
    IoctlvRequest::new(ioctlv::CLOSE_CONTENT).with_in(ARG0_ADDR, 4)
}

/// Copies `len` bytes out of the output buffer.
pub fn output(memory: &dyn GuestMemory, len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    memory.read_bytes(OUTPUT_ADDR, &mut bytes);
    bytes
}
