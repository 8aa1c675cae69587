//! `/dev/es` protocol adapter over the content table.

use crate::content_table::ContentTable;
use crate::title::{TitleContext, TitleDatabase};
use crate::uid::UidSys;
use ios_core::{Device, StateWrap};
use ios_fs::FileSystem;
use ipc_abi::{
    GuestMemory, IoctlvRequest, IosError, IosResult, IpcReply, OpenRequest, RequestShape,
    ReturnCode, PID_KERNEL,
};
use std::sync::Arc;

pub const DEVICE_NAME: &str = "/dev/es";

/// Size of a ticket view passed alongside a title id.
pub const TICKET_VIEW_SIZE: u32 = 0xd8;

/// Request numbers handled by [`EsDevice`].
pub mod ioctlv {
    pub const OPEN_TITLE_CONTENT: u32 = 0x09;
    pub const OPEN_ACTIVE_TITLE_CONTENT: u32 = 0x0a;
    pub const READ_CONTENT: u32 = 0x0b;
    pub const CLOSE_CONTENT: u32 = 0x0c;
    pub const SEEK_CONTENT: u32 = 0x23;
}

const U32: u32 = 4;
const U64: u32 = 8;

const OPEN_TITLE_CONTENT_SHAPE: RequestShape<'static> =
    RequestShape::new(&[U64, TICKET_VIEW_SIZE, U32], 0);
const OPEN_ACTIVE_TITLE_CONTENT_SHAPE: RequestShape<'static> = RequestShape::new(&[U32], 0);
const READ_CONTENT_SHAPE: RequestShape<'static> = RequestShape::new(&[U32], 1);
const CLOSE_CONTENT_SHAPE: RequestShape<'static> = RequestShape::new(&[U32], 0);
const SEEK_CONTENT_SHAPE: RequestShape<'static> = RequestShape::new(&[U32, U32, U32], 0);

/// Content access device.
pub struct EsDevice {
    opened: bool,
    fs: Arc<dyn FileSystem>,
    titles: Arc<dyn TitleDatabase>,
    contents: ContentTable,
    title_context: TitleContext,
}

impl EsDevice {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        titles: Arc<dyn TitleDatabase>,
        content_table_capacity: usize,
    ) -> Self {
        Self {
            opened: false,
            contents: ContentTable::new(content_table_capacity, Arc::clone(&fs)),
            fs,
            titles,
            title_context: TitleContext::default(),
        }
    }

    pub fn contents(&self) -> &ContentTable {
        &self.contents
    }

    pub fn title_context(&self) -> &TitleContext {
        &self.title_context
    }

    /// Makes an installed title the active one.
    pub fn launch_title(&mut self, title_id: u64) -> IosResult<()> {
        let tmd = self
            .titles
            .find_installed_tmd(title_id)
            .ok_or(IosError::NotFound)?;
        self.title_context = TitleContext::launched(tmd);
        log::info!("es: active title is now {title_id:016x}");
        Ok(())
    }

    fn open_title_content(
        &mut self,
        uid: u32,
        request: &IoctlvRequest,
        memory: &dyn GuestMemory,
    ) -> IosResult<i32> {
        OPEN_TITLE_CONTENT_SHAPE.validate(request, memory)?;
        let title_id = memory.read_u64(request.in_vectors[0].address);
        let content_index = read_content_index(memory, request.in_vectors[2].address)?;

        let tmd = self
            .titles
            .find_installed_tmd(title_id)
            .ok_or(IosError::NotFound)?;
        self.contents
            .open(tmd.as_ref(), content_index, uid)
            .map(|cfd| cfd as i32)
    }

    fn open_active_title_content(
        &mut self,
        caller_uid: u32,
        request: &IoctlvRequest,
        memory: &dyn GuestMemory,
    ) -> IosResult<i32> {
        OPEN_ACTIVE_TITLE_CONTENT_SHAPE.validate(request, memory)?;
        let content_index = read_content_index(memory, request.in_vectors[0].address)?;

        let tmd = Arc::clone(self.title_context.active_tmd().ok_or(IosError::NotFound)?);

        let mut uid_map = UidSys::load(self.fs.as_ref());
        let uid = uid_map.get_or_insert_uid_for_title(self.fs.as_ref(), tmd.title_id())?;
        if caller_uid != PID_KERNEL && caller_uid != uid {
            log::debug!(
                "open_active_title_content: UID {caller_uid:#x} is not the active title ({uid:#x})"
            );
            return Err(IosError::AccessDenied);
        }

        self.contents
            .open(tmd.as_ref(), content_index, caller_uid)
            .map(|cfd| cfd as i32)
    }

    fn read_content(
        &mut self,
        uid: u32,
        request: &IoctlvRequest,
        memory: &mut dyn GuestMemory,
    ) -> IosResult<i32> {
        READ_CONTENT_SHAPE.validate(request, memory)?;
        let cfd = memory.read_u32(request.in_vectors[0].address);
        let out = request.io_vectors[0];

        let mut buffer = vec![0u8; out.size as usize];
        let read = self.contents.read(cfd, &mut buffer, uid)?;
        memory.write_bytes(out.address, &buffer[..read as usize]);
        Ok(read as i32)
    }

    fn close_content(
        &mut self,
        uid: u32,
        request: &IoctlvRequest,
        memory: &dyn GuestMemory,
    ) -> IosResult<i32> {
        CLOSE_CONTENT_SHAPE.validate(request, memory)?;
        let cfd = memory.read_u32(request.in_vectors[0].address);
        self.contents.close(cfd, uid)?;
        Ok(ReturnCode::Success.raw())
    }

    fn seek_content(
        &mut self,
        uid: u32,
        request: &IoctlvRequest,
        memory: &dyn GuestMemory,
    ) -> IosResult<i32> {
        SEEK_CONTENT_SHAPE.validate(request, memory)?;
        let cfd = memory.read_u32(request.in_vectors[0].address);
        let offset = memory.read_u32(request.in_vectors[1].address);
        let mode = memory.read_u32(request.in_vectors[2].address);
        self.contents
            .seek(cfd, offset, mode, uid)
            .map(|position| position as i32)
    }
}

fn read_content_index(memory: &dyn GuestMemory, address: u32) -> IosResult<u16> {
    u16::try_from(memory.read_u32(address)).map_err(|_| IosError::InvalidArgument)
}

impl Device for EsDevice {
    fn name(&self) -> &str {
        DEVICE_NAME
    }

    fn is_opened(&self) -> bool {
        self.opened
    }

    fn open(&mut self, _request: &OpenRequest) -> IpcReply {
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
        memory: &mut dyn GuestMemory,
    ) -> Option<IpcReply> {
        let uid = request.uid;
        let result = match request.request {
            ioctlv::OPEN_TITLE_CONTENT => self.open_title_content(uid, request, memory),
            ioctlv::OPEN_ACTIVE_TITLE_CONTENT => {
                self.open_active_title_content(uid, request, memory)
            }
            ioctlv::READ_CONTENT => self.read_content(uid, request, memory),
            ioctlv::CLOSE_CONTENT => self.close_content(uid, request, memory),
            ioctlv::SEEK_CONTENT => self.seek_content(uid, request, memory),
            other => {
                log::warn!("es: unhandled ioctlv {other:#x}");
                return Some(IpcReply::from(ReturnCode::IpcEinval));
            }
        };
        if let Err(err) = result {
            log::debug!("es: ioctlv {:#x} failed: {err}", request.request);
        }
        Some(IpcReply::from_result(result))
    }

    fn do_state(&mut self, p: &mut StateWrap) {
        let mut active = self.title_context.active;
        let mut title_id = self
            .title_context
            .tmd
            .as_ref()
            .map_or(0, |tmd| tmd.title_id());
        p.do_bool(&mut active);
        p.do_u64(&mut title_id);

        if p.is_read_mode() {
            // Content handles never survive a state round-trip.
            self.contents.reset();
            self.title_context = match self.titles.find_installed_tmd(title_id) {
                Some(tmd) if active => TitleContext::launched(tmd),
                _ => TitleContext::default(),
            };
        }
    }

    fn set_opened(&mut self, opened: bool) {
        self.opened = opened;
    }
}
