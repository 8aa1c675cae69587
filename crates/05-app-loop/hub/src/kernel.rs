use ios_core::{Determinism, Device, StateWrap};
use ipc_abi::{
    Caller, GuestMemory, IoctlvRequest, IosResult, IpcReply, OpenRequest, Request, ReturnCode,
};
use services_es::EsDevice;
use services_usb::UsbHost;

/// Where an open descriptor points.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct FdEntry {
    device: usize,
    caller: Caller,
}

/// Device catalogue plus the guest's IPC descriptor table.
///
/// Device indices are fixed at build time: `/dev/es` first, the USB host
/// second, extra devices after that in registration order.
pub struct Kernel {
    pub(crate) es: EsDevice,
    pub(crate) usb: UsbHost,
    pub(crate) extra: Vec<Box<dyn Device>>,
    pub(crate) fds: Vec<Option<FdEntry>>,
    pub(crate) determinism: Determinism,
}

impl Kernel {
    pub(crate) fn new(
        es: EsDevice,
        usb: UsbHost,
        extra: Vec<Box<dyn Device>>,
        max_ipc_fds: usize,
        determinism: Determinism,
    ) -> Self {
        Self {
            es,
            usb,
            extra,
            fds: vec![None; max_ipc_fds],
            determinism,
        }
    }

    pub fn determinism(&self) -> &Determinism {
        &self.determinism
    }

    pub fn es(&self) -> &EsDevice {
        &self.es
    }

    pub fn usb_host(&self) -> &UsbHost {
        &self.usb
    }

    pub fn usb_host_mut(&mut self) -> &mut UsbHost {
        &mut self.usb
    }

    pub fn launch_title(&mut self, title_id: u64) -> IosResult<()> {
        self.es.launch_title(title_id)
    }

    pub fn open_fds(&self) -> usize {
        self.fds.iter().filter(|fd| fd.is_some()).count()
    }

    fn device_count(&self) -> usize {
        2 + self.extra.len()
    }

    fn device_at(&self, index: usize) -> Option<&dyn Device> {
        match index {
            0 => Some(&self.es),
            1 => Some(&self.usb),
            n => self.extra.get(n - 2).map(|d| d.as_ref()),
        }
    }

    fn device_at_mut(&mut self, index: usize) -> Option<&mut dyn Device> {
        match index {
            0 => Some(&mut self.es),
            1 => Some(&mut self.usb),
            n => match self.extra.get_mut(n - 2) {
                Some(device) => Some(device.as_mut()),
                None => None,
            },
        }
    }

    fn find_device(&self, path: &str) -> Option<usize> {
        (0..self.device_count()).find(|&i| self.device_at(i).is_some_and(|d| d.name() == path))
    }

    pub fn device(&self, path: &str) -> Option<&dyn Device> {
        self.find_device(path).and_then(|i| self.device_at(i))
    }

    /// Routes one guest command. `None` means the device deferred its reply.
    pub fn handle_request(
        &mut self,
        request: Request,
        memory: &mut dyn GuestMemory,
    ) -> Option<IpcReply> {
        match request {
            Request::Open(open) => Some(self.open(&open)),
            Request::Close { fd } => Some(self.close(fd)),
            Request::Ioctlv(ioctlv) => self.ioctlv(ioctlv, memory),
        }
    }

    fn open(&mut self, request: &OpenRequest) -> IpcReply {
        let Some(fd) = self.fds.iter().position(Option::is_none) else {
            log::warn!("open {}: out of IPC descriptors", request.path);
            return ReturnCode::IpcEmax.into();
        };
        let Some(index) = self.find_device(&request.path) else {
            log::warn!("open {}: unknown device", request.path);
            return ReturnCode::IpcEnoent.into();
        };
        let Some(device) = self.device_at_mut(index) else {
            return ReturnCode::IpcEnoent.into();
        };
        let reply = device.open(request);
        if reply.return_value < ReturnCode::Success.raw() {
            return reply;
        }
        self.fds[fd] = Some(FdEntry {
            device: index,
            caller: request.caller,
        });
        log::debug!("open {} -> fd {fd}", request.path);
        IpcReply::new(fd as i32)
    }

    fn entry(&self, fd: u32) -> Option<FdEntry> {
        self.fds.get(fd as usize).copied().flatten()
    }

    fn close(&mut self, fd: u32) -> IpcReply {
        let Some(entry) = self.entry(fd) else {
            return ReturnCode::IpcEinval.into();
        };
        let reply = match self.device_at_mut(entry.device) {
            Some(device) => device.close(),
            None => ReturnCode::IpcEinval.into(),
        };
        self.fds[fd as usize] = None;
        reply
    }

    fn ioctlv(
        &mut self,
        mut request: IoctlvRequest,
        memory: &mut dyn GuestMemory,
    ) -> Option<IpcReply> {
        let Some(entry) = self.entry(request.fd) else {
            return Some(ReturnCode::IpcEinval.into());
        };
        request.uid = entry.caller.uid;
        match self.device_at_mut(entry.device) {
            Some(device) => device.ioctlv(&request, memory),
            None => Some(ReturnCode::IpcEinval.into()),
        }
    }

    /// Sets the shared flag, then lets every device react.
    pub fn update_want_determinism(&mut self, new_want_determinism: bool) {
        let previous = self.determinism.set(new_want_determinism);
        if previous != new_want_determinism {
            log::info!("determinism {}", if new_want_determinism { "on" } else { "off" });
        }
        for index in 0..self.device_count() {
            if let Some(device) = self.device_at_mut(index) {
                device.update_want_determinism(new_want_determinism);
            }
        }
    }

    /// Saves or restores the descriptor table and every device.
    pub fn do_state(&mut self, p: &mut StateWrap) {
        let device_count = self.device_count();
        for slot in self.fds.iter_mut() {
            let mut present = slot.is_some();
            let current = slot.unwrap_or(FdEntry {
                device: 0,
                caller: Caller::default(),
            });
            let mut device = current.device as u32;
            let mut uid = current.caller.uid;
            let mut gid = u32::from(current.caller.gid);
            p.do_bool(&mut present);
            p.do_u32(&mut device);
            p.do_u32(&mut uid);
            p.do_u32(&mut gid);
            if p.is_read_mode() {
                *slot = (present && (device as usize) < device_count).then_some(FdEntry {
                    device: device as usize,
                    caller: Caller {
                        uid,
                        gid: gid as u16,
                    },
                });
            }
        }

        for index in 0..device_count {
            let Some(device) = self.device_at_mut(index) else {
                continue;
            };
            let mut opened = device.is_opened();
            p.do_bool(&mut opened);
            if p.is_read_mode() {
                device.set_opened(opened);
            }
            device.do_state(p);
        }
    }
}
