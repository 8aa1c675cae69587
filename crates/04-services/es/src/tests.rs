use super::*;
use ios_core::{Device, StateWrap};
use ios_fs::{FileSystem, NandFs};
use ipc_abi::{GuestMemory, GuestRam, IoctlvRequest, ReturnCode, PID_KERNEL};
use std::sync::Arc;

const TITLE: u64 = 0x0001_0000_5241_4141;
const OTHER_TITLE: u64 = 0x0001_0000_5242_4242;

const TID_ADDR: u32 = 0x100;
const VIEW_ADDR: u32 = 0x200;
const ARG_ADDR: u32 = 0x400;
const ARG2_ADDR: u32 = 0x410;
const ARG3_ADDR: u32 = 0x420;
const OUT_ADDR: u32 = 0x800;

struct Fixture {
    es: EsDevice,
    ram: GuestRam,
    fs: Arc<NandFs>,
}

fn fixture(capacity: usize) -> Fixture {
    let fs = Arc::new(NandFs::new());
    let titles = Arc::new(InstalledTitles::new());
    for title_id in [TITLE, OTHER_TITLE] {
        let contents = vec![
            Content {
                id: 0,
                index: 0,
                content_type: 1,
                size: 16,
            },
            Content {
                id: 4,
                index: 1,
                content_type: 1,
                size: 16,
            },
        ];
        for content in &contents {
            fs.write_file(&content_path(title_id, content), b"0123456789abcdef").unwrap();
        }
        titles.install(Arc::new(Tmd::new(title_id, contents)));
    }
    let es = EsDevice::new(Arc::clone(&fs) as Arc<dyn FileSystem>, titles, capacity);
    Fixture {
        es,
        ram: GuestRam::new(0x1000),
        fs,
    }
}

impl Fixture {
    fn call(&mut self, request: IoctlvRequest) -> i32 {
        self.es
            .ioctlv(&request, &mut self.ram)
            .expect("es replies synchronously")
            .return_value
    }

    fn open_title_content(&mut self, uid: u32, title_id: u64, index: u32) -> i32 {
        self.ram.write_u64(TID_ADDR, title_id);
        self.ram.write_u32(ARG_ADDR, index);
        self.call(
            IoctlvRequest::new(ioctlv::OPEN_TITLE_CONTENT)
                .with_uid(uid)
                .with_in(TID_ADDR, 8)
                .with_in(VIEW_ADDR, TICKET_VIEW_SIZE)
                .with_in(ARG_ADDR, 4),
        )
    }

    fn open_active(&mut self, uid: u32, index: u32) -> i32 {
        self.ram.write_u32(ARG_ADDR, index);
        self.call(
            IoctlvRequest::new(ioctlv::OPEN_ACTIVE_TITLE_CONTENT)
                .with_uid(uid)
                .with_in(ARG_ADDR, 4),
        )
    }

    fn read(&mut self, uid: u32, cfd: u32, size: u32) -> i32 {
        self.ram.write_u32(ARG_ADDR, cfd);
        self.call(
            IoctlvRequest::new(ioctlv::READ_CONTENT)
                .with_uid(uid)
                .with_in(ARG_ADDR, 4)
                .with_io(OUT_ADDR, size),
        )
    }

    fn seek(&mut self, uid: u32, cfd: u32, offset: u32, mode: u32) -> i32 {
        self.ram.write_u32(ARG_ADDR, cfd);
        self.ram.write_u32(ARG2_ADDR, offset);
        self.ram.write_u32(ARG3_ADDR, mode);
        self.call(
            IoctlvRequest::new(ioctlv::SEEK_CONTENT)
                .with_uid(uid)
                .with_in(ARG_ADDR, 4)
                .with_in(ARG2_ADDR, 4)
                .with_in(ARG3_ADDR, 4),
        )
    }

    fn close(&mut self, uid: u32, cfd: u32) -> i32 {
        self.ram.write_u32(ARG_ADDR, cfd);
        self.call(
            IoctlvRequest::new(ioctlv::CLOSE_CONTENT)
                .with_uid(uid)
                .with_in(ARG_ADDR, 4),
        )
    }

    fn out_bytes(&self, len: usize) -> Vec<u8> {
        let mut bytes = vec![0u8; len];
        self.ram.read_bytes(OUT_ADDR, &mut bytes);
        bytes
    }
}

#[test]
fn four_slot_table_exhausts_and_reuses_freed_handle() {
    let mut f = fixture(4);
    for expected in 0..4 {
        assert_eq!(f.open_title_content(0x1001, TITLE, 0), expected);
    }
    assert_eq!(
        f.open_title_content(0x1001, TITLE, 0),
        ReturnCode::FsEfdexhausted.raw()
    );
    assert_eq!(f.close(0x1001, 2), 0);
    assert_eq!(f.open_title_content(0x1001, TITLE, 1), 2);
}

#[test]
fn read_copies_into_output_vector() {
    let mut f = fixture(4);
    let cfd = f.open_title_content(0x1001, TITLE, 1) as u32;
    assert_eq!(f.read(0x1001, cfd, 6), 6);
    assert_eq!(f.out_bytes(6), b"012345");
    assert_eq!(f.seek(0x1001, cfd, 12, 0), 12);
    assert_eq!(f.read(0x1001, cfd, 8), 4);
    assert_eq!(f.out_bytes(4), b"cdef");
}

#[test]
fn other_callers_are_denied() {
    let mut f = fixture(4);
    let cfd = f.open_title_content(0x1001, TITLE, 0) as u32;
    let denied = ReturnCode::EsEacces.raw();
    assert_eq!(f.read(0x1002, cfd, 4), denied);
    assert_eq!(f.seek(0x1002, cfd, 0, 0), denied);
    assert_eq!(f.close(0x1002, cfd), denied);
    assert_eq!(f.close(0x1001, cfd), 0);
}

#[test]
fn out_of_range_and_unopened_handles() {
    let mut f = fixture(4);
    assert_eq!(f.read(PID_KERNEL, 4, 4), ReturnCode::EsEinval.raw());
    assert_eq!(f.seek(PID_KERNEL, 99, 0, 0), ReturnCode::EsEinval.raw());
    assert_eq!(f.close(PID_KERNEL, 1), ReturnCode::IpcEinval.raw());
    assert_eq!(f.fs.open_handles(), 0);
}

#[test]
fn malformed_requests_have_no_side_effects() {
    let mut f = fixture(4);
    f.ram.write_u64(TID_ADDR, TITLE);
    let short_view = IoctlvRequest::new(ioctlv::OPEN_TITLE_CONTENT)
        .with_uid(0x1001)
        .with_in(TID_ADDR, 8)
        .with_in(VIEW_ADDR, TICKET_VIEW_SIZE - 1)
        .with_in(ARG_ADDR, 4);
    assert_eq!(f.call(short_view), ReturnCode::EsEinval.raw());

    let two_args_seek = IoctlvRequest::new(ioctlv::SEEK_CONTENT)
        .with_in(ARG_ADDR, 4)
        .with_in(ARG2_ADDR, 4);
    assert_eq!(f.call(two_args_seek), ReturnCode::EsEinval.raw());

    let read_without_output = IoctlvRequest::new(ioctlv::READ_CONTENT).with_in(ARG_ADDR, 4);
    assert_eq!(f.call(read_without_output), ReturnCode::EsEinval.raw());

    assert_eq!(f.es.contents().open_count(), 0);
    assert_eq!(f.fs.open_handles(), 0);
}

#[test]
fn unknown_title_and_index() {
    let mut f = fixture(4);
    assert_eq!(
        f.open_title_content(0x1001, 0xdead, 0),
        ReturnCode::FsEnoent.raw()
    );
    assert_eq!(
        f.open_title_content(0x1001, TITLE, 7),
        ReturnCode::EsEinval.raw()
    );
    assert_eq!(
        f.open_title_content(0x1001, TITLE, 0x1_0000),
        ReturnCode::EsEinval.raw()
    );
}

#[test]
fn unknown_request_is_rejected() {
    let mut f = fixture(4);
    let reply = f.call(IoctlvRequest::new(0x7f));
    assert_eq!(reply, ReturnCode::IpcEinval.raw());
}

#[test]
fn active_title_content_requires_matching_uid() {
    let mut f = fixture(4);
    assert_eq!(f.open_active(0x1001, 0), ReturnCode::FsEnoent.raw());

    f.es.launch_title(TITLE).unwrap();
    // System menu holds FIRST_UID, so the active title gets the next one.
    let title_uid = FIRST_UID + 1;
    assert_eq!(f.open_active(title_uid + 5, 0), ReturnCode::EsEacces.raw());
    assert_eq!(f.es.contents().open_count(), 0);

    let cfd = f.open_active(title_uid, 1);
    assert_eq!(cfd, 0);
    assert_eq!(f.es.contents().entry(0).unwrap().uid, title_uid);

    // Privileged callers bypass the check and own the handle themselves.
    let cfd = f.open_active(PID_KERNEL, 0);
    assert_eq!(cfd, 1);
    assert_eq!(f.es.contents().entry(1).unwrap().uid, PID_KERNEL);

    let uids = UidSys::load(f.fs.as_ref());
    assert_eq!(uids.uid_for_title(TITLE), Some(title_uid));
}

#[test]
fn exhausted_uid_map_rejects_the_active_title() {
    let mut f = fixture(4);
    let mut record = Vec::new();
    record.extend_from_slice(&OTHER_TITLE.to_be_bytes());
    record.extend_from_slice(&u32::MAX.to_be_bytes());
    f.fs.write_file(UID_SYS_PATH, &record).unwrap();
    f.es.launch_title(TITLE).unwrap();

    assert_eq!(f.open_active(PID_KERNEL, 0), ReturnCode::FsEcorrupt.raw());
    assert_eq!(f.open_active(0x1001, 0), ReturnCode::FsEcorrupt.raw());
    assert_eq!(f.es.contents().open_count(), 0);
    assert_eq!(UidSys::load(f.fs.as_ref()).uid_for_title(TITLE), None);
}

#[test]
fn launch_requires_installed_title() {
    let mut f = fixture(4);
    assert_eq!(f.es.launch_title(0xdead), Err(ipc_abi::IosError::NotFound));
    assert!(!f.es.title_context().active);
}

#[test]
fn state_load_drops_open_contents_and_keeps_title() {
    let mut f = fixture(4);
    f.es.launch_title(OTHER_TITLE).unwrap();
    f.open_title_content(0x1001, TITLE, 0);

    let mut save = StateWrap::for_write();
    f.es.do_state(&mut save);
    let bytes = save.finish().unwrap();

    f.es.launch_title(TITLE).unwrap();
    let mut load = StateWrap::for_read(bytes);
    f.es.do_state(&mut load);

    assert_eq!(f.es.contents().open_count(), 0);
    assert_eq!(f.fs.open_handles(), 0);
    let tmd = f.es.title_context().active_tmd().expect("active title");
    assert_eq!(tmd.title_id(), OTHER_TITLE);
}
