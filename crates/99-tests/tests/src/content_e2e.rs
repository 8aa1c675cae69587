use anyhow::Result;
use ios_core::{IosConfig, StateWrap};
use ios_hub::{Kernel, ES_DEVICE_NAME};
use ipc_abi::{Caller, GuestRam, IoctlvRequest, OpenMode, OpenRequest, Request, ReturnCode};
use testdata::{es, ScriptedEnumerator};

const CONFIG: &str = r#"
content_table_capacity = 4
max_ipc_fds = 8
"#;

struct Guest {
    kernel: Kernel,
    ram: GuestRam,
}

impl Guest {
    fn boot(config: &str) -> Result<Self> {
        let _ = env_logger::builder().is_test(true).try_init();
        let system = testdata::install_all();
        let kernel = Kernel::builder()
            .config(IosConfig::from_toml_str(config)?)
            .fs(system.fs)
            .titles(system.titles)
            .host_enumerator(ScriptedEnumerator::new())
            .build()?;
        Ok(Self {
            kernel,
            ram: GuestRam::new(es::SCRATCH_RAM_SIZE),
        })
    }

    fn open(&mut self, path: &str, uid: u32) -> i32 {
        let request = OpenRequest {
            path: path.to_owned(),
            mode: OpenMode::None,
            caller: Caller { uid, gid: 1 },
        };
        self.kernel
            .handle_request(Request::Open(request), &mut self.ram)
            .expect("open replies")
            .return_value
    }

    fn ioctlv(&mut self, fd: i32, build: impl FnOnce(&mut GuestRam) -> IoctlvRequest) -> i32 {
        let request = IoctlvRequest {
            fd: fd as u32,
            ..build(&mut self.ram)
        };
        self.kernel
            .handle_request(Request::Ioctlv(request), &mut self.ram)
            .expect("es replies synchronously")
            .return_value
    }
}

#[test]
fn guest_streams_a_content_through_the_kernel() -> Result<()> {
    let mut guest = Guest::boot(CONFIG)?;
    let game = testdata::title("disc-game").expect("manifest title");
    let content = game.content(1).expect("content 1");
    let fd = guest.open(ES_DEVICE_NAME, 0x1001);
    assert_eq!(fd, 0);

    let cfd = guest.ioctlv(fd, |ram| es::open_title_content(ram, game.title_id, 1));
    assert_eq!(cfd, 0);

    let mut streamed = Vec::new();
    loop {
        let read = guest.ioctlv(fd, |ram| es::read_content(ram, cfd as u32, 10));
        assert!(read >= 0);
        if read == 0 {
            break;
        }
        streamed.extend(es::output(&guest.ram, read as usize));
    }
    assert_eq!(streamed, content.bytes());

    assert_eq!(
        guest.ioctlv(fd, |ram| es::seek_content(ram, cfd as u32, 4, 0)),
        4
    );
    assert_eq!(
        guest.ioctlv(fd, |ram| es::seek_content(ram, cfd as u32, 2, 1)),
        6
    );
    assert_eq!(
        guest.ioctlv(fd, |ram| es::seek_content(ram, cfd as u32, 0, 7)),
        ReturnCode::FsEinval.raw()
    );
    assert_eq!(guest.ioctlv(fd, |ram| es::close_content(ram, cfd as u32)), 0);
    // Freed slots belong to the kernel again.
    assert_eq!(
        guest.ioctlv(fd, |ram| es::close_content(ram, cfd as u32)),
        ReturnCode::EsEacces.raw()
    );
    Ok(())
}

#[test]
fn configured_table_capacity_is_enforced() -> Result<()> {
    let mut guest = Guest::boot(CONFIG)?;
    let game = testdata::title("disc-game").expect("manifest title");
    let fd = guest.open(ES_DEVICE_NAME, 0x1001);

    for expected in 0..4 {
        let cfd = guest.ioctlv(fd, |ram| es::open_title_content(ram, game.title_id, 0));
        assert_eq!(cfd, expected);
    }
    assert_eq!(
        guest.ioctlv(fd, |ram| es::open_title_content(ram, game.title_id, 0)),
        ReturnCode::FsEfdexhausted.raw()
    );
    assert_eq!(guest.kernel.es().contents().capacity(), 4);
    Ok(())
}

#[test]
fn callers_cannot_touch_each_others_handles() -> Result<()> {
    let mut guest = Guest::boot(CONFIG)?;
    let channel = testdata::title("channel").expect("manifest title");
    let owner = guest.open(ES_DEVICE_NAME, 0x1001);
    let intruder = guest.open(ES_DEVICE_NAME, 0x1003);

    let cfd = guest.ioctlv(owner, |ram| {
        es::open_title_content(ram, channel.title_id, 0)
    });
    for result in [
        guest.ioctlv(intruder, |ram| es::read_content(ram, cfd as u32, 4)),
        guest.ioctlv(intruder, |ram| es::seek_content(ram, cfd as u32, 0, 0)),
        guest.ioctlv(intruder, |ram| es::close_content(ram, cfd as u32)),
    ] {
        assert_eq!(result, ReturnCode::EsEacces.raw());
    }
    assert_eq!(guest.ioctlv(owner, |ram| es::read_content(ram, cfd as u32, 4)), 4);
    Ok(())
}

#[test]
fn state_load_invalidates_content_handles() -> Result<()> {
    let mut guest = Guest::boot(CONFIG)?;
    let game = testdata::title("disc-game").expect("manifest title");
    let fd = guest.open(ES_DEVICE_NAME, 0x1001);
    guest.kernel.launch_title(game.title_id)?;

    let mut save = StateWrap::for_write();
    guest.kernel.do_state(&mut save);
    let bytes = save.finish()?;

    let cfd = guest.ioctlv(fd, |ram| es::open_active_title_content(ram, 0));
    assert_eq!(cfd, 0);

    let mut load = StateWrap::for_read(bytes);
    guest.kernel.do_state(&mut load);
    load.finish()?;

    assert_eq!(guest.kernel.es().contents().open_count(), 0);
    assert_eq!(
        guest.ioctlv(fd, |ram| es::read_content(ram, cfd as u32, 4)),
        ReturnCode::EsEacces.raw()
    );
    // The title survives the load, so the handle can be reopened.
    assert_eq!(guest.ioctlv(fd, |ram| es::open_active_title_content(ram, 0)), 0);
    Ok(())
}
