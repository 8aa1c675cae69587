use anyhow::Result;
use ios_core::{Determinism, IosConfig, StateWrap};
use ios_hub::{Kernel, USB_HOST_DEVICE_NAME};
use ipc_abi::{GuestRam, OpenRequest, Request};
use services_usb::{DeviceChangeListener, DeviceListSnapshot, HostDescriptor, HostEnumerator};
use std::sync::Arc;
use std::time::{Duration, Instant};
use testdata::ScriptedEnumerator;

const CONFIG: &str = r#"
[usb]
passthrough_devices = [[0x057e, 0x0306], [0x1430, 0x0150]]
scan_interval_ms = 5
"#;

const REMOTE: HostDescriptor = HostDescriptor::new(0x057e, 0x0306, 1, 3);
const PORTAL: HostDescriptor = HostDescriptor::new(0x1430, 0x0150, 2, 1);
const MOUSE: HostDescriptor = HostDescriptor::new(0x046d, 0xc077, 2, 2);

struct Rig {
    kernel: Kernel,
    host: Arc<ScriptedEnumerator>,
    snapshot: Arc<DeviceListSnapshot>,
    determinism: Determinism,
    ram: GuestRam,
}

fn rig(deterministic: bool) -> Result<Rig> {
    let _ = env_logger::builder().is_test(true).try_init();
    let system = testdata::install_all();
    let host = ScriptedEnumerator::new();
    let snapshot = Arc::new(DeviceListSnapshot::new());
    let determinism = Determinism::new(deterministic);
    let kernel = Kernel::builder()
        .config(IosConfig::from_toml_str(CONFIG)?)
        .determinism(determinism.clone())
        .fs(system.fs)
        .titles(system.titles)
        .host_enumerator(Arc::clone(&host) as Arc<dyn HostEnumerator>)
        .device_listener(Arc::clone(&snapshot) as Arc<dyn DeviceChangeListener>)
        .build()?;
    Ok(Rig {
        kernel,
        host,
        snapshot,
        determinism,
        ram: GuestRam::new(0x100),
    })
}

impl Rig {
    fn open_usb(&mut self) -> i32 {
        self.kernel
            .handle_request(
                Request::Open(OpenRequest::new(USB_HOST_DEVICE_NAME)),
                &mut self.ram,
            )
            .expect("open replies")
            .return_value
    }

    fn vids(&self) -> Vec<u16> {
        self.snapshot.entries().iter().map(|e| e.vid).collect()
    }

    fn wait_for_vids(&self, expected: &[u16]) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if self.vids() == expected {
                return true;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        false
    }
}

#[test]
fn guest_sees_whitelisted_devices_come_and_go() -> Result<()> {
    let mut rig = rig(false)?;
    rig.host.set_devices(&[MOUSE, PORTAL, REMOTE]);

    assert!(rig.open_usb() >= 0);
    // Open returns after the first pass, so the list is already published.
    assert_eq!(rig.vids(), vec![0x057e, 0x1430]);
    assert_eq!(rig.snapshot.generation(), 1);

    rig.host.set_devices(&[MOUSE, REMOTE]);
    assert!(rig.wait_for_vids(&[0x057e]));

    rig.host.set_devices(&[MOUSE, REMOTE, PORTAL]);
    assert!(rig.wait_for_vids(&[0x057e, 0x1430]));

    rig.kernel.update_want_determinism(true);
    assert!(rig.vids().is_empty());
    assert!(rig.kernel.usb_host().registry().is_empty());
    Ok(())
}

#[test]
fn replay_never_touches_the_host() -> Result<()> {
    let mut rig = rig(true)?;
    rig.host.set_devices(&[REMOTE]);

    assert!(rig.open_usb() >= 0);
    assert!(rig.kernel.usb_host().update_devices(false));

    let mut save = StateWrap::for_write();
    rig.kernel.do_state(&mut save);
    let mut load = StateWrap::for_read(save.finish()?);
    rig.kernel.do_state(&mut load);
    load.finish()?;

    assert!(!rig.kernel.usb_host().scan_thread().is_running());
    assert_eq!(rig.host.passes(), 0);
    assert_eq!(rig.snapshot.generation(), 0);
    Ok(())
}

#[test]
fn state_load_republishes_current_devices() -> Result<()> {
    let mut rig = rig(false)?;
    rig.host.set_devices(&[REMOTE]);
    rig.open_usb();
    assert_eq!(rig.vids(), vec![0x057e]);

    // Stop scanning so only the load drives updates.
    rig.kernel.update_want_determinism(true);
    assert!(rig.vids().is_empty());

    let mut save = StateWrap::for_write();
    rig.kernel.do_state(&mut save);
    let bytes = save.finish()?;

    rig.determinism.set(false);
    let generation = rig.snapshot.generation();
    let mut load = StateWrap::for_read(bytes);
    rig.kernel.do_state(&mut load);
    load.finish()?;

    assert_eq!(rig.snapshot.generation(), generation + 1);
    assert_eq!(rig.vids(), vec![0x057e]);
    Ok(())
}
