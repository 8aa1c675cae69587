//! Runtime primitives shared by HLE devices and the kernel.
//!
//! * [`Device`] – the interface every emulated device implements.
//! * [`Determinism`] – shared replay flag consulted before touching the host.
//! * [`StateWrap`] – save-state cursor.
//! * [`OneShotEvent`] – set-once event used to order background work.
//! * [`IosConfig`] – configuration loaded from TOML.

#![allow(missing_docs)]

mod config;
mod determinism;
mod device;
mod state;
pub mod wait;

pub use config::{
    ConfigError, IosConfig, UsbConfig, DEFAULT_CONTENT_TABLE_CAPACITY, DEFAULT_MAX_IPC_FDS,
    DEFAULT_SCAN_INTERVAL_MS,
};
pub use determinism::Determinism;
pub use device::Device;
pub use state::{StateError, StateMode, StateWrap};
pub use wait::OneShotEvent;
