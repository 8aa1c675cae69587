//! Shared fixtures for IOS service tests.
//!
//! * [`install_all`] – installs the titles described by `titles.toml`.
//! * [`es`] – `/dev/es` request builders.
//! * [`ScriptedEnumerator`] / [`RecordingListener`] – scripted host USB.

pub mod es;
mod titles;
mod usb;

pub use titles::{install_all, title, titles, ContentEntry, InstalledSystem, TitleEntry};
pub use usb::{RecordingListener, ScriptedEnumerator};
