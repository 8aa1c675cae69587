//! Kernel assembly and IPC routing.
//!
//! [`KernelBuilder`] wires the content access device and the USB host onto a
//! shared [`Determinism`] flag and a validated [`IosConfig`]; the resulting
//! [`Kernel`] owns the guest's descriptor table and routes every request.

#![allow(missing_docs)]

use anyhow::{anyhow, bail, Context, Result};
use ios_core::{Determinism, Device, IosConfig};
use ios_fs::FileSystem;
use services_es::{EsDevice, TitleDatabase};
use services_usb::{DeviceChangeListener, HostEnumerator, NullListener, UsbHost};
use std::sync::Arc;

mod kernel;

pub use kernel::Kernel;

pub use services_es::DEVICE_NAME as ES_DEVICE_NAME;
pub use services_usb::DEVICE_NAME as USB_HOST_DEVICE_NAME;

impl Kernel {
    /// Creates a new builder for constructing a kernel.
    pub fn builder() -> KernelBuilder {
        KernelBuilder::new()
    }
}

/// Builder for assembling a [`Kernel`] from its collaborators.
pub struct KernelBuilder {
    config: IosConfig,
    determinism: Determinism,
    fs: Option<Arc<dyn FileSystem>>,
    titles: Option<Arc<dyn TitleDatabase>>,
    enumerator: Option<Arc<dyn HostEnumerator>>,
    listener: Option<Arc<dyn DeviceChangeListener>>,
    extra: Vec<Box<dyn Device>>,
}

impl KernelBuilder {
    /// Creates a builder with the default configuration and determinism off.
    pub fn new() -> Self {
        Self {
            config: IosConfig::default(),
            determinism: Determinism::default(),
            fs: None,
            titles: None,
            enumerator: None,
            listener: None,
            extra: Vec::new(),
        }
    }

    pub fn config(mut self, config: IosConfig) -> Self {
        self.config = config;
        self
    }

    /// Shares an existing determinism flag instead of a fresh one.
    pub fn determinism(mut self, determinism: Determinism) -> Self {
        self.determinism = determinism;
        self
    }

    /// Sets the NAND filesystem content is read from.
    pub fn fs(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = Some(fs);
        self
    }

    /// Sets the installed title database.
    pub fn titles(mut self, titles: Arc<dyn TitleDatabase>) -> Self {
        self.titles = Some(titles);
        self
    }

    /// Sets the host USB enumerator.
    pub fn host_enumerator(mut self, enumerator: Arc<dyn HostEnumerator>) -> Self {
        self.enumerator = Some(enumerator);
        self
    }

    /// Sets the listener notified of host device changes. Defaults to
    /// [`NullListener`].
    pub fn device_listener(mut self, listener: Arc<dyn DeviceChangeListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Registers an additional device after the built-in ones.
    pub fn device(mut self, device: Box<dyn Device>) -> Self {
        self.extra.push(device);
        self
    }

    /// Builds a [`Kernel`], returning an error if a collaborator is missing,
    /// the configuration is invalid or two devices share a path.
    pub fn build(self) -> Result<Kernel> {
        self.config.validate().context("invalid config")?;

        let fs = self.fs.ok_or_else(|| anyhow!("missing filesystem"))?;
        let titles = self.titles.ok_or_else(|| anyhow!("missing title database"))?;
        let enumerator = self
            .enumerator
            .ok_or_else(|| anyhow!("missing host USB enumerator"))?;
        let listener = self
            .listener
            .unwrap_or_else(|| Arc::new(NullListener) as Arc<dyn DeviceChangeListener>);

        let mut names = vec![
            services_es::DEVICE_NAME.to_owned(),
            services_usb::DEVICE_NAME.to_owned(),
        ];
        for device in &self.extra {
            if names.iter().any(|name| name == device.name()) {
                bail!("device {} registered twice", device.name());
            }
            names.push(device.name().to_owned());
        }

        let es = EsDevice::new(fs, titles, self.config.content_table_capacity);
        let usb = UsbHost::new(
            services_usb::DEVICE_NAME,
            self.config.usb.clone(),
            self.determinism.clone(),
            enumerator,
            listener,
        );
        log::debug!(
            "kernel built with {} devices, {} IPC descriptors",
            names.len(),
            self.config.max_ipc_fds
        );
        Ok(Kernel::new(
            es,
            usb,
            self.extra,
            self.config.max_ipc_fds,
            self.determinism,
        ))
    }
}

impl Default for KernelBuilder {
    fn default() -> Self {
        Self::new()
    }
}
